//! Node registry handlers (spec §6, §6.1).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use log::info;

use crate::dto::{
    parse_node_id, HeartbeatRequest, HeartbeatResponse, NodeView, NodesResponse,
    RegisterNodeRequest, RegisterNodeResponse,
};
use crate::error::{store_err, ApiError};
use crate::state::AppState;

/// `POST /api/nodes/register`
pub async fn register(
    State(engine): State<AppState>,
    Json(req): Json<RegisterNodeRequest>,
) -> Result<Json<RegisterNodeResponse>, ApiError> {
    let node_id = parse_node_id(&req.node_id);
    dstore_engine::nl::register_node(engine.metadata().as_ref(), engine.stats(), node_id.clone(), &req.node_address)
        .map_err(store_err)?;
    info!("node {node_id} registered at {}", req.node_address);
    Ok(Json(RegisterNodeResponse {
        status: "registered".into(),
        node_id: node_id.to_string(),
    }))
}

/// `POST /api/nodes/heartbeat` — 404 if the node never registered.
pub async fn heartbeat(
    State(engine): State<AppState>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let node_id = parse_node_id(&req.node_id);
    let known = dstore_engine::nl::heartbeat(
        engine.metadata().as_ref(),
        engine.stats(),
        &node_id,
        req.available_space,
        req.file_count,
    )
    .map_err(store_err)?;
    if !known {
        return Err((
            StatusCode::NOT_FOUND,
            Json(crate::error::ErrorResponse::new(
                "not_found",
                format!("node {node_id} is not registered"),
            )),
        ));
    }
    Ok(Json(HeartbeatResponse { status: "ok".into() }))
}

/// `GET /api/nodes` (§6.1): full node catalog, active and inactive.
pub async fn list_all(State(engine): State<AppState>) -> Result<Json<NodesResponse>, ApiError> {
    let nodes = engine.metadata().get_all_nodes().map_err(store_err)?;
    Ok(Json(NodesResponse {
        nodes: nodes.iter().map(NodeView::from).collect(),
    }))
}
