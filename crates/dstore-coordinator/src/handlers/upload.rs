//! Upload slot request/confirm handlers (spec §6, §4.3, §4.1).

use axum::extract::State;
use axum::Json;
use log::info;

use dstore_types::{FileId, ReplicaStatus};

use crate::dto::{
    parse_node_id, UploadConfirmRequest, UploadConfirmResponse, UploadRequest,
    UploadRequestResponse, UploadSlot,
};
use crate::error::{placement_err, store_err, ApiError};
use crate::state::AppState;

/// `POST /api/upload/request`: places `replication_factor` (default
/// `min_replicas`) pending replicas on the best-available live nodes, or
/// 503 if the placement policy cannot find enough of them.
pub async fn request(
    State(engine): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadRequestResponse>, ApiError> {
    let config = *engine.config();
    let replication_factor = req.replication_factor.unwrap_or(config.min_replicas).max(2);

    let active_nodes = engine
        .metadata()
        .get_active_nodes(config.heartbeat_timeout_chrono())
        .map_err(store_err)?;
    let targets = dstore_placement::choose_targets(&active_nodes, &[], replication_factor)
        .map_err(placement_err)?;

    let file_id = FileId::new();
    engine
        .metadata()
        .create_file(file_id, &req.filename, req.file_size, replication_factor)
        .map_err(store_err)?;

    let mut upload_nodes = Vec::with_capacity(targets.len());
    for target in &targets {
        engine
            .metadata()
            .add_replica(file_id, target.node_id.clone(), &target.address, ReplicaStatus::Pending)
            .map_err(store_err)?;
        upload_nodes.push(UploadSlot {
            node_id: target.node_id.to_string(),
            upload_url: format!("{}/upload/{file_id}", target.address),
        });
    }

    info!("upload slot granted for {file_id} ({} targets)", upload_nodes.len());
    Ok(Json(UploadRequestResponse { file_id, upload_nodes }))
}

/// `POST /api/upload/confirm`: flips the named replica to `active` and
/// sets the file's checksum if it was not already recorded.
pub async fn confirm(
    State(engine): State<AppState>,
    Json(req): Json<UploadConfirmRequest>,
) -> Result<Json<UploadConfirmResponse>, ApiError> {
    // Ensures the file exists before touching its replicas, so an unknown
    // file_id surfaces as ErrNotFound rather than a replica-table miss.
    engine.metadata().get_file(req.file_id).map_err(store_err)?;

    let node_id = parse_node_id(&req.node_id);
    engine
        .metadata()
        .update_replica_status(req.file_id, &node_id, ReplicaStatus::Active)
        .map_err(store_err)?;
    engine
        .metadata()
        .update_file_checksum(req.file_id, &req.checksum)
        .map_err(store_err)?;

    info!("upload confirmed for {} on {node_id}", req.file_id);
    Ok(Json(UploadConfirmResponse {
        status: "confirmed".into(),
        file_id: req.file_id,
    }))
}
