//! Route configuration for the coordinator HTTP API (spec §6, §6.1).

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{download, files, nodes, recovery, replication, system, upload};
use crate::state::AppState;

/// Creates the Axum router with every coordinator endpoint configured.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Node liveness
        .route("/api/nodes/register", post(nodes::register))
        .route("/api/nodes/heartbeat", post(nodes::heartbeat))
        .route("/api/nodes", get(nodes::list_all))
        // Upload / download
        .route("/api/upload/request", post(upload::request))
        .route("/api/upload/confirm", post(upload::confirm))
        .route("/api/upload/history", get(system::upload_history))
        .route("/api/download/{file_id}", get(download::download))
        // File catalog (supplemental §6.1)
        .route("/api/files", get(files::list))
        .route("/api/files/{file_id}", get(files::get))
        .route("/api/files/{file_id}", delete(files::delete))
        // Replication control / integrity verification
        .route("/api/replication/force", post(replication::force))
        .route("/api/replication/verify", post(replication::verify))
        // Recovery queue
        .route("/api/recovery/force/{file_id}", post(recovery::force))
        .route("/api/recovery/queue", get(recovery::queue))
        .route("/api/recovery/history", get(recovery::history))
        .route("/api/recovery/stats", get(recovery::stats))
        // System introspection
        .route("/api/system/status", get(system::status))
        .route("/api/stats", get(system::stats))
        .with_state(state)
}
