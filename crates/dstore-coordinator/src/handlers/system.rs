//! System-wide introspection handlers (spec §6, §6.1).

use axum::extract::{Query, State};
use axum::Json;

use crate::dto::{
    PageQuery, StatsResponse, SystemStatusResponse, UploadHistoryItem, UploadHistoryResponse,
};
use crate::error::{store_err, ApiError};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: u64 = 50;

/// `GET /api/system/status`
pub async fn status(State(engine): State<AppState>) -> Result<Json<SystemStatusResponse>, ApiError> {
    let stats = engine.metadata().get_stats().map_err(store_err)?;
    Ok(Json(SystemStatusResponse {
        total_files: stats.total_files,
        total_size: stats.total_size,
        total_nodes: stats.total_nodes,
        active_nodes: stats.active_nodes,
        pending_recoveries: engine.queue().len(),
    }))
}

/// `GET /api/stats`: combines system and recovery counters in one call.
pub async fn stats(State(engine): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let system_stats = engine.metadata().get_stats().map_err(store_err)?;
    let recovery = engine.stats().snapshot();
    Ok(Json(StatsResponse {
        system: SystemStatusResponse {
            total_files: system_stats.total_files,
            total_size: system_stats.total_size,
            total_nodes: system_stats.total_nodes,
            active_nodes: system_stats.active_nodes,
            pending_recoveries: engine.queue().len(),
        },
        recovery: crate::dto::RecoveryStatsResponse {
            nodes_failed: recovery.nodes_failed,
            nodes_recovered: recovery.nodes_recovered,
            replications_performed: recovery.replications_performed,
            successful_recoveries: recovery.successful_recoveries,
            critical_files_recovered: recovery.critical_files_recovered,
            failed_recoveries: recovery.failed_recoveries,
            average_recovery_ms: recovery.average_recovery_ms,
            pending_recoveries: engine.queue().len(),
        },
    }))
}

/// `GET /api/upload/history`
pub async fn upload_history(
    State(engine): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<UploadHistoryResponse>, ApiError> {
    let limit = page.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let entries = engine.metadata().get_upload_history(limit).map_err(store_err)?;
    Ok(Json(UploadHistoryResponse {
        history: entries.iter().map(UploadHistoryItem::from).collect(),
    }))
}
