//! Recovery Queue introspection and force-recovery handlers (spec §6).

use axum::extract::{Path, State};
use axum::Json;
use log::info;

use dstore_types::FileId;

use crate::dto::{
    ForceAckResponse, RecoveryHistoryItem, RecoveryHistoryResponse, RecoveryQueueItem,
    RecoveryQueueResponse, RecoveryStatsResponse,
};
use crate::error::{store_err, ApiError};
use crate::state::AppState;

const HISTORY_LIMIT: usize = 100;

/// `POST /api/recovery/force/{file_id}`: enqueues the file at the forced
/// priority band. 404 if the file does not exist.
pub async fn force(
    State(engine): State<AppState>,
    Path(file_id): Path<FileId>,
) -> Result<Json<ForceAckResponse>, ApiError> {
    let fwr = engine.metadata().get_file(file_id).map_err(store_err)?;
    let enqueued = engine.force_recovery(file_id, fwr.file.filename);
    info!("recovery forced for {file_id} (newly enqueued: {enqueued})");
    Ok(Json(ForceAckResponse { status: "triggered".into() }))
}

/// `GET /api/recovery/queue`
pub async fn queue(State(engine): State<AppState>) -> Json<RecoveryQueueResponse> {
    let records = engine.queue().snapshot();
    Json(RecoveryQueueResponse {
        length: records.len(),
        queue: records
            .into_iter()
            .map(|r| RecoveryQueueItem {
                file_id: r.file_id,
                filename: r.filename,
                strategy: format!("{:?}", r.strategy),
                priority: r.priority,
                attempts: r.attempts,
                max_attempts: r.max_attempts,
                last_attempt: r.last_attempt,
            })
            .collect(),
    })
}

/// `GET /api/recovery/history`
pub async fn history(State(engine): State<AppState>) -> Json<RecoveryHistoryResponse> {
    let entries = engine.queue().history(HISTORY_LIMIT);
    Json(RecoveryHistoryResponse {
        history: entries
            .into_iter()
            .map(|e| RecoveryHistoryItem {
                file_id: e.file_id,
                filename: e.filename,
                timestamp: e.timestamp,
                success: e.success,
                recovery_time_ms: e.recovery_time_ms,
                attempts: e.attempts,
                priority: e.priority,
                strategy: format!("{:?}", e.strategy),
                error: e.error,
            })
            .collect(),
    })
}

/// `GET /api/recovery/stats`
pub async fn stats(State(engine): State<AppState>) -> Json<RecoveryStatsResponse> {
    let snap = engine.stats().snapshot();
    Json(RecoveryStatsResponse {
        nodes_failed: snap.nodes_failed,
        nodes_recovered: snap.nodes_recovered,
        replications_performed: snap.replications_performed,
        successful_recoveries: snap.successful_recoveries,
        critical_files_recovered: snap.critical_files_recovered,
        failed_recoveries: snap.failed_recoveries,
        average_recovery_ms: snap.average_recovery_ms,
        pending_recoveries: engine.queue().len(),
    })
}
