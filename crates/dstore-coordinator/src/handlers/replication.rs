//! Replication/verification force-check handlers (spec §6).

use axum::extract::State;
use axum::Json;
use log::info;

use crate::dto::ForceAckResponse;
use crate::state::AppState;

/// `POST /api/replication/force`: wakes the RC loop immediately instead of
/// waiting for its next `rc_tick`.
pub async fn force(State(engine): State<AppState>) -> Json<ForceAckResponse> {
    engine.force_replication_check().await;
    info!("replication check forced");
    Json(ForceAckResponse { status: "triggered".into() })
}

/// `POST /api/replication/verify`: wakes the IV loop immediately instead of
/// waiting for its next `iv_tick`.
pub async fn verify(State(engine): State<AppState>) -> Json<ForceAckResponse> {
    engine.force_verification().await;
    info!("integrity verification forced");
    Json(ForceAckResponse { status: "triggered".into() })
}
