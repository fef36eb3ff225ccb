//! Maps `StoreError`/`PlacementError` onto the JSON error body and HTTP
//! status codes of spec §7's propagation policy.

use axum::http::StatusCode;
use dstore_placement::PlacementError;
use dstore_types::StoreError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

pub fn error_to_status_code(error: &str) -> StatusCode {
    match error {
        "not_found" => StatusCode::NOT_FOUND,
        "not_enough_nodes" | "no_active_replicas" => StatusCode::SERVICE_UNAVAILABLE,
        "conflict" => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StoreError> for ErrorResponse {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { context } => ErrorResponse::new("not_found", context),
            StoreError::NotEnoughNodes { needed, available } => ErrorResponse::new(
                "not_enough_nodes",
                format!("needed {needed} live nodes, only {available} available"),
            ),
            StoreError::Transport { context, reason } => {
                ErrorResponse::new("transport_error", format!("{context}: {reason}"))
            }
            StoreError::ChecksumMismatch { context } => {
                ErrorResponse::new("checksum_mismatch", context)
            }
            StoreError::Conflict { context } => ErrorResponse::new("conflict", context),
            StoreError::Exhausted { context } => ErrorResponse::new("exhausted", context),
            StoreError::Shutdown => ErrorResponse::new("shutdown", "engine is shutting down"),
        }
    }
}

impl From<PlacementError> for ErrorResponse {
    fn from(err: PlacementError) -> Self {
        match err {
            PlacementError::NotEnoughNodes { needed, available } => ErrorResponse::new(
                "not_enough_nodes",
                format!("needed {needed} live nodes, only {available} available"),
            ),
        }
    }
}

pub type ApiError = (StatusCode, axum::Json<ErrorResponse>);

pub fn store_err(err: StoreError) -> ApiError {
    let resp = ErrorResponse::from(err);
    (error_to_status_code(&resp.error), axum::Json(resp))
}

pub fn placement_err(err: PlacementError) -> ApiError {
    let resp = ErrorResponse::from(err);
    (error_to_status_code(&resp.error), axum::Json(resp))
}
