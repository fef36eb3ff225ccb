//! Download handler (spec §6, §4.1): resolves a file to its currently
//! active replicas so the client can fetch the blob directly from a node.

use axum::extract::{Path, State};
use axum::Json;

use dstore_types::{FileId, ReplicaStatus, StoreError};

use crate::dto::DownloadResponse;
use crate::error::{store_err, ApiError};
use crate::state::AppState;

/// `GET /api/download/{file_id}`: 404 if the file is unknown, 503 if it
/// exists but has no active replica to serve it from.
pub async fn download(
    State(engine): State<AppState>,
    Path(file_id): Path<FileId>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let fwr = engine.metadata().get_file(file_id).map_err(store_err)?;

    let download_urls: Vec<String> = fwr
        .replicas
        .iter()
        .filter(|r| r.status == ReplicaStatus::Active)
        .map(|r| format!("{}/download/{}", r.address, file_id))
        .collect();

    if download_urls.is_empty() {
        return Err(store_err(StoreError::NotEnoughNodes { needed: 1, available: 0 }));
    }

    Ok(Json(DownloadResponse {
        filename: fwr.file.filename,
        file_size: fwr.file.size,
        checksum: fwr.file.checksum,
        download_urls,
    }))
}
