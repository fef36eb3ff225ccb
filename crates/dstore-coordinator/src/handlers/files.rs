//! File catalog handlers (spec §6.1 supplemental read/delete surface).

use axum::extract::{Path, Query, State};
use axum::Json;

use dstore_types::FileId;

use crate::dto::{DeleteFileResponse, FileDetailResponse, FileListItem, FileListResponse, PageQuery};
use crate::error::{store_err, ApiError};
use crate::state::AppState;

const DEFAULT_PAGE_LIMIT: u64 = 50;

/// `GET /api/files`
pub async fn list(
    State(engine): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<FileListResponse>, ApiError> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = page.offset.unwrap_or(0);
    let fp = engine.metadata().list_files(limit, offset).map_err(store_err)?;
    Ok(Json(FileListResponse {
        files: fp
            .files
            .iter()
            .map(|entry| FileListItem {
                file_id: entry.file.file_id,
                filename: entry.file.filename.clone(),
                size: entry.file.size,
                replication_factor: entry.file.replication_factor,
                replica_count: entry.replica_count,
                active_replicas: entry.active_replicas,
            })
            .collect(),
        total: fp.total,
        limit: fp.limit,
        offset: fp.offset,
    }))
}

/// `GET /api/files/{file_id}`
pub async fn get(
    State(engine): State<AppState>,
    Path(file_id): Path<FileId>,
) -> Result<Json<FileDetailResponse>, ApiError> {
    let fwr = engine.metadata().get_file(file_id).map_err(store_err)?;
    Ok(Json(FileDetailResponse::new(&fwr.file, &fwr.replicas)))
}

/// `DELETE /api/files/{file_id}`: cascades to the file's replica rows.
/// Idempotent by design of the underlying store; a second call against an
/// already-deleted file surfaces as a 404.
pub async fn delete(
    State(engine): State<AppState>,
    Path(file_id): Path<FileId>,
) -> Result<Json<DeleteFileResponse>, ApiError> {
    let deleted = engine.metadata().delete_file(file_id).map_err(store_err)?;
    if !deleted {
        return Err(store_err(dstore_types::StoreError::not_found(format!(
            "file {file_id}"
        ))));
    }
    Ok(Json(DeleteFileResponse { status: "deleted".into() }))
}
