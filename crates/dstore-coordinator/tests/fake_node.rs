//! In-process fake storage node (spec §10.5 test tooling), mirrored from
//! `dstore-engine`'s test harness so the coordinator's end-to-end tests can
//! drive a real upload/download round trip without a second real process.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use dstore_types::FileId;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;

#[derive(Default)]
struct Store {
    blobs: HashMap<FileId, Vec<u8>>,
}

#[derive(Clone)]
pub struct FakeNode {
    store: Arc<Mutex<Store>>,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    node_id: String,
    available_space: u64,
    file_count: u64,
}

#[derive(Serialize)]
struct UploadBody {
    status: &'static str,
    file_id: FileId,
    checksum: String,
    size: u64,
}

#[derive(Serialize)]
struct VerifyBody {
    file_id: FileId,
    checksum: Option<String>,
    size: u64,
    exists: bool,
}

#[allow(dead_code)]
impl FakeNode {
    pub fn empty() -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
        }
    }

    pub fn blob(&self, file_id: FileId) -> Option<Vec<u8>> {
        self.store.lock().blobs.get(&file_id).cloned()
    }

    fn router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/verify/{file_id}", get(verify))
            .route("/delete/{file_id}", delete(delete_blob))
            .route("/download/{file_id}", get(download))
            .route("/upload/{file_id}", post(upload))
            .with_state(self.store)
    }

    pub async fn spawn(self) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake node");
        let addr = listener.local_addr().expect("failed to read local addr");
        let app = self.router();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake node server failed");
        });
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        (format!("http://{addr}"), handle)
    }
}

async fn health(State(store): State<Arc<Mutex<Store>>>) -> Json<HealthBody> {
    let count = store.lock().blobs.len() as u64;
    Json(HealthBody {
        status: "ok",
        node_id: "fake".into(),
        available_space: 1_000_000,
        file_count: count,
    })
}

async fn verify(
    State(store): State<Arc<Mutex<Store>>>,
    Path(file_id): Path<FileId>,
) -> Json<VerifyBody> {
    let store = store.lock();
    match store.blobs.get(&file_id) {
        Some(bytes) => Json(VerifyBody {
            file_id,
            checksum: Some(hex_sha256(bytes)),
            size: bytes.len() as u64,
            exists: true,
        }),
        None => Json(VerifyBody { file_id, checksum: None, size: 0, exists: false }),
    }
}

async fn delete_blob(
    State(store): State<Arc<Mutex<Store>>>,
    Path(file_id): Path<FileId>,
) -> StatusCode {
    store.lock().blobs.remove(&file_id);
    StatusCode::NO_CONTENT
}

async fn download(
    State(store): State<Arc<Mutex<Store>>>,
    Path(file_id): Path<FileId>,
) -> Result<Vec<u8>, StatusCode> {
    store
        .lock()
        .blobs
        .get(&file_id)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)
}

async fn upload(
    State(store): State<Arc<Mutex<Store>>>,
    Path(file_id): Path<FileId>,
    mut multipart: Multipart,
) -> Result<Json<UploadBody>, StatusCode> {
    let mut bytes = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        if field.name() == Some("file") {
            bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?.to_vec();
        }
    }
    let checksum = hex_sha256(&bytes);
    let size = bytes.len() as u64;
    store.lock().blobs.insert(file_id, bytes);
    Ok(Json(UploadBody { status: "ok", file_id, checksum, size }))
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
