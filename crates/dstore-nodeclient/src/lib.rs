//! HTTP client for the storage-node API (spec §6) and the copy primitive
//! (spec §4.7) used by the Replication Controller and Recovery Queue.

pub mod error;

use std::time::Duration;

use dstore_types::FileId;
pub use error::NodeClientError;
use log::{debug, warn};
use serde::Deserialize;

const COPY_TIMEOUT: Duration = Duration::from_secs(60);
/// Disaster recovery reads from a replica that may be on a node just
/// rejoining after an outage; give it more room than a routine copy.
const DISASTER_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub available_space: u64,
    pub file_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub file_id: FileId,
    pub checksum: String,
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    pub file_id: FileId,
    pub checksum: Option<String>,
    pub size: u64,
    pub exists: bool,
}

/// Thin wrapper over `reqwest::Client` speaking the storage-node's blob
/// protocol. Holds no state about which nodes exist; callers pass the
/// target address on every call.
#[derive(Debug, Clone)]
pub struct NodeClient {
    http: reqwest::Client,
}

impl Default for NodeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub async fn health(&self, address: &str) -> Result<HealthResponse, NodeClientError> {
        let url = format!("{address}/health");
        let response = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| NodeClientError::from_reqwest(e, "health check"))?;
        if !response.status().is_success() {
            return Err(NodeClientError::Status {
                context: format!("health check on {address}"),
                status: response.status().as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| NodeClientError::from_reqwest(e, "parse health response"))
    }

    pub async fn verify(
        &self,
        address: &str,
        file_id: FileId,
    ) -> Result<VerifyResponse, NodeClientError> {
        let url = format!("{address}/verify/{file_id}");
        let response = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| NodeClientError::from_reqwest(e, "verify"))?;
        if !response.status().is_success() {
            return Err(NodeClientError::Status {
                context: format!("verify {file_id} on {address}"),
                status: response.status().as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| NodeClientError::from_reqwest(e, "parse verify response"))
    }

    /// Removes the blob. A 404 is treated as success (already gone).
    pub async fn delete(&self, address: &str, file_id: FileId) -> Result<(), NodeClientError> {
        let url = format!("{address}/delete/{file_id}");
        let response = self
            .http
            .delete(&url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| NodeClientError::from_reqwest(e, "delete"))?;
        if response.status().is_success() || response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(NodeClientError::Status {
            context: format!("delete {file_id} on {address}"),
            status: response.status().as_u16(),
        })
    }

    pub async fn download(
        &self,
        address: &str,
        file_id: FileId,
    ) -> Result<Vec<u8>, NodeClientError> {
        self.download_with_timeout(address, file_id, COPY_TIMEOUT)
            .await
    }

    pub async fn upload(
        &self,
        address: &str,
        file_id: FileId,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, NodeClientError> {
        self.upload_with_timeout(address, file_id, bytes, COPY_TIMEOUT)
            .await
    }

    async fn download_with_timeout(
        &self,
        address: &str,
        file_id: FileId,
        timeout: Duration,
    ) -> Result<Vec<u8>, NodeClientError> {
        let url = format!("{address}/download/{file_id}");
        let response = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| NodeClientError::from_reqwest(e, "download"))?;
        if !response.status().is_success() {
            return Err(NodeClientError::Status {
                context: format!("download {file_id} from {address}"),
                status: response.status().as_u16(),
            });
        }
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| NodeClientError::from_reqwest(e, "read download body"))
    }

    async fn upload_with_timeout(
        &self,
        address: &str,
        file_id: FileId,
        bytes: Vec<u8>,
        timeout: Duration,
    ) -> Result<UploadResponse, NodeClientError> {
        let url = format!("{address}/upload/{file_id}");
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_id.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| NodeClientError::from_reqwest(e, "upload"))?;
        if !response.status().is_success() {
            return Err(NodeClientError::Status {
                context: format!("upload {file_id} to {address}"),
                status: response.status().as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| NodeClientError::from_reqwest(e, "parse upload response"))
    }

    /// Downloads a blob from a node that may only just have come back after
    /// an outage (disaster recovery, spec §4.6.1): same call as `download`,
    /// just with a more generous timeout.
    pub async fn download_generous(
        &self,
        address: &str,
        file_id: FileId,
    ) -> Result<Vec<u8>, NodeClientError> {
        self.download_with_timeout(address, file_id, DISASTER_DOWNLOAD_TIMEOUT)
            .await
    }

    /// Downloads the blob from `source_address` and uploads it to
    /// `target_address`, 60 s timeout on each leg. Does not retry; callers
    /// (RC, RQ) own retry policy.
    pub async fn copy(
        &self,
        file_id: FileId,
        source_address: &str,
        target_address: &str,
    ) -> Result<(), NodeClientError> {
        debug!("copying {file_id} from {source_address} to {target_address}");
        let bytes = self
            .download_with_timeout(source_address, file_id, COPY_TIMEOUT)
            .await
            .inspect_err(|e| warn!("copy of {file_id} failed at download leg: {e}"))?;
        self.upload_with_timeout(target_address, file_id, bytes, COPY_TIMEOUT)
            .await
            .inspect_err(|e| warn!("copy of {file_id} failed at upload leg: {e}"))?;
        Ok(())
    }
}
