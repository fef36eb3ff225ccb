//! Request/response bodies of the coordinator API (spec §6, §6.1).

use dstore_types::{File, FileId, Node, NodeId, Replica, ReplicaStatus, SystemStats, UploadHistoryEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterNodeRequest {
    pub node_id: String,
    pub node_address: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterNodeResponse {
    pub status: String,
    pub node_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub node_id: String,
    pub available_space: u64,
    pub file_count: u64,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct NodeView {
    pub node_id: String,
    pub address: String,
    pub status: &'static str,
    pub available_space: u64,
    pub file_count: u64,
    pub last_heartbeat: chrono::DateTime<chrono::Utc>,
}

impl From<&Node> for NodeView {
    fn from(n: &Node) -> Self {
        Self {
            node_id: n.node_id.to_string(),
            address: n.address.clone(),
            status: match n.status {
                dstore_types::NodeStatus::Active => "active",
                dstore_types::NodeStatus::Inactive => "inactive",
            },
            available_space: n.available_space,
            file_count: n.file_count,
            last_heartbeat: n.last_heartbeat,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NodesResponse {
    pub nodes: Vec<NodeView>,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    pub file_size: u64,
    pub replication_factor: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UploadSlot {
    pub node_id: String,
    pub upload_url: String,
}

#[derive(Debug, Serialize)]
pub struct UploadRequestResponse {
    pub file_id: FileId,
    pub upload_nodes: Vec<UploadSlot>,
}

#[derive(Debug, Deserialize)]
pub struct UploadConfirmRequest {
    pub file_id: FileId,
    pub node_id: String,
    pub checksum: String,
}

#[derive(Debug, Serialize)]
pub struct UploadConfirmResponse {
    pub status: String,
    pub file_id: FileId,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub filename: String,
    pub file_size: u64,
    pub checksum: Option<String>,
    pub download_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplicaView {
    pub node_id: String,
    pub address: String,
    pub status: &'static str,
    pub last_verified: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&Replica> for ReplicaView {
    fn from(r: &Replica) -> Self {
        Self {
            node_id: r.node_id.to_string(),
            address: r.address.clone(),
            status: status_label(r.status),
            last_verified: r.last_verified,
        }
    }
}

fn status_label(status: ReplicaStatus) -> &'static str {
    match status {
        ReplicaStatus::Pending => "pending",
        ReplicaStatus::Active => "active",
        ReplicaStatus::Corrupted => "corrupted",
        ReplicaStatus::Inactive => "inactive",
    }
}

#[derive(Debug, Serialize)]
pub struct FileDetailResponse {
    pub file_id: FileId,
    pub filename: String,
    pub size: u64,
    pub checksum: Option<String>,
    pub replication_factor: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub replicas: Vec<ReplicaView>,
}

impl FileDetailResponse {
    pub fn new(file: &File, replicas: &[Replica]) -> Self {
        Self {
            file_id: file.file_id,
            filename: file.filename.clone(),
            size: file.size,
            checksum: file.checksum.clone(),
            replication_factor: file.replication_factor,
            created_at: file.created_at,
            replicas: replicas.iter().map(ReplicaView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileListItem {
    pub file_id: FileId,
    pub filename: String,
    pub size: u64,
    pub replication_factor: u32,
    pub replica_count: u64,
    pub active_replicas: u64,
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileListItem>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct DeleteFileResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ForceAckResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RecoveryHistoryItem {
    pub file_id: FileId,
    pub filename: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub success: bool,
    pub recovery_time_ms: u64,
    pub attempts: u32,
    pub priority: i32,
    pub strategy: String,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecoveryHistoryResponse {
    pub history: Vec<RecoveryHistoryItem>,
}

#[derive(Debug, Serialize)]
pub struct RecoveryQueueItem {
    pub file_id: FileId,
    pub filename: String,
    pub strategy: String,
    pub priority: i32,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_attempt: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RecoveryQueueResponse {
    pub queue: Vec<RecoveryQueueItem>,
    pub length: usize,
}

#[derive(Debug, Serialize)]
pub struct RecoveryStatsResponse {
    pub nodes_failed: u64,
    pub nodes_recovered: u64,
    pub replications_performed: u64,
    pub successful_recoveries: u64,
    pub critical_files_recovered: u64,
    pub failed_recoveries: u64,
    pub average_recovery_ms: f64,
    pub pending_recoveries: usize,
}

#[derive(Debug, Serialize)]
pub struct SystemStatusResponse {
    pub total_files: u64,
    pub total_size: u64,
    pub total_nodes: u64,
    pub active_nodes: u64,
    pub pending_recoveries: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub system: SystemStatusResponse,
    pub recovery: RecoveryStatsResponse,
}

#[derive(Debug, Serialize)]
pub struct UploadHistoryItem {
    pub id: u64,
    pub file_id: FileId,
    pub filename: String,
    pub file_size: u64,
    pub upload_timestamp: chrono::DateTime<chrono::Utc>,
    pub success: bool,
}

impl From<&UploadHistoryEntry> for UploadHistoryItem {
    fn from(e: &UploadHistoryEntry) -> Self {
        Self {
            id: e.id,
            file_id: e.file_id,
            filename: e.filename.clone(),
            file_size: e.file_size,
            upload_timestamp: e.upload_timestamp,
            success: e.success,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadHistoryResponse {
    pub history: Vec<UploadHistoryItem>,
}

pub fn parse_node_id(raw: &str) -> NodeId {
    NodeId::from(raw)
}
