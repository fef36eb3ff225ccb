//! Entity types of the availability engine's data model.

use crate::ids::{FileId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness state of a storage node, derived from heartbeat freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Active,
    Inactive,
}

/// Status of one physical copy of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaStatus {
    /// Coordinator promised the slot; upload not yet confirmed.
    Pending,
    /// Confirmed present and verified on an active node.
    Active,
    /// Integrity verification found a checksum mismatch.
    Corrupted,
    /// The node holding this replica is inactive.
    Inactive,
}

/// A registered storage node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: NodeId,
    pub address: String,
    pub status: NodeStatus,
    pub available_space: u64,
    pub file_count: u64,
    pub last_heartbeat: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Node {
    pub fn new(node_id: NodeId, address: String, now: DateTime<Utc>) -> Self {
        Self {
            node_id,
            address,
            status: NodeStatus::Active,
            available_space: 0,
            file_count: 0,
            last_heartbeat: now,
            created_at: now,
        }
    }

    /// True if this node's heartbeat is fresh enough to be considered live.
    pub fn is_fresh(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_heartbeat) < timeout
    }

    /// Builder helper for tests and fixtures.
    pub fn with_space(mut self, available_space: u64) -> Self {
        self.available_space = available_space;
        self
    }
}

/// A client-visible blob, immutable after upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub file_id: FileId,
    pub filename: String,
    pub size: u64,
    pub checksum: Option<String>,
    pub replication_factor: u32,
    pub created_at: DateTime<Utc>,
}

/// One physical copy of a File on one Node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    pub file_id: FileId,
    pub node_id: NodeId,
    pub address: String,
    pub status: ReplicaStatus,
    pub last_verified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Replica {
    pub fn new(file_id: FileId, node_id: NodeId, address: String, status: ReplicaStatus, now: DateTime<Utc>) -> Self {
        Self {
            file_id,
            node_id,
            address,
            status,
            last_verified: None,
            created_at: now,
        }
    }
}

/// A File joined with its current Replica set, as returned by `get_file`/`list_files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileWithReplicas {
    pub file: File,
    pub replicas: Vec<Replica>,
}

impl FileWithReplicas {
    pub fn active_replicas(&self) -> usize {
        self.replicas
            .iter()
            .filter(|r| r.status == ReplicaStatus::Active)
            .count()
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }
}

/// Append-only audit record of an upload attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadHistoryEntry {
    pub id: u64,
    pub file_id: FileId,
    pub filename: String,
    pub file_size: u64,
    pub upload_timestamp: DateTime<Utc>,
    pub success: bool,
}

/// A page of files plus the total count, for `list_files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePage {
    pub files: Vec<FileListEntry>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Summary row used by `list_files`: a File plus its replica aggregate counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileListEntry {
    pub file: File,
    pub replica_count: u64,
    pub active_replicas: u64,
}

/// Aggregate counters exposed via the introspection endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_files: u64,
    pub total_size: u64,
    pub total_nodes: u64,
    pub active_nodes: u64,
}
