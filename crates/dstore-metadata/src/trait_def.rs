//! Metadata store trait definition (spec §4.1).

use chrono::Duration;
use dstore_types::{
    FileId, FilePage, FileWithReplicas, Node, NodeId, Replica, ReplicaStatus, StoreError,
    SystemStats, UploadHistoryEntry,
};

/// Durable record of files, replicas, nodes, and upload history.
///
/// Every write below is a single serialized transaction: a failed call leaves
/// no partial state. Reads may observe a slightly stale active/inactive view
/// but never a torn write.
pub trait MetadataStore: Send + Sync {
    /// Insert a File and an UploadHistory row atomically.
    fn create_file(
        &self,
        file_id: FileId,
        filename: &str,
        size: u64,
        replication_factor: u32,
    ) -> Result<(), StoreError>;

    /// Return a File joined with its Replicas, or `ErrNotFound`.
    fn get_file(&self, file_id: FileId) -> Result<FileWithReplicas, StoreError>;

    /// Paginated listing with replica aggregate counts per file.
    fn list_files(&self, limit: u64, offset: u64) -> Result<FilePage, StoreError>;

    /// Idempotent: does not overwrite a non-null checksum (first write wins).
    fn update_file_checksum(&self, file_id: FileId, checksum: &str) -> Result<(), StoreError>;

    /// Cascades to the File's Replicas. Returns whether a row was deleted.
    fn delete_file(&self, file_id: FileId) -> Result<bool, StoreError>;

    /// Insert a Replica. If `(file_id, node_id)` already exists, this is a no-op
    /// (retries of the same repair must be safe).
    fn add_replica(
        &self,
        file_id: FileId,
        node_id: NodeId,
        address: &str,
        status: ReplicaStatus,
    ) -> Result<(), StoreError>;

    /// Updates status; stamps `last_verified = now` when transitioning to
    /// `active` or `corrupted`.
    fn update_replica_status(
        &self,
        file_id: FileId,
        node_id: &NodeId,
        status: ReplicaStatus,
    ) -> Result<(), StoreError>;

    fn get_replicas(&self, file_id: FileId) -> Result<Vec<Replica>, StoreError>;

    /// Upsert; resets status to `active` and stamps the heartbeat. Returns
    /// `true` if the node previously existed and was `inactive` (a recovery).
    fn register_node(&self, node_id: NodeId, address: &str) -> Result<bool, StoreError>;

    /// Updates heartbeat fields and sets status to `active`. Returns `None` if
    /// the node is unknown, or `Some(reactivated)` otherwise.
    fn update_node_heartbeat(
        &self,
        node_id: &NodeId,
        available_space: u64,
        file_count: u64,
    ) -> Result<Option<bool>, StoreError>;

    /// Returns nodes whose heartbeat is within `timeout`. As a side effect,
    /// lazily inactivates (node + cascaded replicas) any node found stale at
    /// read time, so a read never reports a ghost node as active.
    fn get_active_nodes(&self, timeout: Duration) -> Result<Vec<Node>, StoreError>;

    /// All nodes regardless of status, for the liveness loop and introspection.
    fn get_all_nodes(&self) -> Result<Vec<Node>, StoreError>;

    fn mark_node_inactive(&self, node_id: &NodeId) -> Result<(), StoreError>;

    /// Flips every `active` Replica on `node_id` to `inactive`. Returns the
    /// number of replicas changed. This is the cascade NL performs when a
    /// node transitions to inactive.
    fn inactivate_active_replicas_for_node(&self, node_id: &NodeId) -> Result<u64, StoreError>;

    fn get_stats(&self) -> Result<SystemStats, StoreError>;

    fn get_upload_history(&self, limit: u64) -> Result<Vec<UploadHistoryEntry>, StoreError>;
}
