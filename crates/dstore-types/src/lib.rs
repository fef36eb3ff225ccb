//! Shared identity, entity, and error types for the distributed file store
//! availability engine.

pub mod error;
pub mod ids;
pub mod model;

pub use error::StoreError;
pub use ids::{FileId, NodeId};
pub use model::{
    File, FileListEntry, FilePage, FileWithReplicas, Node, NodeStatus, Replica, ReplicaStatus,
    SystemStats, UploadHistoryEntry,
};

// Re-export logging macros for consistent usage across the workspace.
pub use log::{debug, error, info, trace, warn};
