//! File-based metadata store implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use dstore_types::{
    File, FileId, FileListEntry, FilePage, FileWithReplicas, Node, NodeId, NodeStatus, Replica,
    ReplicaStatus, StoreError, SystemStats, UploadHistoryEntry,
};
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::trait_def::MetadataStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedState {
    files: HashMap<FileId, File>,
    replicas: HashMap<String, Replica>,
    nodes: HashMap<NodeId, Node>,
    history: Vec<UploadHistoryEntry>,
    next_history_id: u64,
}

fn replica_key(file_id: FileId, node_id: &NodeId) -> String {
    format!("{file_id}:{node_id}")
}

impl PersistedState {
    fn replicas_for_file(&self, file_id: FileId) -> Vec<Replica> {
        let mut replicas: Vec<Replica> = self
            .replicas
            .values()
            .filter(|r| r.file_id == file_id)
            .cloned()
            .collect();
        replicas.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        replicas
    }
}

/// File-backed implementation of the MetadataStore trait. Persists the
/// entire state as a single JSON document, rewritten after every mutation.
#[derive(Debug)]
pub struct FileMetadataStore {
    state: Arc<RwLock<PersistedState>>,
    file_path: PathBuf,
}

impl FileMetadataStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        let file_path = Self::setup_metadata_file(data_dir)?;
        let state = Self::load_existing(&file_path)?;

        info!("loaded coordinator metadata from {}", file_path.display());

        let store = Self {
            state: Arc::new(RwLock::new(state)),
            file_path,
        };
        store.persist()?;
        Ok(store)
    }

    fn setup_metadata_file<P: AsRef<Path>>(data_dir: P) -> Result<PathBuf, StoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).map_err(|e| StoreError::Transport {
                context: "setup metadata directory".into(),
                reason: e.to_string(),
            })?;
        }
        Ok(data_dir.join("coordinator_metadata.json"))
    }

    fn load_existing(file_path: &Path) -> Result<PersistedState, StoreError> {
        if !file_path.exists() {
            debug!("metadata file does not exist yet, starting empty");
            return Ok(PersistedState::default());
        }
        let content = std::fs::read_to_string(file_path).map_err(|e| StoreError::Transport {
            context: "load metadata file".into(),
            reason: e.to_string(),
        })?;
        if content.trim().is_empty() {
            return Ok(PersistedState::default());
        }
        serde_json::from_str(&content).map_err(|e| StoreError::Transport {
            context: "parse metadata file".into(),
            reason: e.to_string(),
        })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let state = self.state.read();
        let content = serde_json::to_string_pretty(&*state).map_err(|e| StoreError::Transport {
            context: "serialize metadata".into(),
            reason: e.to_string(),
        })?;
        std::fs::write(&self.file_path, content).map_err(|e| StoreError::Transport {
            context: "write metadata file".into(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

impl MetadataStore for FileMetadataStore {
    fn create_file(
        &self,
        file_id: FileId,
        filename: &str,
        size: u64,
        replication_factor: u32,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        {
            let mut state = self.state.write();
            state.files.insert(
                file_id,
                File {
                    file_id,
                    filename: filename.to_string(),
                    size,
                    checksum: None,
                    replication_factor,
                    created_at: now,
                },
            );
            let id = state.next_history_id;
            state.next_history_id += 1;
            state.history.push(UploadHistoryEntry {
                id,
                file_id,
                filename: filename.to_string(),
                file_size: size,
                upload_timestamp: now,
                success: true,
            });
        }
        self.persist()
    }

    fn get_file(&self, file_id: FileId) -> Result<FileWithReplicas, StoreError> {
        let state = self.state.read();
        let file = state
            .files
            .get(&file_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("file {file_id}")))?;
        Ok(FileWithReplicas {
            file,
            replicas: state.replicas_for_file(file_id),
        })
    }

    fn list_files(&self, limit: u64, offset: u64) -> Result<FilePage, StoreError> {
        let state = self.state.read();
        let mut files: Vec<&File> = state.files.values().collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = files.len() as u64;
        let entries = files
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|file| {
                let replicas = state.replicas_for_file(file.file_id);
                let active_replicas = replicas
                    .iter()
                    .filter(|r| r.status == ReplicaStatus::Active)
                    .count() as u64;
                FileListEntry {
                    file: file.clone(),
                    replica_count: replicas.len() as u64,
                    active_replicas,
                }
            })
            .collect();
        Ok(FilePage {
            files: entries,
            total,
            limit,
            offset,
        })
    }

    fn update_file_checksum(&self, file_id: FileId, checksum: &str) -> Result<(), StoreError> {
        {
            let mut state = self.state.write();
            let file = state
                .files
                .get_mut(&file_id)
                .ok_or_else(|| StoreError::not_found(format!("file {file_id}")))?;
            if file.checksum.is_none() {
                file.checksum = Some(checksum.to_string());
            }
        }
        self.persist()
    }

    fn delete_file(&self, file_id: FileId) -> Result<bool, StoreError> {
        let existed = {
            let mut state = self.state.write();
            let existed = state.files.remove(&file_id).is_some();
            state.replicas.retain(|_, r| r.file_id != file_id);
            existed
        };
        self.persist()?;
        Ok(existed)
    }

    fn add_replica(
        &self,
        file_id: FileId,
        node_id: NodeId,
        address: &str,
        status: ReplicaStatus,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        {
            let mut state = self.state.write();
            let key = replica_key(file_id, &node_id);
            state
                .replicas
                .entry(key)
                .or_insert_with(|| Replica::new(file_id, node_id, address.to_string(), status, now));
        }
        self.persist()
    }

    fn update_replica_status(
        &self,
        file_id: FileId,
        node_id: &NodeId,
        status: ReplicaStatus,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        {
            let mut state = self.state.write();
            let key = replica_key(file_id, node_id);
            let replica = state
                .replicas
                .get_mut(&key)
                .ok_or_else(|| StoreError::not_found(format!("replica ({file_id}, {node_id})")))?;
            replica.status = status;
            if matches!(status, ReplicaStatus::Active | ReplicaStatus::Corrupted) {
                replica.last_verified = Some(now);
            }
        }
        self.persist()
    }

    fn get_replicas(&self, file_id: FileId) -> Result<Vec<Replica>, StoreError> {
        let state = self.state.read();
        Ok(state.replicas_for_file(file_id))
    }

    fn register_node(&self, node_id: NodeId, address: &str) -> Result<bool, StoreError> {
        let now = Utc::now();
        let reactivated = {
            let mut state = self.state.write();
            let reactivated = match state.nodes.get(&node_id) {
                Some(existing) => existing.status == NodeStatus::Inactive,
                None => false,
            };
            state
                .nodes
                .entry(node_id.clone())
                .and_modify(|n| {
                    n.address = address.to_string();
                    n.status = NodeStatus::Active;
                    n.last_heartbeat = now;
                })
                .or_insert_with(|| Node::new(node_id, address.to_string(), now));
            reactivated
        };
        self.persist()?;
        Ok(reactivated)
    }

    fn update_node_heartbeat(
        &self,
        node_id: &NodeId,
        available_space: u64,
        file_count: u64,
    ) -> Result<Option<bool>, StoreError> {
        let now = Utc::now();
        let result = {
            let mut state = self.state.write();
            let Some(node) = state.nodes.get_mut(node_id) else {
                return Ok(None);
            };
            let reactivated = node.status == NodeStatus::Inactive;
            node.last_heartbeat = now;
            node.available_space = available_space;
            node.file_count = file_count;
            node.status = NodeStatus::Active;
            reactivated
        };
        self.persist()?;
        Ok(Some(result))
    }

    fn get_active_nodes(&self, timeout: Duration) -> Result<Vec<Node>, StoreError> {
        let now = Utc::now();
        let mut dirty = false;
        let active = {
            let mut state = self.state.write();
            let stale: Vec<NodeId> = state
                .nodes
                .values()
                .filter(|n| n.status == NodeStatus::Active && !n.is_fresh(now, timeout))
                .map(|n| n.node_id.clone())
                .collect();
            for node_id in &stale {
                if let Some(node) = state.nodes.get_mut(node_id) {
                    node.status = NodeStatus::Inactive;
                }
                for replica in state.replicas.values_mut() {
                    if &replica.node_id == node_id && replica.status == ReplicaStatus::Active {
                        replica.status = ReplicaStatus::Inactive;
                    }
                }
                dirty = true;
            }
            let mut active: Vec<Node> = state
                .nodes
                .values()
                .filter(|n| n.status == NodeStatus::Active)
                .cloned()
                .collect();
            active.sort_by(|a, b| {
                b.available_space
                    .cmp(&a.available_space)
                    .then(a.created_at.cmp(&b.created_at))
            });
            active
        };
        if dirty {
            self.persist()?;
        }
        Ok(active)
    }

    fn get_all_nodes(&self) -> Result<Vec<Node>, StoreError> {
        let state = self.state.read();
        let mut nodes: Vec<Node> = state.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(nodes)
    }

    fn mark_node_inactive(&self, node_id: &NodeId) -> Result<(), StoreError> {
        {
            let mut state = self.state.write();
            if let Some(node) = state.nodes.get_mut(node_id) {
                node.status = NodeStatus::Inactive;
            }
        }
        self.persist()
    }

    fn inactivate_active_replicas_for_node(&self, node_id: &NodeId) -> Result<u64, StoreError> {
        let flipped = {
            let mut state = self.state.write();
            let mut flipped = 0u64;
            for replica in state.replicas.values_mut() {
                if &replica.node_id == node_id && replica.status == ReplicaStatus::Active {
                    replica.status = ReplicaStatus::Inactive;
                    flipped += 1;
                }
            }
            flipped
        };
        if flipped > 0 {
            self.persist()?;
        }
        Ok(flipped)
    }

    fn get_stats(&self) -> Result<SystemStats, StoreError> {
        let state = self.state.read();
        let total_size: u64 = state.files.values().map(|f| f.size).sum();
        let active_nodes = state
            .nodes
            .values()
            .filter(|n| n.status == NodeStatus::Active)
            .count() as u64;
        Ok(SystemStats {
            total_files: state.files.len() as u64,
            total_size,
            total_nodes: state.nodes.len() as u64,
            active_nodes,
        })
    }

    fn get_upload_history(&self, limit: u64) -> Result<Vec<UploadHistoryEntry>, StoreError> {
        let state = self.state.read();
        let mut history = state.history.clone();
        history.sort_by(|a, b| b.upload_timestamp.cmp(&a.upload_timestamp));
        history.truncate(limit as usize);
        Ok(history)
    }
}
