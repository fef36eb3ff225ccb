//! In-memory metadata store implementation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use dstore_types::{
    File, FileId, FileListEntry, FilePage, FileWithReplicas, Node, NodeId, NodeStatus, Replica,
    ReplicaStatus, StoreError, SystemStats, UploadHistoryEntry,
};
use parking_lot::RwLock;

use crate::trait_def::MetadataStore;

#[derive(Debug, Default)]
struct State {
    files: HashMap<FileId, File>,
    replicas: HashMap<(FileId, NodeId), Replica>,
    nodes: HashMap<NodeId, Node>,
    history: Vec<UploadHistoryEntry>,
    next_history_id: u64,
}

impl State {
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

/// In-memory implementation of the MetadataStore trait, suitable for
/// development, testing, and single-node deployments where persistence
/// across restarts is not required.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Inactivates a node and cascades to its active replicas. Shared by the
/// liveness tick and the lazy `get_active_nodes` safety net (spec §9).
fn inactivate_node_locked(state: &mut State, node_id: &NodeId) -> u64 {
    if let Some(node) = state.nodes.get_mut(node_id) {
        node.status = NodeStatus::Inactive;
    }
    let mut flipped = 0u64;
    for replica in state.replicas.values_mut() {
        if &replica.node_id == node_id && replica.status == ReplicaStatus::Active {
            replica.status = ReplicaStatus::Inactive;
            flipped += 1;
        }
    }
    flipped
}

impl MetadataStore for InMemoryMetadataStore {
    fn create_file(
        &self,
        file_id: FileId,
        filename: &str,
        size: u64,
        replication_factor: u32,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
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
        Ok(())
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
        let mut state = self.state.write();
        let file = state
            .files
            .get_mut(&file_id)
            .ok_or_else(|| StoreError::not_found(format!("file {file_id}")))?;
        if file.checksum.is_none() {
            file.checksum = Some(checksum.to_string());
        }
        Ok(())
    }

    fn delete_file(&self, file_id: FileId) -> Result<bool, StoreError> {
        let mut state = self.state.write();
        let existed = state.files.remove(&file_id).is_some();
        state.replicas.retain(|(f, _), _| *f != file_id);
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
        let mut state = self.state.write();
        state
            .replicas
            .entry((file_id, node_id.clone()))
            .or_insert_with(|| Replica::new(file_id, node_id, address.to_string(), status, now));
        Ok(())
    }

    fn update_replica_status(
        &self,
        file_id: FileId,
        node_id: &NodeId,
        status: ReplicaStatus,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut state = self.state.write();
        let replica = state
            .replicas
            .get_mut(&(file_id, node_id.clone()))
            .ok_or_else(|| StoreError::not_found(format!("replica ({file_id}, {node_id})")))?;
        replica.status = status;
        if matches!(status, ReplicaStatus::Active | ReplicaStatus::Corrupted) {
            replica.last_verified = Some(now);
        }
        Ok(())
    }

    fn get_replicas(&self, file_id: FileId) -> Result<Vec<Replica>, StoreError> {
        let state = self.state.read();
        Ok(state.replicas_for_file(file_id))
    }

    fn register_node(&self, node_id: NodeId, address: &str) -> Result<bool, StoreError> {
        let now = Utc::now();
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
        Ok(reactivated)
    }

    fn update_node_heartbeat(
        &self,
        node_id: &NodeId,
        available_space: u64,
        file_count: u64,
    ) -> Result<Option<bool>, StoreError> {
        let now = Utc::now();
        let mut state = self.state.write();
        let Some(node) = state.nodes.get_mut(node_id) else {
            return Ok(None);
        };
        let reactivated = node.status == NodeStatus::Inactive;
        node.last_heartbeat = now;
        node.available_space = available_space;
        node.file_count = file_count;
        node.status = NodeStatus::Active;
        Ok(Some(reactivated))
    }

    fn get_active_nodes(&self, timeout: Duration) -> Result<Vec<Node>, StoreError> {
        let now = Utc::now();
        let mut state = self.state.write();
        let stale: Vec<NodeId> = state
            .nodes
            .values()
            .filter(|n| n.status == NodeStatus::Active && !n.is_fresh(now, timeout))
            .map(|n| n.node_id.clone())
            .collect();
        for node_id in &stale {
            inactivate_node_locked(&mut state, node_id);
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
        Ok(active)
    }

    fn get_all_nodes(&self) -> Result<Vec<Node>, StoreError> {
        let state = self.state.read();
        let mut nodes: Vec<Node> = state.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(nodes)
    }

    fn mark_node_inactive(&self, node_id: &NodeId) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if let Some(node) = state.nodes.get_mut(node_id) {
            node.status = NodeStatus::Inactive;
        }
        Ok(())
    }

    fn inactivate_active_replicas_for_node(&self, node_id: &NodeId) -> Result<u64, StoreError> {
        let mut state = self.state.write();
        let mut flipped = 0u64;
        for replica in state.replicas.values_mut() {
            if &replica.node_id == node_id && replica.status == ReplicaStatus::Active {
                replica.status = ReplicaStatus::Inactive;
                flipped += 1;
            }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryMetadataStore {
        InMemoryMetadataStore::new()
    }

    #[test]
    fn create_and_get_file() {
        let ms = store();
        let id = FileId::new();
        ms.create_file(id, "a.txt", 10, 2).unwrap();
        let fwr = ms.get_file(id).unwrap();
        assert_eq!(fwr.file.filename, "a.txt");
        assert!(fwr.replicas.is_empty());
    }

    #[test]
    fn update_file_checksum_is_idempotent_first_wins() {
        let ms = store();
        let id = FileId::new();
        ms.create_file(id, "a.txt", 10, 2).unwrap();
        ms.update_file_checksum(id, "first").unwrap();
        ms.update_file_checksum(id, "second").unwrap();
        let fwr = ms.get_file(id).unwrap();
        assert_eq!(fwr.file.checksum.as_deref(), Some("first"));
    }

    #[test]
    fn add_replica_is_upsert_or_noop() {
        let ms = store();
        let id = FileId::new();
        ms.create_file(id, "a.txt", 10, 2).unwrap();
        let node = NodeId::from("n1");
        ms.add_replica(id, node.clone(), "http://n1", ReplicaStatus::Active)
            .unwrap();
        ms.add_replica(id, node.clone(), "http://n1-new", ReplicaStatus::Pending)
            .unwrap();
        let replicas = ms.get_replicas(id).unwrap();
        assert_eq!(replicas.len(), 1);
        assert_eq!(replicas[0].status, ReplicaStatus::Active);
        assert_eq!(replicas[0].address, "http://n1");
    }

    #[test]
    fn delete_file_cascades_replicas() {
        let ms = store();
        let id = FileId::new();
        ms.create_file(id, "a.txt", 10, 2).unwrap();
        ms.add_replica(id, NodeId::from("n1"), "http://n1", ReplicaStatus::Active)
            .unwrap();
        assert!(ms.delete_file(id).unwrap());
        assert!(ms.get_file(id).is_err());
        assert!(ms.get_replicas(id).unwrap().is_empty());
    }

    #[test]
    fn register_node_reports_reactivation() {
        let ms = store();
        let node = NodeId::from("n1");
        assert!(!ms.register_node(node.clone(), "http://n1").unwrap());
        ms.mark_node_inactive(&node).unwrap();
        assert!(ms.register_node(node.clone(), "http://n1").unwrap());
    }

    #[test]
    fn heartbeat_unknown_node_returns_none() {
        let ms = store();
        let result = ms.update_node_heartbeat(&NodeId::from("ghost"), 100, 0).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn get_active_nodes_lazily_inactivates_stale_and_cascades_replicas() {
        let ms = store();
        let node = NodeId::from("n1");
        ms.register_node(node.clone(), "http://n1").unwrap();
        let file = FileId::new();
        ms.create_file(file, "a.txt", 10, 2).unwrap();
        ms.add_replica(file, node.clone(), "http://n1", ReplicaStatus::Active)
            .unwrap();

        // Force staleness by rewriting the heartbeat into the past.
        {
            let mut state = ms.state.write();
            state.nodes.get_mut(&node).unwrap().last_heartbeat =
                Utc::now() - Duration::seconds(60);
        }

        let active = ms.get_active_nodes(Duration::seconds(30)).unwrap();
        assert!(active.is_empty());

        let replicas = ms.get_replicas(file).unwrap();
        assert_eq!(replicas[0].status, ReplicaStatus::Inactive);
    }

    #[test]
    fn get_active_nodes_sorts_by_available_space_descending() {
        let ms = store();
        ms.register_node(NodeId::from("low"), "http://low").unwrap();
        ms.update_node_heartbeat(&NodeId::from("low"), 10, 0).unwrap();
        ms.register_node(NodeId::from("high"), "http://high").unwrap();
        ms.update_node_heartbeat(&NodeId::from("high"), 1000, 0).unwrap();

        let active = ms.get_active_nodes(Duration::seconds(30)).unwrap();
        assert_eq!(active[0].node_id, NodeId::from("high"));
        assert_eq!(active[1].node_id, NodeId::from("low"));
    }

    #[test]
    fn get_active_nodes_breaks_space_ties_by_insertion_order() {
        let ms = store();
        for id in ["n1", "n2", "n3", "n4", "n5"] {
            ms.register_node(NodeId::from(id), "http://addr").unwrap();
            ms.update_node_heartbeat(&NodeId::from(id), 1000, 0).unwrap();
        }

        let active = ms.get_active_nodes(Duration::seconds(30)).unwrap();
        let ids: Vec<_> = active.iter().map(|n| n.node_id.clone()).collect();
        assert_eq!(
            ids,
            vec![
                NodeId::from("n1"),
                NodeId::from("n2"),
                NodeId::from("n3"),
                NodeId::from("n4"),
                NodeId::from("n5"),
            ]
        );
    }
}
