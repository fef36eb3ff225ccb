//! Replication Controller (spec §4.4): periodic scan for under-replicated
//! files, repaired by copying bytes from a live replica to a new target.

use std::sync::Arc;

use dstore_metadata::MetadataStore;
use dstore_nodeclient::NodeClient;
use dstore_placement::{self, PlacementError};
use dstore_types::{FileId, NodeId, ReplicaStatus};
use log::{debug, info, warn};
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::queue::{RecoveryQueue, RecoveryStrategy, DISASTER_PRIORITY};
use crate::stats::EngineStats;

const LIST_PAGE_SIZE: u64 = 1000;

pub async fn tick(
    metadata: &dyn MetadataStore,
    nodeclient: &NodeClient,
    stats: &EngineStats,
    queue: &RecoveryQueue,
    config: &EngineConfig,
) {
    let page = match metadata.list_files(LIST_PAGE_SIZE, 0) {
        Ok(page) => page,
        Err(e) => {
            warn!("RC tick: failed to list files: {e}");
            return;
        }
    };

    for entry in page.files {
        let file_id = entry.file.file_id;
        if entry.active_replicas >= config.min_replicas as u64 {
            continue;
        }
        reconcile_file(metadata, nodeclient, stats, queue, config, file_id).await;
    }
}

async fn reconcile_file(
    metadata: &dyn MetadataStore,
    nodeclient: &NodeClient,
    stats: &EngineStats,
    queue: &RecoveryQueue,
    config: &EngineConfig,
    file_id: FileId,
) {
    let fwr = match metadata.get_file(file_id) {
        Ok(fwr) => fwr,
        Err(e) => {
            debug!("RC: file {file_id} disappeared mid-scan: {e}");
            return;
        }
    };

    let active_replicas = fwr.active_replicas() as u64;
    if active_replicas >= config.min_replicas as u64 {
        return;
    }
    let need = config.min_replicas as u64 - active_replicas;

    let excluded: Vec<NodeId> = fwr
        .replicas
        .iter()
        .filter(|r| {
            matches!(
                r.status,
                ReplicaStatus::Active | ReplicaStatus::Pending | ReplicaStatus::Corrupted
            )
        })
        .map(|r| r.node_id.clone())
        .collect();

    let source = fwr
        .replicas
        .iter()
        .find(|r| r.status == ReplicaStatus::Active);

    let Some(source) = source else {
        info!("file {file_id} has zero active replicas, deferring to recovery queue (disaster)");
        queue.enqueue(
            file_id,
            fwr.file.filename.clone(),
            DISASTER_PRIORITY,
            RecoveryStrategy::Disaster,
        );
        return;
    };

    let active_nodes = match metadata.get_active_nodes(config.heartbeat_timeout_chrono()) {
        Ok(nodes) => nodes,
        Err(e) => {
            warn!("RC: failed to list active nodes for {file_id}: {e}");
            return;
        }
    };

    let targets = match dstore_placement::choose_targets(&active_nodes, &excluded, need as u32) {
        Ok(targets) => targets,
        Err(PlacementError::NotEnoughNodes { needed, available }) => {
            debug!(
                "RC: not enough nodes to repair {file_id} (needed {needed}, available {available}), retrying next tick"
            );
            return;
        }
    };

    for target in targets {
        match nodeclient
            .copy(file_id, &source.address, &target.address)
            .await
        {
            Ok(()) => {
                if let Err(e) = metadata.add_replica(
                    file_id,
                    target.node_id.clone(),
                    &target.address,
                    ReplicaStatus::Active,
                ) {
                    warn!("RC: copy succeeded but add_replica failed for {file_id} on {}: {e}", target.node_id);
                    continue;
                }
                stats.record_replication();
                info!("RC repaired {file_id}: new replica on {}", target.node_id);
            }
            Err(e) => {
                warn!("RC: copy of {file_id} to {} failed: {e}", target.node_id);
            }
        }
    }
}

pub fn spawn(
    metadata: Arc<dyn MetadataStore>,
    nodeclient: Arc<NodeClient>,
    stats: Arc<EngineStats>,
    queue: Arc<RecoveryQueue>,
    config: EngineConfig,
    mut shutdown: watch::Receiver<bool>,
    mut force: tokio::sync::mpsc::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.rc_tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("RC tick");
                    tick(metadata.as_ref(), &nodeclient, &stats, &queue, &config).await;
                }
                _ = force.recv() => {
                    info!("RC force_check triggered");
                    tick(metadata.as_ref(), &nodeclient, &stats, &queue, &config).await;
                }
                _ = shutdown.changed() => {
                    info!("RC loop shutting down");
                    break;
                }
            }
        }
    })
}
