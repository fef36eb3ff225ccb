//! Integrity Verifier (spec §4.5): re-checksums active replicas and flips
//! mismatches to `corrupted`.

use std::sync::Arc;

use dstore_metadata::MetadataStore;
use dstore_nodeclient::NodeClient;
use dstore_types::ReplicaStatus;
use log::{debug, info, warn};
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::queue::{RecoveryQueue, RecoveryStrategy, CORRUPTION_PRIORITY};

const LIST_PAGE_SIZE: u64 = 1000;

pub async fn tick(
    metadata: &dyn MetadataStore,
    nodeclient: &NodeClient,
    queue: &RecoveryQueue,
    config: &EngineConfig,
) {
    let page = match metadata.list_files(LIST_PAGE_SIZE, 0) {
        Ok(page) => page,
        Err(e) => {
            warn!("IV tick: failed to list files: {e}");
            return;
        }
    };

    for entry in page.files {
        let Some(checksum) = entry.file.checksum.clone() else {
            continue;
        };
        let file_id = entry.file.file_id;

        let replicas = match metadata.get_replicas(file_id) {
            Ok(replicas) => replicas,
            Err(e) => {
                debug!("IV: file {file_id} disappeared mid-scan: {e}");
                continue;
            }
        };

        for replica in replicas.iter().filter(|r| r.status == ReplicaStatus::Active) {
            match nodeclient.verify(&replica.address, file_id).await {
                Ok(response) if !response.exists => {
                    debug!("IV: node {} reports {file_id} missing, leaving to NL", replica.node_id);
                }
                Ok(response) => {
                    if response.checksum.as_deref() == Some(checksum.as_str()) {
                        let _ = metadata.update_replica_status(
                            file_id,
                            &replica.node_id,
                            ReplicaStatus::Active,
                        );
                    } else {
                        warn!(
                            "IV: checksum mismatch for {file_id} on {}, marking corrupted",
                            replica.node_id
                        );
                        if let Err(e) = metadata.update_replica_status(
                            file_id,
                            &replica.node_id,
                            ReplicaStatus::Corrupted,
                        ) {
                            warn!("IV: failed to mark {file_id} corrupted on {}: {e}", replica.node_id);
                            continue;
                        }
                        queue.enqueue(
                            file_id,
                            entry.file.filename.clone(),
                            CORRUPTION_PRIORITY,
                            RecoveryStrategy::RebuildCorrupted,
                        );
                    }
                }
                Err(e) => {
                    debug!(
                        "IV: transport failure verifying {file_id} on {}: {e}, relying on next tick",
                        replica.node_id
                    );
                }
            }
        }
    }
}

pub fn spawn(
    metadata: Arc<dyn MetadataStore>,
    nodeclient: Arc<NodeClient>,
    queue: Arc<RecoveryQueue>,
    config: EngineConfig,
    mut shutdown: watch::Receiver<bool>,
    mut force: tokio::sync::mpsc::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.iv_tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("IV tick");
                    tick(metadata.as_ref(), &nodeclient, &queue, &config).await;
                }
                _ = force.recv() => {
                    info!("IV force_check triggered");
                    tick(metadata.as_ref(), &nodeclient, &queue, &config).await;
                }
                _ = shutdown.changed() => {
                    info!("IV loop shutting down");
                    break;
                }
            }
        }
    })
}
