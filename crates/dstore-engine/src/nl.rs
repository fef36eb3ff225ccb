//! Node Registry & Liveness (spec §4.2).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use dstore_metadata::MetadataStore;
use dstore_types::{NodeId, NodeStatus, StoreError};
use log::{debug, info, warn};
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::stats::EngineStats;

/// Registers a node, bumping `nodes_recovered` if this reactivates a
/// previously inactive node.
pub fn register_node(
    metadata: &dyn MetadataStore,
    stats: &EngineStats,
    node_id: NodeId,
    address: &str,
) -> Result<(), StoreError> {
    let reactivated = metadata.register_node(node_id, address)?;
    if reactivated {
        stats.record_node_recovered();
    }
    Ok(())
}

/// Records a heartbeat, bumping `nodes_recovered` on reactivation. Returns
/// whether the node was known.
pub fn heartbeat(
    metadata: &dyn MetadataStore,
    stats: &EngineStats,
    node_id: &NodeId,
    available_space: u64,
    file_count: u64,
) -> Result<bool, StoreError> {
    match metadata.update_node_heartbeat(node_id, available_space, file_count)? {
        Some(reactivated) => {
            if reactivated {
                stats.record_node_recovered();
            }
            Ok(true)
        }
        None => Ok(false),
    }
}

/// One NL tick: inactivate any node stale past `heartbeat_timeout`, cascading
/// to its active replicas. Idempotent — re-running without a new heartbeat
/// is a no-op.
pub fn tick(metadata: &dyn MetadataStore, stats: &EngineStats, config: &EngineConfig) {
    let now = Utc::now();
    let timeout = config.heartbeat_timeout_chrono();

    let nodes = match metadata.get_all_nodes() {
        Ok(nodes) => nodes,
        Err(e) => {
            warn!("NL tick: failed to list nodes: {e}");
            return;
        }
    };

    for node in nodes {
        if node.status != NodeStatus::Active || node.is_fresh(now, timeout) {
            continue;
        }
        if let Err(e) = metadata.mark_node_inactive(&node.node_id) {
            warn!("NL tick: failed to inactivate node {}: {e}", node.node_id);
            continue;
        }
        match metadata.inactivate_active_replicas_for_node(&node.node_id) {
            Ok(flipped) => {
                info!(
                    "node {} went stale, inactivated ({flipped} replicas cascaded)",
                    node.node_id
                );
            }
            Err(e) => warn!(
                "NL tick: failed to cascade replica inactivation for {}: {e}",
                node.node_id
            ),
        }
        stats.record_node_failed();
    }
}

pub fn spawn(
    metadata: Arc<dyn MetadataStore>,
    stats: Arc<EngineStats>,
    config: EngineConfig,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.nl_tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("NL tick");
                    tick(metadata.as_ref(), &stats, &config);
                }
                _ = shutdown.changed() => {
                    info!("NL loop shutting down");
                    break;
                }
            }
        }
    })
}
