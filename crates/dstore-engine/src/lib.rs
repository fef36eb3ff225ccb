//! The availability engine (spec §2, §4, §5): the six background loops that
//! keep every file at ≥ R_min active replicas — node-liveness (NL),
//! replication control (RC), integrity verification (IV), and the three
//! recovery-queue loops (main, priority, proactive) — plus the shared state
//! they read and write through: an `Arc<dyn MetadataStore>`, an
//! `Arc<NodeClient>`, the recovery queue, and the stats counters.

pub mod config;
pub mod error;
pub mod iv;
pub mod nl;
pub mod queue;
pub mod rc;
pub mod recovery;
pub mod stats;

use std::sync::Arc;

use dstore_metadata::MetadataStore;
use dstore_nodeclient::NodeClient;
use dstore_types::FileId;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;

pub use config::EngineConfig;
pub use error::EngineError;
pub use queue::{AttemptOutcome, HistoryEntry, RecoveryQueue, RecoveryRecord, RecoveryStrategy};
pub use stats::{EngineStats, EngineStatsSnapshot};

use queue::{CORRUPTION_PRIORITY, DISASTER_PRIORITY, FORCED_PRIORITY, UNDER_REPLICATED_PRIORITY};

/// Owns every loop and the state they share. Construct with `new`, start
/// the loops with `spawn`, and trigger the force-check/force-recovery hooks
/// of the coordinator API (spec §6) through the methods below.
pub struct Engine {
    metadata: Arc<dyn MetadataStore>,
    nodeclient: Arc<NodeClient>,
    queue: Arc<RecoveryQueue>,
    stats: Arc<EngineStats>,
    config: EngineConfig,
    shutdown_tx: watch::Sender<bool>,
    rc_force_tx: mpsc::Sender<()>,
    rc_force_rx: Mutex<Option<mpsc::Receiver<()>>>,
    iv_force_tx: mpsc::Sender<()>,
    iv_force_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl Engine {
    pub fn new(metadata: Arc<dyn MetadataStore>, nodeclient: Arc<NodeClient>, config: EngineConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (rc_force_tx, rc_force_rx) = mpsc::channel(1);
        let (iv_force_tx, iv_force_rx) = mpsc::channel(1);
        Self {
            metadata,
            nodeclient,
            queue: Arc::new(RecoveryQueue::new(
                config.max_attempts,
                config.history_cap,
                config.retry_delay,
            )),
            stats: EngineStats::new(),
            config,
            shutdown_tx,
            rc_force_tx,
            rc_force_rx: Mutex::new(Some(rc_force_rx)),
            iv_force_tx,
            iv_force_rx: Mutex::new(Some(iv_force_rx)),
        }
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub fn queue(&self) -> &Arc<RecoveryQueue> {
        &self.queue
    }

    pub fn stats(&self) -> &Arc<EngineStats> {
        &self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts all six background loops. Returns their join handles so the
    /// caller can await a clean shutdown. Panics if called more than once
    /// on the same `Engine` (the force-check channels are single-consumer).
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        let rc_force_rx = self
            .rc_force_rx
            .lock()
            .take()
            .expect("Engine::spawn called more than once");
        let iv_force_rx = self
            .iv_force_rx
            .lock()
            .take()
            .expect("Engine::spawn called more than once");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));

        let mut handles = Vec::with_capacity(6);
        handles.push(nl::spawn(
            self.metadata.clone(),
            self.stats.clone(),
            self.config,
            self.shutdown_tx.subscribe(),
        ));
        handles.push(rc::spawn(
            self.metadata.clone(),
            self.nodeclient.clone(),
            self.stats.clone(),
            self.queue.clone(),
            self.config,
            self.shutdown_tx.subscribe(),
            rc_force_rx,
        ));
        handles.push(iv::spawn(
            self.metadata.clone(),
            self.nodeclient.clone(),
            self.queue.clone(),
            self.config,
            self.shutdown_tx.subscribe(),
            iv_force_rx,
        ));
        handles.push(spawn_rq_main(
            self.metadata.clone(),
            self.nodeclient.clone(),
            self.queue.clone(),
            self.stats.clone(),
            semaphore.clone(),
            self.config,
            self.shutdown_tx.subscribe(),
        ));
        handles.push(spawn_rq_priority(
            self.metadata.clone(),
            self.nodeclient.clone(),
            self.queue.clone(),
            self.stats.clone(),
            semaphore.clone(),
            self.config,
            self.shutdown_tx.subscribe(),
        ));
        handles.push(spawn_rq_proactive(
            self.metadata.clone(),
            self.queue.clone(),
            self.config,
            self.shutdown_tx.subscribe(),
        ));
        handles
    }

    /// `POST /api/replication/force` (spec §6): run an RC tick immediately.
    pub async fn force_replication_check(&self) {
        let _ = self.rc_force_tx.send(()).await;
    }

    /// `POST /api/replication/verify` (spec §6): run an IV tick immediately.
    pub async fn force_verification(&self) {
        let _ = self.iv_force_tx.send(()).await;
    }

    /// `POST /api/recovery/force/{file_id}` (spec §6): enqueue at the
    /// Forced priority band (100), ahead of everything else.
    pub fn force_recovery(&self, file_id: FileId, filename: String) -> bool {
        self.queue
            .enqueue(file_id, filename, FORCED_PRIORITY, RecoveryStrategy::Forced)
    }

    /// Signals every loop to exit at its next tick boundary (spec §5).
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn run_claimed_batch(
    claimed: Vec<RecoveryRecord>,
    metadata: &Arc<dyn MetadataStore>,
    nodeclient: &Arc<NodeClient>,
    queue: &Arc<RecoveryQueue>,
    stats: &Arc<EngineStats>,
    semaphore: &Arc<Semaphore>,
    config: &EngineConfig,
) {
    let mut tasks = Vec::with_capacity(claimed.len());
    for mut record in claimed {
        let metadata = metadata.clone();
        let nodeclient = nodeclient.clone();
        let queue = queue.clone();
        let stats = stats.clone();
        let semaphore = semaphore.clone();
        let config = *config;
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await;
            let outcome = recovery::run_attempt(&mut record, metadata.as_ref(), &nodeclient, &config).await;
            match &outcome {
                AttemptOutcome::Success(_) => {
                    info!("recovery for {} ({:?}) succeeded", record.file_id, record.strategy)
                }
                AttemptOutcome::Retry => {
                    debug!("recovery for {} ({:?}) failed this attempt, retrying later", record.file_id, record.strategy)
                }
                AttemptOutcome::Exhausted => {
                    warn!("recovery for {} abandoned: file vanished mid-attempt", record.file_id)
                }
            }
            queue.finish(record, outcome, &stats);
        }));
    }
    for task in tasks {
        let _ = task.await;
    }
}

/// Main worker (spec §4.6, period `rq_main_tick`): takes the first
/// `min(max_concurrent, queue size)` records regardless of priority.
fn spawn_rq_main(
    metadata: Arc<dyn MetadataStore>,
    nodeclient: Arc<NodeClient>,
    queue: Arc<RecoveryQueue>,
    stats: Arc<EngineStats>,
    semaphore: Arc<Semaphore>,
    config: EngineConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.rq_main_tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("RQ main tick");
                    let claimed = queue.claim_batch(config.max_concurrent, i32::MIN, &stats);
                    run_claimed_batch(claimed, &metadata, &nodeclient, &queue, &stats, &semaphore, &config).await;
                }
                _ = shutdown.changed() => {
                    info!("RQ main loop shutting down");
                    break;
                }
            }
        }
    })
}

/// Priority worker (spec §4.6, period `rq_priority_tick`): takes records
/// with `priority >= CORRUPTION_PRIORITY` (15).
fn spawn_rq_priority(
    metadata: Arc<dyn MetadataStore>,
    nodeclient: Arc<NodeClient>,
    queue: Arc<RecoveryQueue>,
    stats: Arc<EngineStats>,
    semaphore: Arc<Semaphore>,
    config: EngineConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.rq_priority_tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("RQ priority tick");
                    let claimed = queue.claim_batch(config.max_concurrent, CORRUPTION_PRIORITY, &stats);
                    run_claimed_batch(claimed, &metadata, &nodeclient, &queue, &stats, &semaphore, &config).await;
                }
                _ = shutdown.changed() => {
                    info!("RQ priority loop shutting down");
                    break;
                }
            }
        }
    })
}

const PROACTIVE_PAGE_SIZE: u64 = 1000;

/// Proactive scanner (spec §4.6, period `rq_proactive_tick`): reads MS
/// directly and enqueues under-replicated, disastrous, and corrupted files.
/// Does not itself run any strategy — the main/priority loops drain what it
/// enqueues.
fn spawn_rq_proactive(
    metadata: Arc<dyn MetadataStore>,
    queue: Arc<RecoveryQueue>,
    config: EngineConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.rq_proactive_tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("RQ proactive tick");
                    proactive_scan(metadata.as_ref(), &queue, &config);
                }
                _ = shutdown.changed() => {
                    info!("RQ proactive loop shutting down");
                    break;
                }
            }
        }
    })
}

fn proactive_scan(metadata: &dyn MetadataStore, queue: &RecoveryQueue, config: &EngineConfig) {
    let page = match metadata.list_files(PROACTIVE_PAGE_SIZE, 0) {
        Ok(page) => page,
        Err(e) => {
            warn!("RQ proactive scan: failed to list files: {e}");
            return;
        }
    };

    for entry in page.files {
        let file_id = entry.file.file_id;
        let filename = entry.file.filename.clone();

        if entry.active_replicas == 0 {
            queue.enqueue(file_id, filename.clone(), DISASTER_PRIORITY, RecoveryStrategy::Disaster);
        } else if entry.active_replicas < config.min_replicas as u64 {
            queue.enqueue(file_id, filename.clone(), UNDER_REPLICATED_PRIORITY, RecoveryStrategy::Widen);
        }

        match metadata.get_replicas(file_id) {
            Ok(replicas) => {
                if replicas.iter().any(|r| r.status == dstore_types::ReplicaStatus::Corrupted) {
                    queue.enqueue(file_id, filename, CORRUPTION_PRIORITY, RecoveryStrategy::RebuildCorrupted);
                }
            }
            Err(e) => debug!("RQ proactive scan: failed to load replicas for {file_id}: {e}"),
        }
    }
}
