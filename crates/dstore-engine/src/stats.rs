//! Shared counters updated by every loop (spec §9 "shared mutable statistics").
//!
//! Each field is an atomic integer rather than a value behind the queue's
//! mutex; a snapshot (`EngineStatsSnapshot`) still reads as internally
//! consistent enough for introspection because no single counter depends on
//! another at read time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct EngineStats {
    pub nodes_failed: AtomicU64,
    pub nodes_recovered: AtomicU64,
    pub replications_performed: AtomicU64,
    pub successful_recoveries: AtomicU64,
    pub critical_files_recovered: AtomicU64,
    pub failed_recoveries: AtomicU64,
    /// Running total of recovery durations in milliseconds, paired with a
    /// count, so `average_recovery_ms` can be derived without storing a
    /// float that would drift under concurrent updates.
    total_recovery_ms: AtomicU64,
    recovery_count: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStatsSnapshot {
    pub nodes_failed: u64,
    pub nodes_recovered: u64,
    pub replications_performed: u64,
    pub successful_recoveries: u64,
    pub critical_files_recovered: u64,
    pub failed_recoveries: u64,
    pub average_recovery_ms: f64,
}

impl EngineStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_node_failed(&self) {
        self.nodes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_node_recovered(&self) {
        self.nodes_recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replication(&self) {
        self.replications_performed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recovery_success(&self, critical: bool, recovery_time: std::time::Duration) {
        self.successful_recoveries.fetch_add(1, Ordering::Relaxed);
        if critical {
            self.critical_files_recovered.fetch_add(1, Ordering::Relaxed);
        }
        self.total_recovery_ms
            .fetch_add(recovery_time.as_millis() as u64, Ordering::Relaxed);
        self.recovery_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recovery_failure(&self) {
        self.failed_recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        let count = self.recovery_count.load(Ordering::Relaxed);
        let total = self.total_recovery_ms.load(Ordering::Relaxed);
        let average_recovery_ms = if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        };
        EngineStatsSnapshot {
            nodes_failed: self.nodes_failed.load(Ordering::Relaxed),
            nodes_recovered: self.nodes_recovered.load(Ordering::Relaxed),
            replications_performed: self.replications_performed.load(Ordering::Relaxed),
            successful_recoveries: self.successful_recoveries.load(Ordering::Relaxed),
            critical_files_recovered: self.critical_files_recovered.load(Ordering::Relaxed),
            failed_recoveries: self.failed_recoveries.load(Ordering::Relaxed),
            average_recovery_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_recovery_time_tracks_running_mean() {
        let stats = EngineStats::new();
        stats.record_recovery_success(false, std::time::Duration::from_millis(100));
        stats.record_recovery_success(true, std::time::Duration::from_millis(300));
        let snap = stats.snapshot();
        assert_eq!(snap.successful_recoveries, 2);
        assert_eq!(snap.critical_files_recovered, 1);
        assert_eq!(snap.average_recovery_ms, 200.0);
    }
}
