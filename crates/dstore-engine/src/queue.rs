//! Recovery Queue (spec §4.6): a priority, deduplicated work queue of files
//! needing repair, with a bounded in-memory history ring.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dstore_types::FileId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const DISASTER_PRIORITY: i32 = 20;
pub const FORCED_PRIORITY: i32 = 100;
pub const CORRUPTION_PRIORITY: i32 = 15;
pub const UNDER_REPLICATED_PRIORITY: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Disaster,
    Widen,
    RebuildCorrupted,
    /// Placeholder recorded at enqueue time for an operator-forced entry;
    /// the attempt logic always re-derives the real strategy from current
    /// replica state (spec §4.6 step 6) and overwrites this before it is
    /// ever reported in history.
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub file_id: FileId,
    pub filename: String,
    pub strategy: RecoveryStrategy,
    pub priority: i32,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub status: RecordStatus,
    pub error_message: Option<String>,
    /// Monotonic insertion counter; the tiebreak for equal-priority ordering.
    sequence: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub file_id: FileId,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub recovery_time_ms: u64,
    pub attempts: u32,
    pub priority: i32,
    pub strategy: RecoveryStrategy,
    pub error: Option<String>,
}

/// Outcome of one attempt at a claimed record, reported back to the queue
/// so it can finalize bookkeeping under a single lock acquisition.
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Duration),
    /// Strategy failed but attempts remain; leave it for the retry delay.
    Retry,
    /// Either attempts were exhausted, or the file vanished mid-attempt.
    Exhausted,
}

struct QueueState {
    records: Vec<RecoveryRecord>,
    in_flight: HashSet<FileId>,
    history: VecDeque<HistoryEntry>,
    next_sequence: u64,
}

/// Mutex-guarded priority queue plus history ring. This is the only mutable
/// in-memory structure shared across the engine's loops; its mutex also
/// covers the `pending_recoveries` count implicitly (queue length).
pub struct RecoveryQueue {
    state: Mutex<QueueState>,
    max_attempts: u32,
    history_cap: usize,
    retry_delay: chrono::Duration,
}

impl RecoveryQueue {
    pub fn new(max_attempts: u32, history_cap: usize, retry_delay: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                records: Vec::new(),
                in_flight: HashSet::new(),
                history: VecDeque::with_capacity(history_cap),
                next_sequence: 0,
            }),
            max_attempts,
            history_cap,
            retry_delay: chrono::Duration::from_std(retry_delay)
                .unwrap_or_else(|_| chrono::Duration::seconds(300)),
        }
    }

    /// Enqueues `file_id` unless it is already queued or currently being
    /// worked. Returns whether a record was inserted.
    pub fn enqueue(
        &self,
        file_id: FileId,
        filename: String,
        priority: i32,
        strategy: RecoveryStrategy,
    ) -> bool {
        let mut state = self.state.lock();
        if state.in_flight.contains(&file_id) || state.records.iter().any(|r| r.file_id == file_id) {
            return false;
        }
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.records.push(RecoveryRecord {
            file_id,
            filename,
            strategy,
            priority,
            attempts: 0,
            max_attempts: self.max_attempts,
            last_attempt: None,
            status: RecordStatus::Pending,
            error_message: None,
            sequence,
        });
        true
    }

    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.records.len() + state.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<RecoveryRecord> {
        let state = self.state.lock();
        let mut records = state.records.clone();
        records.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.sequence.cmp(&b.sequence)));
        records
    }

    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        let state = self.state.lock();
        state.history.iter().rev().take(limit).cloned().collect()
    }

    /// Claims up to `limit` eligible records with `priority >= min_priority`,
    /// highest priority first, ties by insertion order. Records already
    /// past their retry delay or past `max_attempts` are finalized
    /// immediately under the same lock and never returned for execution.
    pub fn claim_batch(
        &self,
        limit: usize,
        min_priority: i32,
        stats: &crate::stats::EngineStats,
    ) -> Vec<RecoveryRecord> {
        let now = Utc::now();
        let mut state = self.state.lock();

        let mut eligible: Vec<usize> = state
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.priority >= min_priority
                    && r.last_attempt
                        .map(|last| now.signed_duration_since(last) >= self.retry_delay)
                        .unwrap_or(true)
            })
            .map(|(i, _)| i)
            .collect();
        eligible.sort_by(|&a, &b| {
            state.records[b]
                .priority
                .cmp(&state.records[a].priority)
                .then(state.records[a].sequence.cmp(&state.records[b].sequence))
        });
        eligible.truncate(limit);
        eligible.sort_unstable_by(|a, b| b.cmp(a)); // descending so removal is stable

        let mut claimed = Vec::with_capacity(eligible.len());
        for idx in eligible {
            let mut record = state.records.remove(idx);
            if record.attempts >= self.max_attempts {
                record.status = RecordStatus::Failed;
                record.error_message = Some("Max attempts exceeded".to_string());
                Self::push_history(&mut state.history, self.history_cap, &record, false, Duration::ZERO);
                stats.record_recovery_failure();
                continue;
            }
            state.in_flight.insert(record.file_id);
            claimed.push(record);
        }
        claimed
    }

    /// Finalizes a claimed record once its attempt has run.
    pub fn finish(&self, record: RecoveryRecord, outcome: AttemptOutcome, stats: &crate::stats::EngineStats) {
        let mut state = self.state.lock();
        state.in_flight.remove(&record.file_id);
        match outcome {
            AttemptOutcome::Success(recovery_time) => {
                let critical = record.priority >= CORRUPTION_PRIORITY;
                Self::push_history(&mut state.history, self.history_cap, &record, true, recovery_time);
                drop(state);
                stats.record_recovery_success(critical, recovery_time);
            }
            AttemptOutcome::Retry => {
                state.records.push(record);
            }
            AttemptOutcome::Exhausted => {
                Self::push_history(&mut state.history, self.history_cap, &record, false, Duration::ZERO);
                drop(state);
                stats.record_recovery_failure();
            }
        }
    }

    fn push_history(
        history: &mut VecDeque<HistoryEntry>,
        cap: usize,
        record: &RecoveryRecord,
        success: bool,
        recovery_time: Duration,
    ) {
        if history.len() >= cap {
            history.pop_front();
        }
        history.push_back(HistoryEntry {
            file_id: record.file_id,
            filename: record.filename.clone(),
            timestamp: Utc::now(),
            success,
            recovery_time_ms: recovery_time.as_millis() as u64,
            attempts: record.attempts,
            priority: record.priority,
            strategy: record.strategy,
            error: record.error_message.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::EngineStats;

    #[test]
    fn enqueue_is_deduplicated() {
        let queue = RecoveryQueue::new(3, 100, Duration::from_secs(300));
        let id = FileId::new();
        assert!(queue.enqueue(id, "a.txt".into(), UNDER_REPLICATED_PRIORITY, RecoveryStrategy::Widen));
        assert!(!queue.enqueue(id, "a.txt".into(), DISASTER_PRIORITY, RecoveryStrategy::Disaster));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn claim_orders_by_priority_then_insertion() {
        let queue = RecoveryQueue::new(3, 100, Duration::from_secs(300));
        let stats = EngineStats::new();
        let low = FileId::new();
        let high = FileId::new();
        queue.enqueue(low, "low.txt".into(), UNDER_REPLICATED_PRIORITY, RecoveryStrategy::Widen);
        queue.enqueue(high, "high.txt".into(), DISASTER_PRIORITY, RecoveryStrategy::Disaster);

        let claimed = queue.claim_batch(10, i32::MIN, &stats);
        assert_eq!(claimed[0].file_id, high);
        assert_eq!(claimed[1].file_id, low);
    }

    #[test]
    fn claim_skips_records_within_retry_delay() {
        let queue = RecoveryQueue::new(3, 100, Duration::from_secs(300));
        let stats = EngineStats::new();
        let id = FileId::new();
        queue.enqueue(id, "a.txt".into(), UNDER_REPLICATED_PRIORITY, RecoveryStrategy::Widen);
        let mut claimed = queue.claim_batch(10, i32::MIN, &stats);
        assert_eq!(claimed.len(), 1);
        let mut record = claimed.pop().unwrap();
        record.last_attempt = Some(Utc::now());
        queue.finish(record, AttemptOutcome::Retry, &stats);

        let claimed_again = queue.claim_batch(10, i32::MIN, &stats);
        assert!(claimed_again.is_empty());
    }

    #[test]
    fn claim_finalizes_exhausted_records_as_failed() {
        let queue = RecoveryQueue::new(1, 100, Duration::from_secs(300));
        let stats = EngineStats::new();
        let id = FileId::new();
        queue.enqueue(id, "a.txt".into(), UNDER_REPLICATED_PRIORITY, RecoveryStrategy::Widen);
        let mut claimed = queue.claim_batch(10, i32::MIN, &stats);
        let mut record = claimed.pop().unwrap();
        record.attempts = 1; // == max_attempts
        queue.finish(record, AttemptOutcome::Retry, &stats);

        let claimed_again = queue.claim_batch(10, i32::MIN, &stats);
        assert!(claimed_again.is_empty());
        assert!(queue.is_empty());
        assert_eq!(queue.history(10).len(), 1);
        assert_eq!(stats.snapshot().failed_recoveries, 1);
    }
}
