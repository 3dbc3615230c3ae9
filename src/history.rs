use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::streak::{consecutive_hits, Streak};
use crate::{EvaluationRecord, RuleId};

/// Source of record timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time via [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Retained records of one rule, ascending by `(timestamp, sequence)`.
type Slot = Arc<Mutex<VecDeque<EvaluationRecord>>>;

/// Bounded, per-rule evaluation history.
///
/// Each rule's records sit behind their own mutex, so recording for one rule
/// never waits on another. Sequence numbers come from a counter owned by the
/// store and are strictly increasing across all rules it tracks.
pub struct HistoryStore {
    slots: RwLock<HashMap<RuleId, Slot>>,
    sequence: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl HistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            clock,
        }
    }

    /// Append `result` for `rule`, prune to the `bound` most recent records,
    /// and return the streak ending at the new record.
    ///
    /// Append, prune, and streak computation happen under the rule's lock, so
    /// concurrent callers for the same rule see a consistent sequence.
    pub fn record(&self, rule: RuleId, bound: NonZeroUsize, result: bool) -> Streak {
        let slot = self.slot(rule);
        let mut records = slot.lock();

        // Never stamp earlier than the newest record: a wall clock stepping
        // backwards would otherwise order the new record behind older ones.
        let mut timestamp = self.clock.now();
        if let Some(newest) = records.back() {
            timestamp = timestamp.max(newest.timestamp());
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let record = EvaluationRecord::new(rule, result, timestamp, sequence);

        let at = records.partition_point(|r| r.order_key() <= record.order_key());
        records.insert(at, record);

        let mut evicted = 0_usize;
        while records.len() > bound.get() {
            records.pop_front();
            evicted += 1;
        }
        trace!(rule = %rule, sequence, result, evicted, "recorded evaluation");

        consecutive_hits(records.iter(), result)
    }

    /// Snapshot of the retained records for `rule`, oldest first. Empty if
    /// the rule has never been recorded.
    #[must_use]
    pub fn history(&self, rule: RuleId) -> Vec<EvaluationRecord> {
        let slot = self.slots.read().get(&rule).cloned();
        slot.map(|s| s.lock().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop all history for `rule`. Returns whether anything was retained.
    ///
    /// The records are cleared under the rule's lock and the slot stays in
    /// place, so a concurrent [`record`](Self::record) lands either before
    /// the clear (and is dropped with the rest) or after it (and starts a new
    /// streak).
    pub fn forget(&self, rule: RuleId) -> bool {
        let slot = self.slots.read().get(&rule).cloned();
        slot.is_some_and(|s| {
            let mut records = s.lock();
            let had_any = !records.is_empty();
            records.clear();
            had_any
        })
    }

    /// Drop the history of every rule, each under its own lock.
    pub fn clear(&self) {
        for slot in self.slots.read().values() {
            slot.lock().clear();
        }
    }

    /// Number of rules with retained history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|s| !s.lock().is_empty())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, rule: RuleId) -> Slot {
        if let Some(slot) = self.slots.read().get(&rule) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(rule).or_default())
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryStore")
            .field("rules", &self.len())
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
