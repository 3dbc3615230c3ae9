use chrono::{DateTime, Utc};

use crate::EvaluationRecord;

/// The trailing run of identical outcomes in a rule's history, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Streak {
    outcome: bool,
    records: Vec<EvaluationRecord>,
}

impl Streak {
    /// The outcome every record in the streak shares.
    #[must_use]
    pub fn outcome(&self) -> bool {
        self.outcome
    }

    /// Number of consecutive identical outcomes, the value compared against
    /// each action's threshold.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in the streak in ascending `(timestamp, sequence)` order.
    #[must_use]
    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    /// When the oldest retained record of the streak was taken.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.records.first().map(EvaluationRecord::timestamp)
    }

    #[must_use]
    pub fn latest(&self) -> Option<&EvaluationRecord> {
        self.records.last()
    }
}

/// Collect the newest records of `history` whose result equals `outcome`,
/// stopping at the first that differs, and return them oldest first.
///
/// `history` may be in any order; it is ranked by `(timestamp, sequence)`.
#[must_use]
pub fn consecutive_hits<'a, I>(history: I, outcome: bool) -> Streak
where
    I: IntoIterator<Item = &'a EvaluationRecord>,
{
    let mut newest_first: Vec<&EvaluationRecord> = history.into_iter().collect();
    newest_first.sort_unstable_by(|a, b| b.cmp(a));

    let mut records: Vec<EvaluationRecord> = newest_first
        .into_iter()
        .take_while(|r| r.result() == outcome)
        .cloned()
        .collect();
    records.reverse();

    Streak { outcome, records }
}
