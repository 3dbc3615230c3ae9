use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};

use super::rule::RuleId;

/// One recorded evaluation outcome of a rule.
///
/// Records are totally ordered by `(timestamp, sequence)`. The sequence
/// number breaks ties between records stamped within the same clock tick.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvaluationRecord {
    rule: RuleId,
    result: bool,
    timestamp: DateTime<Utc>,
    sequence: u64,
}

impl EvaluationRecord {
    pub(crate) fn new(rule: RuleId, result: bool, timestamp: DateTime<Utc>, sequence: u64) -> Self {
        Self {
            rule,
            result,
            timestamp,
            sequence,
        }
    }

    #[must_use]
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    #[must_use]
    pub fn result(&self) -> bool {
        self.result
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.timestamp, self.sequence)
    }
}

impl Ord for EvaluationRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl PartialOrd for EvaluationRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EvaluationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}",
            self.sequence,
            self.timestamp.format("%H:%M:%S%.6f"),
            self.result
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::Rule;

    fn id() -> RuleId {
        Rule::builder("r", ()).build().unwrap().id()
    }

    #[test]
    fn orders_by_timestamp_first() {
        let rule = id();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap();
        let early = EvaluationRecord::new(rule, true, t0, 9);
        let late = EvaluationRecord::new(rule, true, t1, 1);
        assert!(early < late);
    }

    #[test]
    fn sequence_breaks_timestamp_ties() {
        let rule = id();
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let first = EvaluationRecord::new(rule, false, t, 4);
        let second = EvaluationRecord::new(rule, true, t, 5);
        assert!(first < second);
        let mut records = vec![second.clone(), first.clone()];
        records.sort();
        assert_eq!(records, vec![first, second]);
    }

    #[test]
    fn display_format() {
        let t = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let record = EvaluationRecord::new(id(), true, t, 12);
        assert_eq!(record.to_string(), "[12] [05:06:07.000000] true");
    }
}
