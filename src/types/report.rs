use std::fmt;
use std::time::Duration;

use crate::streak::Streak;

/// What happened to one action definition during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    /// The streak was shorter than the action's threshold.
    Skipped,
    /// The handler was resolved and completed.
    Fired,
    /// The threshold was met but resolving or running the handler failed.
    Failed(String),
}

/// Per-action entry of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    name: String,
    threshold: usize,
    status: ActionStatus,
}

impl ActionOutcome {
    pub(crate) fn new(name: impl Into<String>, threshold: usize, status: ActionStatus) -> Self {
        Self {
            name: name.into(),
            threshold,
            status,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    #[must_use]
    pub fn status(&self) -> &ActionStatus {
        &self.status
    }

    /// True if the threshold was met, whether or not the handler succeeded.
    #[must_use]
    pub fn triggered(&self) -> bool {
        !matches!(self.status, ActionStatus::Skipped)
    }
}

/// Detailed result of
/// [`RuleProcessor::run_detailed()`](crate::RuleProcessor::run_detailed).
#[derive(Debug, Clone)]
#[must_use]
pub struct RunReport {
    rule: String,
    streak: Streak,
    actions: Vec<ActionOutcome>,
    duration: Duration,
}

impl RunReport {
    pub(crate) fn new(
        rule: impl Into<String>,
        streak: Streak,
        actions: Vec<ActionOutcome>,
        duration: Duration,
    ) -> Self {
        Self {
            rule: rule.into(),
            streak,
            actions,
            duration,
        }
    }

    #[must_use]
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// The evaluation outcome recorded by this run.
    #[must_use]
    pub fn outcome(&self) -> bool {
        self.streak.outcome()
    }

    /// The streak observed right after recording.
    #[must_use]
    pub fn streak(&self) -> &Streak {
        &self.streak
    }

    /// Every action of the selected branch, in definition order.
    #[must_use]
    pub fn actions(&self) -> &[ActionOutcome] {
        &self.actions
    }

    /// Names of the actions whose handlers ran to completion.
    #[must_use]
    pub fn fired(&self) -> Vec<&str> {
        self.names_with(|s| matches!(s, ActionStatus::Fired))
    }

    /// Names of the actions that met their threshold but failed.
    #[must_use]
    pub fn failed(&self) -> Vec<&str> {
        self.names_with(|s| matches!(s, ActionStatus::Failed(_)))
    }

    /// Wall-clock duration of the run, including handler execution.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn names_with(&self, pred: impl Fn(&ActionStatus) -> bool) -> Vec<&str> {
        self.actions
            .iter()
            .filter(|a| pred(&a.status))
            .map(|a| a.name.as_str())
            .collect()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule: {} = {} (streak {})",
            self.rule,
            self.outcome(),
            self.streak.len()
        )?;
        write!(f, ", fired: [{}]", self.fired().join(", "))?;
        let failed = self.failed();
        if !failed.is_empty() {
            write!(f, ", failed: [{}]", failed.join(", "))?;
        }
        write!(f, ", duration: {:?}", self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streak::consecutive_hits;

    fn report(actions: Vec<ActionOutcome>) -> RunReport {
        RunReport::new(
            "overheating",
            consecutive_hits(std::iter::empty(), true),
            actions,
            Duration::from_nanos(250),
        )
    }

    #[test]
    fn partitions_actions_by_status() {
        let r = report(vec![
            ActionOutcome::new("page", 3, ActionStatus::Skipped),
            ActionOutcome::new("log", 1, ActionStatus::Fired),
            ActionOutcome::new("webhook", 1, ActionStatus::Failed("timeout".into())),
        ]);
        assert_eq!(r.fired(), vec!["log"]);
        assert_eq!(r.failed(), vec!["webhook"]);
        assert!(!r.actions()[0].triggered());
        assert!(r.actions()[2].triggered());
        assert_eq!(r.actions()[0].threshold(), 3);
    }

    #[test]
    fn display_lists_fired_and_failed() {
        let r = report(vec![
            ActionOutcome::new("log", 1, ActionStatus::Fired),
            ActionOutcome::new("webhook", 1, ActionStatus::Failed("boom".into())),
        ]);
        let s = r.to_string();
        assert!(s.starts_with("rule: overheating = true (streak 0)"));
        assert!(s.contains("fired: [log]"));
        assert!(s.contains("failed: [webhook]"));
    }

    #[test]
    fn display_omits_empty_failures() {
        let s = report(vec![]).to_string();
        assert!(s.contains("fired: []"));
        assert!(!s.contains("failed"));
    }
}
