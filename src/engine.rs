use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::dispatch::{dispatch, ActionResolver};
use crate::history::{Clock, HistoryStore};
use crate::{EvaluationRecord, Evaluator, Rule, RunReport};

/// Evaluates rules, keeps their bounded history, and fires actions once a
/// rule has produced the same outcome enough times in a row.
///
/// A processor can be shared between threads (`&RuleProcessor` is `Sync`
/// whenever the evaluator and resolver are). Runs of the same rule are
/// serialized on that rule's history lock only while the result is recorded;
/// actions run after the lock is released.
///
/// # Example
///
/// ```
/// use rulestreak::{
///     ActionDefinition, ActionRegistry, Context, Expr, ExprEvaluator, Rule, RuleProcessor, field,
/// };
///
/// let registry = ActionRegistry::<Context, Expr>::new().register("cool_down", |ctx, _, _| {
///     ctx.insert("fan", true);
///     Ok(())
/// });
/// let processor = RuleProcessor::new(ExprEvaluator::default(), registry);
///
/// let rule = Rule::builder("overheating", field("temp").gt(80_i64))
///     .on_true(ActionDefinition::new("cool_down", 2))
///     .build()
///     .unwrap();
///
/// let mut ctx = Context::new().set("temp", 90_i64);
/// processor.run(&mut ctx, &rule).unwrap();
/// assert!(!ctx.contains("fan"));
/// processor.run(&mut ctx, &rule).unwrap();
/// assert!(ctx.contains("fan"));
/// ```
pub struct RuleProcessor<T, E, V, R> {
    evaluator: V,
    resolver: R,
    history: HistoryStore,
    _marker: PhantomData<fn(&mut T, &E)>,
}

impl<T, E, V, R> RuleProcessor<T, E, V, R>
where
    V: Evaluator<T, E>,
    R: ActionResolver<T, E>,
{
    /// Create a processor using the system clock.
    pub fn new(evaluator: V, resolver: R) -> Self {
        Self::with_history(evaluator, resolver, HistoryStore::new())
    }

    /// Create a processor whose records are stamped by `clock`.
    pub fn with_clock(evaluator: V, resolver: R, clock: Arc<dyn Clock>) -> Self {
        Self::with_history(evaluator, resolver, HistoryStore::with_clock(clock))
    }

    fn with_history(evaluator: V, resolver: R, history: HistoryStore) -> Self {
        Self {
            evaluator,
            resolver,
            history,
            _marker: PhantomData,
        }
    }

    /// Evaluate `rule`, record the outcome, and fire the actions of the
    /// matching branch whose thresholds the current streak meets.
    ///
    /// # Errors
    ///
    /// Returns the evaluator's error unchanged. Nothing is recorded and no
    /// action runs in that case. Action failures are never returned; they are
    /// logged and the remaining actions still run.
    pub fn run(&self, context: &mut T, rule: &Rule<E>) -> Result<(), V::Error> {
        self.run_detailed(context, rule).map(|_| ())
    }

    /// Like [`run`](Self::run), but reports the streak and what happened to
    /// each action of the selected branch.
    ///
    /// # Errors
    ///
    /// Returns the evaluator's error unchanged.
    pub fn run_detailed(&self, context: &mut T, rule: &Rule<E>) -> Result<RunReport, V::Error> {
        let start = Instant::now();
        let outcome = self.evaluator.evaluate(context, rule.expression())?;

        let streak = self.history.record(rule.id(), rule.max_history(), outcome);
        debug!(
            rule = rule.name(),
            outcome,
            streak = streak.len(),
            "rule evaluated"
        );

        let actions = dispatch(
            context,
            rule,
            rule.actions_for(outcome),
            &streak,
            &self.resolver,
        );
        Ok(RunReport::new(rule.name(), streak, actions, start.elapsed()))
    }

    /// Run several rules against one context, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first evaluation failure and returns it; rules before it
    /// have already been recorded and dispatched.
    pub fn run_all<'r, I>(&self, context: &mut T, rules: I) -> Result<Vec<RunReport>, V::Error>
    where
        I: IntoIterator<Item = &'r Rule<E>>,
        E: 'r,
    {
        rules
            .into_iter()
            .map(|rule| self.run_detailed(context, rule))
            .collect()
    }

    /// Retained results for `rule`, oldest first.
    #[must_use]
    pub fn history(&self, rule: &Rule<E>) -> Vec<EvaluationRecord> {
        self.history.history(rule.id())
    }

    /// Drop the retained results for `rule`, restarting its streak.
    pub fn forget(&self, rule: &Rule<E>) -> bool {
        self.history.forget(rule.id())
    }

    /// Drop all retained results.
    pub fn clear(&self) {
        self.history.clear();
    }

    #[must_use]
    pub fn evaluator(&self) -> &V {
        &self.evaluator
    }

    #[must_use]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }
}

impl<T, E, V: fmt::Debug, R: fmt::Debug> fmt::Debug for RuleProcessor<T, E, V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleProcessor")
            .field("evaluator", &self.evaluator)
            .field("resolver", &self.resolver)
            .field("history", &self.history)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::{ActionDefinition, ActionRegistry, ActionStatus, Precomputed};

    type Log = Vec<String>;

    fn registry() -> ActionRegistry<Log, bool> {
        ActionRegistry::new()
            .register("t", |log: &mut Log, _, _| {
                log.push("t".into());
                Ok(())
            })
            .register("f", |log: &mut Log, _, _| {
                log.push("f".into());
                Ok(())
            })
    }

    fn rule(outcome: bool) -> Rule<bool> {
        Rule::builder("r", outcome)
            .on_true(ActionDefinition::new("t", 1))
            .on_false(ActionDefinition::new("f", 1))
            .build()
            .unwrap()
    }

    #[test]
    fn only_matching_branch_runs() {
        let processor = RuleProcessor::new(Precomputed, registry());
        let mut log = Log::new();

        let report = processor.run_detailed(&mut log, &rule(true)).unwrap();
        assert_eq!(log, vec!["t"]);
        assert_eq!(report.actions().len(), 1);
        assert!(report.outcome());

        let report = processor.run_detailed(&mut log, &rule(false)).unwrap();
        assert_eq!(log, vec!["t", "f"]);
        assert_eq!(report.fired(), vec!["f"]);
    }

    #[test]
    fn evaluation_error_propagates_without_recording() {
        let failing = |_: &Log, _: &bool| -> Result<bool, &'static str> { Err("sensor offline") };
        let processor = RuleProcessor::new(failing, registry());
        let rule = rule(true);
        let mut log = Log::new();

        assert_eq!(processor.run(&mut log, &rule), Err("sensor offline"));
        assert!(processor.history(&rule).is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn forget_restarts_streak() {
        let processor = RuleProcessor::new(Precomputed, registry());
        let rule = Rule::builder("r", true)
            .on_true(ActionDefinition::new("t", 2))
            .build()
            .unwrap();
        let mut log = Log::new();

        processor.run(&mut log, &rule).unwrap();
        assert!(processor.forget(&rule));
        let report = processor.run_detailed(&mut log, &rule).unwrap();
        assert_eq!(report.streak().len(), 1);
        assert_eq!(report.actions()[0].status(), &ActionStatus::Skipped);
        assert!(log.is_empty());
    }

    #[test]
    fn run_all_in_order() {
        let processor = RuleProcessor::new(Precomputed, registry());
        let rules = [rule(false), rule(true), rule(false)];
        let mut log = Log::new();

        let reports = processor.run_all(&mut log, &rules).unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(log, vec!["f", "t", "f"]);
    }

    #[test]
    fn run_all_stops_at_first_failure() {
        let eval = |_: &Log, fail: &bool| -> Result<bool, String> {
            if *fail {
                Err("bad".into())
            } else {
                Ok(true)
            }
        };
        let processor = RuleProcessor::new(eval, registry());
        let rules = [rule(false), rule(true), rule(false)];
        let mut log = Log::new();

        let err = processor.run_all(&mut log, &rules).unwrap_err();
        assert_eq!(err, "bad");
        assert_eq!(log, vec!["t"]);
        assert_eq!(processor.history(&rules[0]).len(), 1);
        assert!(processor.history(&rules[2]).is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let processor = RuleProcessor::new(Precomputed, registry());
        let a = rule(true);
        let mut log = Log::new();
        processor.run(&mut log, &a).unwrap();
        processor.clear();
        assert!(processor.history(&a).is_empty());
    }

    #[test]
    fn infallible_evaluator_type() {
        let processor: RuleProcessor<Log, bool, Precomputed, _> =
            RuleProcessor::new(Precomputed, registry());
        let result: Result<(), Infallible> = processor.run(&mut Log::new(), &rule(true));
        assert!(result.is_ok());
    }
}
