use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;

use tracing::warn;
use uuid::Uuid;

use super::error::ConfigError;
use super::Value;

/// Opaque identity of a [`Rule`], assigned when the rule is built.
///
/// History is keyed by this id rather than by rule contents: clones of a rule
/// share one history, while two rules built from identical definitions do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleId(Uuid);

impl RuleId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

/// Static configuration of an action: its name, firing threshold, and
/// free-form parameters for the handler.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionDefinition {
    name: String,
    consecutive_hits: usize,
    params: BTreeMap<String, Value>,
}

impl ActionDefinition {
    /// An action that fires once the rule has produced the same outcome
    /// `consecutive_hits` times in a row.
    #[must_use]
    pub fn new(name: impl Into<String>, consecutive_hits: usize) -> Self {
        Self {
            name: name.into(),
            consecutive_hits,
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn consecutive_hits(&self) -> usize {
        self.consecutive_hits
    }

    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }
}

/// A predicate plus the actions to run when it has held (or failed) enough
/// times in a row.
///
/// The expression type `E` is opaque here; it is handed to whichever
/// [`Evaluator`](crate::Evaluator) the [`RuleProcessor`](crate::RuleProcessor)
/// was built with.
#[derive(Debug, Clone)]
pub struct Rule<E> {
    id: RuleId,
    name: String,
    expression: E,
    true_actions: Vec<ActionDefinition>,
    false_actions: Vec<ActionDefinition>,
    max_history: NonZeroUsize,
}

impl<E> Rule<E> {
    /// Start building a rule.
    ///
    /// # Example
    ///
    /// ```
    /// use rulestreak::{ActionDefinition, Rule, field};
    ///
    /// let rule = Rule::builder("overheating", field("sensor.temp").gt(80_i64))
    ///     .on_true(ActionDefinition::new("page_oncall", 3))
    ///     .on_false(ActionDefinition::new("all_clear", 2))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(rule.max_history().get(), 3);
    /// ```
    #[must_use]
    pub fn builder(name: impl Into<String>, expression: E) -> RuleBuilder<E> {
        RuleBuilder {
            name: name.into(),
            expression,
            true_actions: Vec::new(),
            false_actions: Vec::new(),
            max_history: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> RuleId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn expression(&self) -> &E {
        &self.expression
    }

    #[must_use]
    pub fn true_actions(&self) -> &[ActionDefinition] {
        &self.true_actions
    }

    #[must_use]
    pub fn false_actions(&self) -> &[ActionDefinition] {
        &self.false_actions
    }

    /// The action list for the given outcome.
    #[must_use]
    pub fn actions_for(&self, outcome: bool) -> &[ActionDefinition] {
        if outcome {
            &self.true_actions
        } else {
            &self.false_actions
        }
    }

    /// Number of past results retained for this rule; also the longest streak
    /// the engine can observe.
    #[must_use]
    pub fn max_history(&self) -> NonZeroUsize {
        self.max_history
    }
}

/// Builder returned by [`Rule::builder`].
#[derive(Debug)]
#[must_use]
pub struct RuleBuilder<E> {
    name: String,
    expression: E,
    true_actions: Vec<ActionDefinition>,
    false_actions: Vec<ActionDefinition>,
    max_history: Option<usize>,
}

impl<E> RuleBuilder<E> {
    pub fn on_true(mut self, action: ActionDefinition) -> Self {
        self.true_actions.push(action);
        self
    }

    pub fn on_false(mut self, action: ActionDefinition) -> Self {
        self.false_actions.push(action);
        self
    }

    /// Retain exactly `n` results. Without this, the bound is the largest
    /// threshold among the rule's actions.
    pub fn max_history(mut self, n: usize) -> Self {
        self.max_history = Some(n);
        self
    }

    /// Validate and assign the rule its identity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero history bound or a zero threshold.
    /// A threshold above an explicit history bound is accepted with a
    /// warning; the streak is capped at the bound, so that action never fires.
    pub fn build(self) -> Result<Rule<E>, ConfigError> {
        let actions = || self.true_actions.iter().chain(&self.false_actions);

        for action in actions() {
            if action.consecutive_hits == 0 {
                return Err(ConfigError::ZeroThreshold {
                    rule: self.name.clone(),
                    action: action.name.clone(),
                });
            }
        }

        let max_history = match self.max_history {
            Some(n) => {
                let bound = NonZeroUsize::new(n).ok_or_else(|| ConfigError::ZeroHistory {
                    rule: self.name.clone(),
                })?;
                for action in actions().filter(|a| a.consecutive_hits > n) {
                    warn!(
                        rule = %self.name,
                        action = %action.name,
                        hits = action.consecutive_hits,
                        max_history = n,
                        "action threshold exceeds retained history and will never fire"
                    );
                }
                bound
            }
            None => actions()
                .map(|a| a.consecutive_hits)
                .max()
                .and_then(NonZeroUsize::new)
                .unwrap_or(NonZeroUsize::MIN),
        };

        Ok(Rule {
            id: RuleId::generate(),
            name: self.name,
            expression: self.expression,
            true_actions: self.true_actions,
            false_actions: self.false_actions,
            max_history,
        })
    }
}
