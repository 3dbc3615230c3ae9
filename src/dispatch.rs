use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, trace};

use crate::streak::Streak;
use crate::{ActionDefinition, ActionOutcome, ActionStatus, Rule};

/// Error raised by an action resolver or handler.
pub type ActionError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An executable action bound to a context type `T` and expression type `E`.
pub trait Action<T, E>: Send + Sync {
    /// Run the action.
    ///
    /// # Errors
    ///
    /// Any error is reported by the dispatcher and does not stop sibling
    /// actions.
    fn execute(
        &self,
        context: &mut T,
        rule: &Rule<E>,
        definition: &ActionDefinition,
    ) -> Result<(), ActionError>;
}

impl<T, E, F> Action<T, E> for F
where
    F: Fn(&mut T, &Rule<E>, &ActionDefinition) -> Result<(), ActionError> + Send + Sync,
{
    fn execute(
        &self,
        context: &mut T,
        rule: &Rule<E>,
        definition: &ActionDefinition,
    ) -> Result<(), ActionError> {
        self(context, rule, definition)
    }
}

/// Shared handle to a resolved action.
pub type ActionHandler<T, E> = Arc<dyn Action<T, E>>;

/// Maps an [`ActionDefinition`] to the handler that carries it out.
pub trait ActionResolver<T, E> {
    /// # Errors
    ///
    /// Returns an error when no handler can be produced for `definition`.
    fn resolve(&self, definition: &ActionDefinition) -> Result<ActionHandler<T, E>, ActionError>;
}

impl<T, E, F> ActionResolver<T, E> for F
where
    F: Fn(&ActionDefinition) -> Result<ActionHandler<T, E>, ActionError>,
{
    fn resolve(&self, definition: &ActionDefinition) -> Result<ActionHandler<T, E>, ActionError> {
        self(definition)
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no handler registered for action '{name}'")]
    UnknownAction { name: String },
}

/// Resolver that looks handlers up by action name.
///
/// # Example
///
/// ```
/// use rulestreak::{ActionDefinition, ActionRegistry, Context, Expr, Rule};
///
/// let registry = ActionRegistry::<Context, Expr>::new()
///     .register("mute", |ctx: &mut Context, _: &Rule<Expr>, _: &ActionDefinition| {
///         ctx.insert("sensor.muted", true);
///         Ok(())
///     });
/// assert!(registry.contains("mute"));
/// ```
pub struct ActionRegistry<T, E> {
    handlers: HashMap<String, ActionHandler<T, E>>,
}

impl<T, E> ActionRegistry<T, E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler closure under `name`, replacing any previous one.
    #[must_use]
    pub fn register<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut T, &Rule<E>, &ActionDefinition) -> Result<(), ActionError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(name, handler);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, action: impl Action<T, E> + 'static) {
        self.handlers.insert(name.into(), Arc::new(action));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<T, E> Default for ActionRegistry<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> ActionResolver<T, E> for ActionRegistry<T, E> {
    fn resolve(&self, definition: &ActionDefinition) -> Result<ActionHandler<T, E>, ActionError> {
        self.handlers
            .get(definition.name())
            .cloned()
            .ok_or_else(|| {
                ResolveError::UnknownAction {
                    name: definition.name().to_owned(),
                }
                .into()
            })
    }
}

impl<T, E> fmt::Debug for ActionRegistry<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ActionRegistry")
            .field("actions", &names)
            .finish()
    }
}

/// Fire every definition whose threshold the streak meets, in order.
///
/// Resolution errors, handler errors, and handler panics are logged and
/// recorded in the returned outcomes; none of them stop later actions.
pub(crate) fn dispatch<T, E, R>(
    context: &mut T,
    rule: &Rule<E>,
    definitions: &[ActionDefinition],
    streak: &Streak,
    resolver: &R,
) -> Vec<ActionOutcome>
where
    R: ActionResolver<T, E> + ?Sized,
{
    let hits = streak.len();
    definitions
        .iter()
        .map(|definition| {
            let threshold = definition.consecutive_hits();
            let action = definition.name();
            if hits < threshold {
                trace!(action, rule = rule.name(), hits, threshold, "action below threshold");
                return ActionOutcome::new(action, threshold, ActionStatus::Skipped);
            }

            let status = match invoke(context, rule, definition, resolver) {
                Ok(()) => {
                    info!(action, rule = rule.name(), hits, threshold, "action fired");
                    ActionStatus::Fired
                }
                Err(message) => {
                    error!(
                        action,
                        rule = rule.name(),
                        hits,
                        threshold,
                        error = %message,
                        "action failed"
                    );
                    ActionStatus::Failed(message)
                }
            };
            ActionOutcome::new(action, threshold, status)
        })
        .collect()
}

fn invoke<T, E, R>(
    context: &mut T,
    rule: &Rule<E>,
    definition: &ActionDefinition,
    resolver: &R,
) -> Result<(), String>
where
    R: ActionResolver<T, E> + ?Sized,
{
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
        resolver
            .resolve(definition)?
            .execute(context, rule, definition)
    }));
    match attempt {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
