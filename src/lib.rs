//! Streak-triggered rule evaluation.
//!
//! A [`RuleProcessor`] evaluates a [`Rule`] against a context, keeps a bounded
//! history of the outcomes, and fires the rule's actions once the same
//! outcome has been seen `consecutive_hits` times in a row.

mod book;
mod dispatch;
mod engine;
mod error;
mod evaluate;
pub mod history;
pub mod parse;
pub mod streak;
mod types;

pub use book::RuleBook;
pub use dispatch::{
    Action, ActionError, ActionHandler, ActionRegistry, ActionResolver, ResolveError,
};
pub use engine::RuleProcessor;
pub use error::RulestreakError;
pub use evaluate::{EvalError, Evaluator, ExprEvaluator, Precomputed};
pub use history::{Clock, HistoryStore, SystemClock};
pub use streak::Streak;
pub use types::{
    field, ActionDefinition, ActionOutcome, ActionStatus, CompareOp, ConfigError, Context,
    EvaluationRecord, Expr, FieldExpr, Rule, RuleBuilder, RuleId, RunReport, Value,
};
