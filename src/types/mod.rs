mod context;
mod error;
mod expr;
mod record;
mod report;
mod rule;
mod value;

pub use context::Context;
pub use error::ConfigError;
pub use expr::{field, CompareOp, Expr, FieldExpr};
pub use record::EvaluationRecord;
pub use report::{ActionOutcome, ActionStatus, RunReport};
pub use rule::{ActionDefinition, Rule, RuleBuilder, RuleId};
pub use value::Value;
