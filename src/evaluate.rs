use std::convert::Infallible;

use thiserror::Error;

use crate::{CompareOp, Context, Expr, Value};

/// Decides whether a rule's expression holds for a context.
pub trait Evaluator<T, E> {
    type Error;

    /// # Errors
    ///
    /// Evaluation failures are returned unchanged from
    /// [`RuleProcessor::run`](crate::RuleProcessor::run).
    fn evaluate(&self, context: &T, expression: &E) -> Result<bool, Self::Error>;
}

impl<T, E, F, Err> Evaluator<T, E> for F
where
    F: Fn(&T, &E) -> Result<bool, Err>,
{
    type Error = Err;

    fn evaluate(&self, context: &T, expression: &E) -> Result<bool, Err> {
        self(context, expression)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("field '{field}' is not set")]
    MissingField { field: String },

    #[error("cannot evaluate '{field} {op} {expected}': field holds {actual}")]
    Incomparable {
        field: String,
        op: CompareOp,
        expected: Value,
        actual: Value,
    },

    #[error("field '{field}' holds {actual}, expected a bool")]
    NotABool { field: String, actual: Value },
}

/// Evaluates [`Expr`] trees against a [`Context`].
///
/// In lenient mode (the default) a missing field or a comparison between
/// incompatible values is simply `false`. In strict mode both are errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprEvaluator {
    strict: bool,
}

impl ExprEvaluator {
    #[must_use]
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    #[must_use]
    pub fn strict() -> Self {
        Self { strict: true }
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    fn eval(&self, ctx: &Context, expr: &Expr) -> Result<bool, EvalError> {
        match expr {
            Expr::Const(b) => Ok(*b),
            Expr::Compare { field, op, value } => {
                let Some(actual) = ctx.get(field) else {
                    return self.miss(|| EvalError::MissingField {
                        field: field.clone(),
                    });
                };
                match actual.compare(*op, value) {
                    Some(b) => Ok(b),
                    None => self.miss(|| EvalError::Incomparable {
                        field: field.clone(),
                        op: *op,
                        expected: value.clone(),
                        actual: actual.clone(),
                    }),
                }
            }
            Expr::Truthy(field) => match ctx.get(field) {
                Some(Value::Bool(b)) => Ok(*b),
                Some(other) => self.miss(|| EvalError::NotABool {
                    field: field.clone(),
                    actual: other.clone(),
                }),
                None => self.miss(|| EvalError::MissingField {
                    field: field.clone(),
                }),
            },
            Expr::And(a, b) => Ok(self.eval(ctx, a)? && self.eval(ctx, b)?),
            Expr::Or(a, b) => Ok(self.eval(ctx, a)? || self.eval(ctx, b)?),
            Expr::Not(inner) => Ok(!self.eval(ctx, inner)?),
        }
    }

    fn miss(&self, err: impl FnOnce() -> EvalError) -> Result<bool, EvalError> {
        if self.strict {
            Err(err())
        } else {
            Ok(false)
        }
    }
}

impl Evaluator<Context, Expr> for ExprEvaluator {
    type Error = EvalError;

    fn evaluate(&self, context: &Context, expression: &Expr) -> Result<bool, EvalError> {
        self.eval(context, expression)
    }
}

/// Evaluator for rules whose "expression" is already the outcome.
///
/// Handy when the caller computes the predicate itself and only wants the
/// streak bookkeeping and action dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Precomputed;

impl<T> Evaluator<T, bool> for Precomputed {
    type Error = Infallible;

    fn evaluate(&self, _context: &T, expression: &bool) -> Result<bool, Infallible> {
        Ok(*expression)
    }
}
