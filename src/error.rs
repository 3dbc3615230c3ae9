use thiserror::Error;

use crate::parse::ParseError;
use crate::ConfigError;

/// Unified error type covering DSL parsing, rule validation, and I/O.
///
/// Returned by [`RuleBook::from_dsl()`](crate::RuleBook::from_dsl) and
/// [`RuleBook::from_file()`](crate::RuleBook::from_file).
#[derive(Debug, Error)]
pub enum RulestreakError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
