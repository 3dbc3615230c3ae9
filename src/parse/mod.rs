mod error;
mod grammar;
mod parser;

use std::str::FromStr;

pub use error::ParseError;
pub use parser::{ParsedRule, ParsedRules};

use crate::Expr;

/// Parse DSL input into rule definitions.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not valid DSL syntax.
pub fn parse(input: &str) -> Result<ParsedRules, ParseError> {
    use winnow::Parser;
    grammar::parse_rules
        .parse(input)
        .map(|rules| ParsedRules { rules })
        .map_err(|e| ParseError::new(e.to_string()))
}

/// Parse a single condition expression, e.g. `temp > 80 AND NOT muted`.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a complete expression.
pub fn parse_expr(input: &str) -> Result<Expr, ParseError> {
    use winnow::Parser;
    winnow::combinator::terminated(grammar::expr, grammar::ws)
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()))
}

impl FromStr for Expr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_expr(s)
    }
}
