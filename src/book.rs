use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::{ConfigError, Expr, Rule, RulestreakError};

/// A validated collection of rules loaded from the text DSL.
///
/// # Example
///
/// ```
/// use rulestreak::RuleBook;
///
/// let book = RuleBook::from_dsl(r#"
/// rule overheating (history 5):
///     sensor.temp > 80 AND NOT sensor.muted
///     on true:
///         page_oncall after 3 with channel = "ops"
///     on false:
///         all_clear after 2
/// "#).unwrap();
///
/// let rule = book.get("overheating").unwrap();
/// assert_eq!(rule.max_history().get(), 5);
/// assert_eq!(rule.true_actions()[0].consecutive_hits(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: Vec<Rule<Expr>>,
}

impl RuleBook {
    /// Collect already-built rules, rejecting duplicate names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateRule`] if two rules share a name.
    pub fn new(rules: Vec<Rule<Expr>>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.name()) {
                return Err(ConfigError::DuplicateRule {
                    name: rule.name().to_owned(),
                });
            }
        }
        Ok(Self { rules })
    }

    /// Parse and validate a DSL string.
    ///
    /// # Errors
    ///
    /// Returns [`RulestreakError`] on parse or validation failure.
    pub fn from_dsl(input: &str) -> Result<Self, RulestreakError> {
        let parsed = crate::parse::parse(input)?;
        let rules = parsed
            .rules
            .into_iter()
            .map(crate::parse::ParsedRule::build)
            .collect::<Result<Vec<_>, _>>()?;
        let book = Self::new(rules)?;
        debug!(rules = book.len(), "loaded rule book");
        Ok(book)
    }

    /// Read a DSL file and build a `RuleBook` from it.
    ///
    /// # Errors
    ///
    /// Returns [`RulestreakError`] on I/O, parse, or validation failure.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RulestreakError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_dsl(&input)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rule<Expr>> {
        self.rules.iter().find(|r| r.name() == name)
    }

    /// Rules in definition order.
    #[must_use]
    pub fn rules(&self) -> &[Rule<Expr>] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule<Expr>> {
        self.rules.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleBook {
    type Item = &'a Rule<Expr>;
    type IntoIter = std::slice::Iter<'a, Rule<Expr>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl fmt::Display for RuleBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: usize = self
            .rules
            .iter()
            .map(|r| r.true_actions().len() + r.false_actions().len())
            .sum();
        write!(f, "RuleBook({} rules, {} actions)", self.rules.len(), actions)
    }
}
