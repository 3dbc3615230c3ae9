use crate::{ActionDefinition, ConfigError, Expr, Rule};

/// One rule as written in the DSL, before validation.
#[derive(Debug, Clone)]
pub struct ParsedRule {
    pub name: String,
    pub max_history: Option<usize>,
    pub expression: Expr,
    pub true_actions: Vec<ActionDefinition>,
    pub false_actions: Vec<ActionDefinition>,
}

impl ParsedRule {
    /// Validate the definition and assign the rule its identity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] under the same conditions as
    /// [`RuleBuilder::build()`](crate::RuleBuilder::build).
    pub fn build(self) -> Result<Rule<Expr>, ConfigError> {
        let mut builder = Rule::builder(self.name, self.expression);
        for action in self.true_actions {
            builder = builder.on_true(action);
        }
        for action in self.false_actions {
            builder = builder.on_false(action);
        }
        if let Some(n) = self.max_history {
            builder = builder.max_history(n);
        }
        builder.build()
    }
}

/// The result of parsing a DSL input string.
#[derive(Debug, Clone)]
pub struct ParsedRules {
    pub rules: Vec<ParsedRule>,
}
