use thiserror::Error;

/// Rejected rule configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("rule '{rule}' must retain at least one evaluation (max history is 0)")]
    ZeroHistory { rule: String },

    #[error("action '{action}' in rule '{rule}' has a consecutive-hit threshold of 0")]
    ZeroThreshold { rule: String, action: String },

    #[error("duplicate rule name '{name}'")]
    DuplicateRule { name: String },
}
