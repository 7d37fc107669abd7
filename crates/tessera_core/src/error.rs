//! Configuration error types.

use thiserror::Error;

/// Errors raised while building or validating a [`crate::WorldConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// TOML syntax or type mismatch.
    #[error("failed to parse world config: {0}")]
    Parse(String),

    /// A field holds an unusable value.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The layer list is empty.
    #[error("pipeline has no layers configured")]
    EmptyPipeline,

    /// A listed layer has no `[layers.<name>]` table.
    #[error("missing configuration for layer `{0}`")]
    MissingLayerConfig(String),
}

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;
