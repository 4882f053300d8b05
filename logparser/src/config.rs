//! Parser configuration.
//!
//! The only tunable today is the nesting limit shared by the document parser
//! and the shape computer.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Default nesting limit, the same depth the server enforces on BSON documents.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Upper bound accepted for `max_depth`.
pub const MAX_DEPTH_LIMIT: usize = 1000;

/// Environment variable read by [`ParserConfig::from_env`].
pub const MAX_DEPTH_VAR: &str = "MONGOLOG_MAX_DEPTH";

/// Errors that can occur while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable is set but does not hold a valid value.
    #[error("Invalid value '{value}' for {name}")]
    InvalidEnv {
        /// Name of the environment variable.
        name: &'static str,
        /// The value found.
        value: String,
    },

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Configuration shared by the document parser, the line parser and the
/// shape computer.
///
/// # Example
///
/// ```
/// use logparser::ParserConfig;
///
/// let config = ParserConfig::default().with_max_depth(20);
/// assert_eq!(config.max_depth, 20);
/// assert!(config.validate_config().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ParserConfig {
    /// Maximum nesting of objects, arrays and constructor calls.
    #[serde(default = "default_max_depth")]
    #[validate(range(min = 1, max = 1000, message = "max_depth must be between 1 and 1000"))]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParserConfig {
    /// Sets the nesting limit.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Creates a configuration from environment variables.
    ///
    /// - `MONGOLOG_MAX_DEPTH`: nesting limit (default: 100)
    ///
    /// # Errors
    ///
    /// Returns an error if `MONGOLOG_MAX_DEPTH` is set but is not a number,
    /// or if the resulting configuration does not validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let max_depth = match lookup(MAX_DEPTH_VAR) {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidEnv {
                    name: MAX_DEPTH_VAR,
                    value,
                })?,
            None => DEFAULT_MAX_DEPTH,
        };

        let config = Self { max_depth };
        config.validate_config()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_depth` is zero or above 1000.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()?;
        Ok(())
    }
}
