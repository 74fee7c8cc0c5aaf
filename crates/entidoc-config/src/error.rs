//! Configuration error types

use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading the configuration source failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration text could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value outside its allowed range
    #[error("Invalid value for {field}: {value}")]
    InvalidValue {
        /// Name of the offending field
        field: String,
        /// Description of the rejected value
        value: String,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
