//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and saving.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read, write or move a configuration file.
    #[error("Configuration file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error.
    #[error("Failed to serialize YAML configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),

    /// The merged sources could not be extracted into the target type.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
