//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Loading or saving configuration failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Adapter error.
    #[error("Adapter error: {0}")]
    Adapter(#[from] guild_core::AdapterError),

    /// The shutdown signal handler could not be installed.
    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
