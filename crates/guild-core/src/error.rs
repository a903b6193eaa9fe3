//! Unified error types for the guild workspace.
//!
//! Transport errors describe the wire, API errors describe a single REST call,
//! adapter errors describe account bootstrap and event handling.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur in transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Message send failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for REST API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The API call timed out.
    #[error("API call timed out")]
    Timeout,

    /// The platform answered with a non-success status.
    #[error("API error (HTTP {status}, code {code}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Platform error code (0 when the body carried none).
        code: i64,
        /// Platform error message.
        message: String,
    },

    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A local file referenced by a segment could not be read.
    #[error("failed to read {path}: {reason}")]
    File {
        /// The referenced path.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

// =============================================================================
// Adapter Errors
// =============================================================================

/// Errors that can occur in adapter operations.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// Event parsing failed.
    #[error("failed to parse event: {reason}")]
    ParseError {
        /// Reason for failure.
        reason: String,
    },

    /// An account token could not be parsed.
    #[error("invalid account token: {0}")]
    InvalidToken(String),

    /// Internal adapter error.
    #[error("adapter error: {0}")]
    Internal(String),

    /// API error raised while bootstrapping.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AdapterError {
    /// Creates an internal adapter error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Creates a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError { reason: msg.into() }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
