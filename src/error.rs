//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout askdb.
//! All errors are structured and map to specific error codes for JSON output.
//!
//! # Error Categories
//! - `Validation`: Local precondition failures (no network call was made)
//! - `LogicalFailure`: The backend answered `success: false` with a message
//! - `TransportFailure`: No response, malformed response, or timeout
//! - `NotConnected`: The operation requires a connected session
//! - `ConfigError`: Credential store or settings errors
//! - `Superseded`: A response arrived for a request that is no longer current

use thiserror::Error;

/// Main error type for askdb operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Local precondition failed before any request was sent
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Backend responded with `success: false`
    #[error("{0}")]
    LogicalFailure(String),

    /// No response or a response that could not be understood
    #[error("Backend unreachable: {0}")]
    TransportFailure(String),

    /// Operation requires an active session
    #[error("Not connected to a database")]
    NotConnected,

    /// Configuration error (store file unreadable, invalid settings, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Response belonged to a request that was replaced or cancelled
    #[error("Request superseded: {0}")]
    Superseded(String),
}

impl ClientError {
    /// Convert error to error code string for JSON output
    ///
    /// Error codes are stable and suitable for programmatic handling.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::LogicalFailure(_) => "LOGICAL_FAILURE",
            Self::TransportFailure(_) => "TRANSPORT_FAILURE",
            Self::NotConnected => "NOT_CONNECTED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::Superseded(_) => "SUPERSEDED",
        }
    }

    /// Get human-readable error message
    ///
    /// Never contains the profile password.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a logical failure from a backend message
    pub fn logical(message: impl Into<String>) -> Self {
        Self::LogicalFailure(message.into())
    }

    /// Create a transport failure
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure(message.into())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a superseded error for the named operation
    pub fn superseded(operation: impl Into<String>) -> Self {
        Self::Superseded(operation.into())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TransportFailure("request timed out".to_string())
        } else if err.is_decode() {
            Self::TransportFailure(format!("malformed response: {err}"))
        } else {
            Self::TransportFailure(err.to_string())
        }
    }
}

/// Result type alias for askdb operations
pub type Result<T> = std::result::Result<T, ClientError>;
