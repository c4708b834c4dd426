//! JSON Output Envelope Types
//!
//! One-shot commands print exactly one envelope on stdout.
//!
//! # Output Contract
//! - Success: `{"ok": true, "command": "...", "data": {...}, "meta": {...}}`
//! - Error: `{"ok": false, "command": "...", "error": {"code": "...", "message": "..."}}`

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Success envelope for command results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Command that was executed (connect, tables, ask, exec, ...)
    pub command: String,

    /// Command-specific data
    pub data: T,

    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(command: impl Into<String>, data: T, meta: Metadata) -> Self {
        Self { ok: true, command: command.into(), data, meta }
    }
}

/// Error envelope for command failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    pub command: String,

    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    pub fn new(command: impl Into<String>, error: ErrorInfo) -> Self {
        Self { ok: false, command: command.into(), error }
    }

    /// Create error envelope from `ClientError`
    pub fn from_error(command: impl Into<String>, err: &ClientError) -> Self {
        Self::new(command, ErrorInfo { code: err.error_code().to_string(), message: err.message() })
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "NOT_CONNECTED", "TRANSPORT_FAILURE")
    pub code: String,

    /// Human-readable error message (never includes the password)
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Wall-clock time of the command in milliseconds
    pub execution_ms: u64,

    /// Number of rows returned (for `exec`, None for other commands)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<usize>,
}

impl Metadata {
    #[must_use]
    pub const fn new(execution_ms: u64) -> Self {
        Self { execution_ms, rows_returned: None }
    }

    #[must_use]
    pub const fn with_rows(execution_ms: u64, rows_returned: usize) -> Self {
        Self { execution_ms, rows_returned: Some(rows_returned) }
    }
}
