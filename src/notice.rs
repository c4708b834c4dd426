//! User-facing notifications
//!
//! Every session and pipeline outcome is reported as a typed [`Notice`].
//! The presentation layer drains them and decides how to show them.

use serde::Serialize;

use crate::error::ClientError;

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One notification for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, text: text.into() }
    }

    /// Notice for a failed operation, prefixed with what was being attempted
    ///
    /// Local precondition failures are warnings and discarded responses are
    /// informational; everything else is an error.
    #[must_use]
    pub fn from_error(context: &str, err: &ClientError) -> Self {
        match err {
            ClientError::Validation(msg) => Self::warning(msg.clone()),
            ClientError::LogicalFailure(msg) => Self::error(format!("{context}: {msg}")),
            ClientError::Superseded(_) => Self::info(err.message()),
            other => Self::error(format!("{context}: {}", other.message())),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level.as_str(), self.text)
    }
}
