//! Configuration Management
//!
//! Resolves the runtime settings: where the backend lives, how long to wait
//! for it, and where the credential store keeps its record.
//!
//! # Resolution Precedence
//! 1. Explicit values (command-line flags)
//! 2. Environment variables (`ASKDB_BACKEND_URL`, `ASKDB_TIMEOUT_MS`, `ASKDB_STORE_PATH`)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::store::default_store_path;

/// Backend address used when nothing else is configured
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Per-request timeout used when nothing else is configured
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

pub const ENV_BACKEND_URL: &str = "ASKDB_BACKEND_URL";
pub const ENV_TIMEOUT_MS: &str = "ASKDB_TIMEOUT_MS";
pub const ENV_STORE_PATH: &str = "ASKDB_STORE_PATH";

/// Values supplied explicitly, typically from command-line flags
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub store_path: Option<PathBuf>,
}

/// Resolved runtime settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Backend base URL, without a trailing slash
    pub backend_url: String,

    /// Upper bound on every backend call
    pub timeout: Duration,

    /// Location of the stored connection profile
    pub store_path: PathBuf,
}

impl Settings {
    /// Resolve settings from overrides, the process environment and defaults
    pub fn resolve(overrides: Overrides) -> Result<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve settings with an explicit environment lookup
    pub fn resolve_with(
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let backend_url = overrides
            .backend_url
            .or_else(|| env(ENV_BACKEND_URL))
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let backend_url = normalize_url(&backend_url)?;

        let timeout_ms = match overrides.timeout_ms {
            Some(ms) => ms,
            None => match env(ENV_TIMEOUT_MS) {
                Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                    ClientError::config_error(format!(
                        "{ENV_TIMEOUT_MS} must be a number of milliseconds, got '{raw}'"
                    ))
                })?,
                None => DEFAULT_TIMEOUT_MS,
            },
        };
        if timeout_ms == 0 {
            return Err(ClientError::config_error("Timeout must be greater than zero"));
        }

        let store_path = match overrides.store_path.or_else(|| env(ENV_STORE_PATH).map(PathBuf::from)) {
            Some(path) => path,
            None => default_store_path()?,
        };

        Ok(Self { backend_url, timeout: Duration::from_millis(timeout_ms), store_path })
    }
}

fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ClientError::config_error(format!(
            "Backend URL must start with http:// or https://, got '{raw}'"
        )));
    }
    Ok(trimmed.to_string())
}
