//! Backend Service Traits and Core Types
//!
//! This module defines the seams between the session and the HTTP backend.
//! The backend owns the database connection and the question-to-SQL
//! translation; the client only ever talks to it through these traits.
//!
//! # Outcome vs Error
//! A backend that answers `success: false` has *reported* a result, so
//! `connect` returns `Ok(ConnectOutcome { success: false, .. })` for a refused
//! login. `Err` is reserved for transport faults and for calls whose contract
//! has no failure outcome (`list_tables`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{ClientError, Result};

pub mod http;

pub use http::HttpBackend;

/// One result record: column name to value, in the order the backend sent them
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Default host offered for a new profile
pub const DEFAULT_HOST: &str = "localhost";

/// Default port offered for a new profile (`MySQL`)
pub const DEFAULT_PORT: u16 = 3306;

/// Database connection parameters forwarded to the backend
///
/// Field names are part of both the `/connect` body and the stored record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// WARNING: Sensitive data, do not log or include in error messages
    pub password: String,
    pub database: String,
}

impl ConnectionProfile {
    /// Create a profile from its parts
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }

    /// `user@host:port/database`, safe to show and log
    #[must_use]
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT, "", "", "")
    }
}

impl std::fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Result of a `/connect` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub success: bool,
    /// Refusal reason when `success` is false
    pub message: Option<String>,
}

impl ConnectOutcome {
    #[must_use]
    pub const fn accepted() -> Self {
        Self { success: true, message: None }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self { success: false, message: Some(message.into()) }
    }
}

/// Result of a `/generate-sql` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOutcome {
    pub success: bool,
    pub sql: Option<String>,
    pub message: Option<String>,
}

impl GenerateOutcome {
    pub fn generated(sql: impl Into<String>) -> Self {
        Self { success: true, sql: Some(sql.into()), message: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, sql: None, message: Some(message.into()) }
    }
}

/// Result of an `/execute` call
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteOutcome {
    pub success: bool,
    pub results: Vec<Row>,
    /// Table the rows came from, when the backend could tell
    pub table: Option<String>,
    pub message: Option<String>,
}

impl ExecuteOutcome {
    #[must_use]
    pub fn rows(results: Vec<Row>, table: Option<String>) -> Self {
        Self { success: true, results, table, message: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, results: Vec::new(), table: None, message: Some(message.into()) }
    }
}

/// Establishes and inspects the backend's database connection
#[async_trait]
pub trait ConnectionService: Send + Sync {
    /// Ask the backend to connect with `profile`
    ///
    /// Wrong credentials or an unreachable database come back as
    /// `success: false`; only transport faults are `Err`.
    async fn connect(&self, profile: &ConnectionProfile) -> Result<ConnectOutcome>;

    /// Names of the tables in the connected database, in backend order
    async fn list_tables(&self) -> Result<Vec<String>>;
}

/// Translates questions into SQL and runs SQL
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn generate_sql(&self, question: &str) -> Result<GenerateOutcome>;

    async fn execute_sql(&self, sql: &str) -> Result<ExecuteOutcome>;
}

/// Everything the session needs from a backend
pub trait Backend: ConnectionService + QueryService {}

impl<T: ConnectionService + QueryService> Backend for T {}

/// Await a backend call, turning an elapsed deadline into a transport failure
pub async fn with_timeout<T>(
    limit: Duration,
    operation: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::transport(format!(
            "{operation} timed out after {} ms",
            limit.as_millis()
        ))),
    }
}
