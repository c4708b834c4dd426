//! Session State Machine
//!
//! The session is the only owner of connection state. Every change goes
//! through one of its methods, each of which leaves the machine in a stable
//! state (`Disconnected` or `Connected`) once its request resolves.
//!
//! # States
//! - `Disconnected`: initial state, and the state after any failure or an
//!   explicit disconnect
//! - `Connecting`: a connect request is in flight
//! - `Connected`: the backend accepted the current profile
//!
//! # Startup
//! [`Session::startup`] silently reconnects with the stored profile, at most
//! once per session lifetime. Calling it again only reports the status.
//!
//! # Superseding
//! A connect request holds a [`ConnectTicket`]. A newer connect or a
//! disconnect makes older tickets stale, and a stale response is discarded
//! without touching the state or the credential store.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::notice::Notice;
use crate::pipeline::{
    validate_query_text, ExecuteTicket, GenerateTicket, QueryPipeline, ResultSet,
};
use crate::service::{
    with_timeout, Backend, ConnectOutcome, ConnectionProfile, ExecuteOutcome, GenerateOutcome,
};
use crate::store::CredentialStore;

pub mod examples;

pub use examples::{question_pool, sample_questions, EXAMPLE_COUNT};

/// Connection status as reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Disconnected,
    Connected,
}

impl SessionStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Internal machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    /// A connect in flight is not yet a connection
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        match self {
            Self::Connected => SessionStatus::Connected,
            Self::Disconnected | Self::Connecting => SessionStatus::Disconnected,
        }
    }
}

/// Proof that a connect was started; hand it back with the response
#[derive(Debug)]
#[must_use = "a started connect must be finished or the session stays connecting"]
pub struct ConnectTicket {
    epoch: u64,
    profile: ConnectionProfile,
    automatic: bool,
}

impl ConnectTicket {
    #[must_use]
    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }
}

/// Connection lifecycle plus the query pipeline that lives inside it
pub struct Session {
    backend: Arc<dyn Backend>,
    store: Arc<dyn CredentialStore>,
    timeout: Duration,
    state: SessionState,
    profile: Option<ConnectionProfile>,
    examples: Vec<String>,
    pipeline: QueryPipeline,
    notices: Vec<Notice>,
    startup_attempted: bool,
    connect_epoch: u64,
    pending_connect: Option<u64>,
}

impl Session {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            timeout,
            state: SessionState::Disconnected,
            profile: None,
            examples: Vec::new(),
            pipeline: QueryPipeline::new(),
            notices: Vec::new(),
            startup_attempted: false,
            connect_epoch: 0,
            pending_connect: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.state.status()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Profile of the current (or most recent pending) connection
    #[must_use]
    pub fn profile(&self) -> Option<&ConnectionProfile> {
        self.profile.as_ref()
    }

    /// Example questions for the connected database; empty when disconnected
    #[must_use]
    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    #[must_use]
    pub fn pipeline(&self) -> &QueryPipeline {
        &self.pipeline
    }

    /// Take every notice produced since the last drain
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn require_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    /// Reconnect with the stored profile, once per session lifetime
    ///
    /// Failures are reported as notices, never returned: a failed
    /// reconnect leaves the session disconnected and ready for a manual
    /// connect.
    pub async fn startup(&mut self) -> SessionStatus {
        if self.startup_attempted {
            debug!("startup already ran; skipping auto-reconnect");
            return self.status();
        }
        self.startup_attempted = true;

        let saved = match self.store.load() {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                debug!("no saved profile");
                return self.status();
            }
            Err(e) => {
                warn!(error = %e, "could not read saved profile");
                self.notices.push(Notice::from_error("Could not read saved profile", &e));
                return self.status();
            }
        };

        info!(target_db = %saved.display_target(), "auto-reconnecting with saved profile");
        let ticket = match self.start_connect(saved, true) {
            Ok(ticket) => ticket,
            Err(e) => {
                self.notices.push(Notice::from_error("Auto reconnect failed", &e));
                return self.status();
            }
        };
        let response = self.request_connect(&ticket).await;
        let _ = self.finish_connect(ticket, response).await;
        self.status()
    }

    /// Start a connect with `profile`
    ///
    /// Rejected while connected; a connect already in flight is superseded.
    pub fn begin_connect(&mut self, profile: ConnectionProfile) -> Result<ConnectTicket> {
        self.start_connect(profile, false)
    }

    fn start_connect(&mut self, profile: ConnectionProfile, automatic: bool) -> Result<ConnectTicket> {
        if self.is_connected() {
            return Err(ClientError::validation("Already connected; disconnect first"));
        }
        validate_profile(&profile)?;

        self.connect_epoch += 1;
        self.pending_connect = Some(self.connect_epoch);
        self.state = SessionState::Connecting;
        self.profile = Some(profile.clone());

        debug!(epoch = self.connect_epoch, automatic, "connect started");
        Ok(ConnectTicket { epoch: self.connect_epoch, profile, automatic })
    }

    async fn request_connect(&self, ticket: &ConnectTicket) -> Result<ConnectOutcome> {
        with_timeout(self.timeout, "connect", self.backend.connect(&ticket.profile)).await
    }

    /// Apply the backend's answer to a connect started with `begin_connect`
    ///
    /// On success the profile is saved and example questions are fetched;
    /// failing to fetch examples does not undo the connection.
    pub async fn finish_connect(
        &mut self,
        ticket: ConnectTicket,
        response: Result<ConnectOutcome>,
    ) -> Result<SessionStatus> {
        if self.pending_connect != Some(ticket.epoch) {
            debug!(epoch = ticket.epoch, "discarding stale connect response");
            return Err(ClientError::superseded("connect"));
        }
        self.pending_connect = None;

        let failure_context =
            if ticket.automatic { "Auto reconnect failed" } else { "DB Connection failed" };

        let outcome = match response {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "connect request failed");
                self.state = SessionState::Disconnected;
                self.notices.push(Notice::from_error(failure_context, &e));
                return Err(e);
            }
        };

        if !outcome.success {
            let err = ClientError::logical(
                outcome.message.unwrap_or_else(|| "Connection refused".to_string()),
            );
            info!(reason = %err, "backend refused connection");
            self.state = SessionState::Disconnected;
            let context = if ticket.automatic { failure_context } else { "Failed to connect" };
            self.notices.push(Notice::from_error(context, &err));
            return Err(err);
        }

        self.state = SessionState::Connected;
        info!(target_db = %ticket.profile.display_target(), "connected");

        if ticket.automatic {
            self.notices.push(Notice::success("Auto reconnected to DB!"));
        } else {
            if let Err(e) = self.store.save(&ticket.profile) {
                warn!(error = %e, "could not save profile");
                self.notices.push(Notice::from_error("Could not save profile", &e));
            }
            self.notices.push(Notice::success("Database connected successfully!"));
        }
        self.profile = Some(ticket.profile);

        let refreshed = self.refresh_examples().await.map(|_| ());
        if let Err(e) = refreshed {
            warn!(error = %e, "could not fetch example questions");
            self.notices.push(Notice::warning(format!("No example questions: {}", e.message())));
        }

        Ok(SessionStatus::Connected)
    }

    /// Connect with `profile` and wait for the answer
    pub async fn connect(&mut self, profile: ConnectionProfile) -> Result<SessionStatus> {
        let ticket = match self.begin_connect(profile) {
            Ok(ticket) => ticket,
            Err(e) => {
                self.notices.push(Notice::from_error("DB Connection failed", &e));
                return Err(e);
            }
        };
        let response = self.request_connect(&ticket).await;
        self.finish_connect(ticket, response).await
    }

    /// Drop the connection and forget everything tied to it
    ///
    /// The state is `Disconnected` afterwards even if the stored profile
    /// could not be removed; that failure is returned.
    pub fn disconnect(&mut self) -> Result<()> {
        self.state = SessionState::Disconnected;
        self.connect_epoch += 1;
        self.pending_connect = None;
        self.profile = None;
        self.examples.clear();
        self.pipeline.reset();
        info!("disconnected");

        match self.store.clear() {
            Ok(()) => {
                self.notices.push(Notice::info("Disconnected & config cleared."));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "could not clear saved profile");
                self.notices.push(Notice::from_error("Disconnected, but saved profile remains", &e));
                Err(e)
            }
        }
    }

    /// Table names of the connected database
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        self.require_connected()?;
        with_timeout(self.timeout, "list tables", self.backend.list_tables()).await
    }

    /// Fetch tables and draw a fresh set of example questions
    pub async fn refresh_examples(&mut self) -> Result<&[String]> {
        let tables = self.list_tables().await?;
        let pool = question_pool(&tables);
        self.examples = sample_questions(pool, &mut rand::thread_rng());
        debug!(tables = tables.len(), shown = self.examples.len(), "example questions refreshed");
        Ok(&self.examples)
    }

    /// Make example `index` (0-based) the current question
    pub fn use_example(&mut self, index: usize) -> Result<&str> {
        self.require_connected()?;
        let question = self
            .examples
            .get(index)
            .cloned()
            .ok_or_else(|| ClientError::validation(format!("No example question #{}", index + 1)))?;
        self.pipeline.set_question(question);
        Ok(self.pipeline.question())
    }

    pub fn set_question(&mut self, question: impl Into<String>) -> Result<()> {
        self.require_connected()?;
        self.pipeline.set_question(question);
        Ok(())
    }

    /// Start generating SQL for `question`; hand the ticket to `finish_generate`
    ///
    /// The current results are cleared even when this fails.
    pub fn begin_generate(&mut self, question: &str) -> Result<GenerateTicket> {
        let started = self
            .require_connected()
            .and_then(|()| self.pipeline.begin_generate(question));
        if let Err(e) = &started {
            self.notices.push(Notice::from_error("SQL Generation failed", e));
        }
        started
    }

    /// Apply the backend's answer to a generation started with `begin_generate`
    pub fn finish_generate(
        &mut self,
        ticket: GenerateTicket,
        response: Result<GenerateOutcome>,
    ) -> Result<String> {
        match self.pipeline.finish_generate(ticket, response) {
            Ok(sql) => {
                self.notices.push(Notice::success("SQL Generated Successfully!"));
                Ok(sql)
            }
            Err(e) => {
                self.notices.push(Notice::from_error("SQL Generation failed", &e));
                Err(e)
            }
        }
    }

    /// Generate SQL for `question`
    pub async fn generate_query(&mut self, question: &str) -> Result<String> {
        let ticket = self.begin_generate(question)?;
        let response =
            with_timeout(self.timeout, "generate", self.backend.generate_sql(ticket.question()))
                .await;
        self.finish_generate(ticket, response)
    }

    /// Start executing `sql`; hand the ticket to `finish_execute`
    ///
    /// Empty text is rejected before anything else, without a request.
    pub fn begin_execute(&mut self, sql: &str) -> Result<ExecuteTicket> {
        let started = validate_query_text(sql)
            .and_then(|_| self.require_connected())
            .and_then(|()| self.pipeline.begin_execute(sql));
        if let Err(e) = &started {
            self.notices.push(Notice::from_error("Execution failed", e));
        }
        started
    }

    /// Apply the backend's answer to an execution started with `begin_execute`
    pub fn finish_execute(
        &mut self,
        ticket: ExecuteTicket,
        response: Result<ExecuteOutcome>,
    ) -> Result<&ResultSet> {
        match self.pipeline.finish_execute(ticket, response) {
            Ok(results) => {
                self.notices.push(Notice::success("Query Executed Successfully!"));
                Ok(results)
            }
            Err(e) => {
                self.notices.push(Notice::from_error("Execution failed", &e));
                Err(e)
            }
        }
    }

    /// Execute `sql`
    pub async fn execute_query(&mut self, sql: &str) -> Result<&ResultSet> {
        let ticket = self.begin_execute(sql)?;
        let response =
            with_timeout(self.timeout, "execute", self.backend.execute_sql(ticket.sql())).await;
        self.finish_execute(ticket, response)
    }

    /// Execute the most recently generated query
    pub async fn execute_generated(&mut self) -> Result<&ResultSet> {
        let sql = self.pipeline.generated_query().unwrap_or_default().to_string();
        self.execute_query(&sql).await
    }
}

/// Check the fields the backend cannot connect without
fn validate_profile(profile: &ConnectionProfile) -> Result<()> {
    if profile.host.trim().is_empty() {
        return Err(ClientError::validation("Host is required"));
    }
    if profile.port == 0 {
        return Err(ClientError::validation("Port must be between 1 and 65535"));
    }
    if profile.user.trim().is_empty() {
        return Err(ClientError::validation("User is required"));
    }
    if profile.database.trim().is_empty() {
        return Err(ClientError::validation("Database is required"));
    }
    Ok(())
}
