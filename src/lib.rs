//! askdb - Ask a Relational Database in Plain Language
//!
//! askdb is a terminal client for a question-to-SQL backend. The user connects
//! to a database through the backend, asks a question, reviews the generated
//! SQL, runs it, and reads the rows.
//!
//! # Architecture
//! The backend owns the database connection and the translation; this crate
//! owns the client-side state: whether a session is connected, which profile
//! to reconnect with, and where the current question is in its
//! generate-then-execute lifecycle.
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`service`] - Backend service traits and the HTTP implementation
//! - [`store`] - Credential store for the last-used profile
//! - [`config`] - Settings resolution
//! - [`session`] - Session state machine and example questions
//! - [`pipeline`] - Query pipeline (draft, generated SQL, results)
//! - [`notice`] - Typed user notifications
//! - [`output`] - JSON output envelopes for one-shot commands
//! - [`render`] - Plain-text rendering
//! - [`shell`] - Interactive shell

pub mod config;
pub mod error;
pub mod notice;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod service;
pub mod session;
pub mod shell;
pub mod store;

pub use config::{Overrides, Settings};
pub use error::{ClientError, Result};
pub use notice::{Notice, NoticeLevel};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
pub use pipeline::{ExecuteTicket, GenerateTicket, PipelineStage, QueryDraft, QueryPipeline, ResultSet};
pub use service::{
    Backend, ConnectOutcome, ConnectionProfile, ConnectionService, ExecuteOutcome,
    GenerateOutcome, HttpBackend, QueryService, Row,
};
pub use session::{ConnectTicket, Session, SessionState, SessionStatus};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
