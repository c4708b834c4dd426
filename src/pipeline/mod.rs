//! Query Pipeline
//!
//! Tracks one question from text to generated SQL to executed results.
//!
//! # Stages
//! `Idle -> Generating -> Generated -> Executing -> Executed`
//!
//! The stable stages are derived from the data held (no query, a query, a
//! query with results); the in-flight stages from outstanding tickets. A
//! failed request therefore falls back to whatever stable stage the data
//! still describes, and the question text is never lost.
//!
//! # Superseding
//! Each request is issued a ticket. Starting a newer request of the same kind,
//! starting a generation (which invalidates any execution), or resetting the
//! pipeline makes older tickets stale; a stale response is rejected with
//! `Superseded` and changes nothing. A generation that succeeds also drops
//! rows and executions from while it was in flight, so results never outlive
//! the query they came from.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::service::{ExecuteOutcome, GenerateOutcome, Row};

pub mod validate;

pub use validate::{validate_query_text, validate_question};

/// Where the current question is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Idle,
    Generating,
    Generated,
    Executing,
    Executed,
}

impl PipelineStage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Generated => "generated",
            Self::Executing => "executing",
            Self::Executed => "executed",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The question being asked and the SQL generated for it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryDraft {
    pub question: String,
    pub generated_query: Option<String>,
}

/// Rows returned by one execution
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    /// Table the backend says the rows came from
    pub source_table: Option<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    #[must_use]
    pub fn new(rows: Vec<Row>, source_table: Option<String>) -> Self {
        Self { source_table, rows }
    }

    /// Column headers, taken from the first record
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        self.rows
            .first()
            .map(|row| row.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Proof that a generation was started; hand it back with the response
#[derive(Debug)]
#[must_use = "a started generation must be finished or it stays in flight"]
pub struct GenerateTicket {
    epoch: u64,
    question: String,
}

impl GenerateTicket {
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }
}

/// Proof that an execution was started; hand it back with the response
#[derive(Debug)]
#[must_use = "a started execution must be finished or it stays in flight"]
pub struct ExecuteTicket {
    epoch: u64,
    sql: String,
}

impl ExecuteTicket {
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Per-question state: draft, results, and in-flight requests
#[derive(Debug, Default)]
pub struct QueryPipeline {
    draft: QueryDraft,
    results: Option<ResultSet>,
    generate_epoch: u64,
    execute_epoch: u64,
    pending_generate: Option<u64>,
    pending_execute: Option<u64>,
}

impl QueryPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn draft(&self) -> &QueryDraft {
        &self.draft
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.draft.question
    }

    #[must_use]
    pub fn generated_query(&self) -> Option<&str> {
        self.draft.generated_query.as_deref()
    }

    /// `None` until a query has executed; `Some` with no rows after an
    /// execution that matched nothing
    #[must_use]
    pub fn results(&self) -> Option<&ResultSet> {
        self.results.as_ref()
    }

    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        if self.pending_generate.is_some() {
            PipelineStage::Generating
        } else if self.pending_execute.is_some() {
            PipelineStage::Executing
        } else if self.results.is_some() {
            PipelineStage::Executed
        } else if self.draft.generated_query.is_some() {
            PipelineStage::Generated
        } else {
            PipelineStage::Idle
        }
    }

    /// Replace the question text without touching the generated query
    pub fn set_question(&mut self, question: impl Into<String>) {
        self.draft.question = question.into();
    }

    /// Start generating SQL for `question`
    ///
    /// Clears the current results right away: whatever the new generation
    /// returns, the old rows no longer match what is on screen.
    pub fn begin_generate(&mut self, question: &str) -> Result<GenerateTicket> {
        self.draft.question = question.to_string();
        self.results = None;
        self.execute_epoch += 1;
        self.pending_execute = None;

        let question = validate_question(question)?.to_string();
        self.generate_epoch += 1;
        self.pending_generate = Some(self.generate_epoch);

        debug!(epoch = self.generate_epoch, "generation started");
        Ok(GenerateTicket { epoch: self.generate_epoch, question })
    }

    /// Apply the response to a generation started with `begin_generate`
    ///
    /// On success returns the generated SQL. On failure the previously
    /// generated query, if any, is kept.
    pub fn finish_generate(
        &mut self,
        ticket: GenerateTicket,
        response: Result<GenerateOutcome>,
    ) -> Result<String> {
        if self.pending_generate != Some(ticket.epoch) {
            debug!(epoch = ticket.epoch, "discarding stale generation response");
            return Err(ClientError::superseded("generate"));
        }
        self.pending_generate = None;

        let outcome = response?;
        if !outcome.success {
            return Err(ClientError::logical(
                outcome.message.unwrap_or_else(|| "SQL generation failed".to_string()),
            ));
        }

        match outcome.sql.filter(|sql| !sql.trim().is_empty()) {
            Some(sql) => {
                info!("SQL generated");
                // Rows from anything executed meanwhile belong to the old query
                self.results = None;
                self.execute_epoch += 1;
                self.pending_execute = None;
                self.draft.generated_query = Some(sql.clone());
                Ok(sql)
            }
            None => Err(ClientError::logical("Backend returned no SQL")),
        }
    }

    /// Start executing `sql`
    ///
    /// Empty or comment-only text fails here without a request.
    pub fn begin_execute(&mut self, sql: &str) -> Result<ExecuteTicket> {
        let sql = validate_query_text(sql)?.to_string();

        self.execute_epoch += 1;
        self.pending_execute = Some(self.execute_epoch);

        debug!(epoch = self.execute_epoch, "execution started");
        Ok(ExecuteTicket { epoch: self.execute_epoch, sql })
    }

    /// Apply the response to an execution started with `begin_execute`
    ///
    /// On success the results are replaced and the executed SQL becomes the
    /// current query. On failure the previous results are kept.
    pub fn finish_execute(
        &mut self,
        ticket: ExecuteTicket,
        response: Result<ExecuteOutcome>,
    ) -> Result<&ResultSet> {
        if self.pending_execute != Some(ticket.epoch) {
            debug!(epoch = ticket.epoch, "discarding stale execution response");
            return Err(ClientError::superseded("execute"));
        }
        self.pending_execute = None;

        let outcome = response?;
        if !outcome.success {
            return Err(ClientError::logical(
                outcome.message.unwrap_or_else(|| "Execution failed".to_string()),
            ));
        }

        info!(rows = outcome.results.len(), "query executed");
        self.draft.generated_query = Some(ticket.sql);
        Ok(&*self.results.insert(ResultSet::new(outcome.results, outcome.table)))
    }

    /// Forget the draft and results and invalidate anything in flight
    pub fn reset(&mut self) {
        self.draft = QueryDraft::default();
        self.results = None;
        self.generate_epoch += 1;
        self.execute_epoch += 1;
        self.pending_generate = None;
        self.pending_execute = None;
    }
}
