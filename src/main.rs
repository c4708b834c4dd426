//! askdb CLI Entry Point
//!
//! Without a subcommand askdb starts the interactive shell. The one-shot
//! subcommands print exactly one JSON envelope to stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use askdb::service::{DEFAULT_HOST, DEFAULT_PORT};
use askdb::shell::{self, Prompt, TerminalPrompt};
use askdb::{
    ClientError, ConnectionProfile, CredentialStore, ErrorEnvelope, FileCredentialStore,
    HttpBackend, MemoryCredentialStore, Metadata, Overrides, Session, Settings, SuccessEnvelope,
};

/// askdb - Ask a relational database questions in plain language
#[derive(Parser)]
#[command(name = "askdb")]
#[command(about = "Ask a relational database questions in plain language")]
#[command(version)]
struct Cli {
    /// Base URL of the query backend
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Upper bound on each backend call, in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Where the last successful connection profile is stored
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    /// Keep the connection profile in memory only
    #[arg(long, global = true)]
    no_persist: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive shell (default)
    Shell,

    /// Connect to a database through the backend and save the profile
    Connect {
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        #[arg(long)]
        user: String,

        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,

        #[arg(long)]
        database: String,
    },

    /// Disconnect and forget the saved profile
    Disconnect,

    /// Report the connection status (reconnecting with the saved profile)
    Status,

    /// List tables in the connected database
    Tables,

    /// Generate SQL for a question
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Execute SQL and print the rows
    Exec { sql: String },
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Connect { .. } => "connect",
            Self::Disconnect => "disconnect",
            Self::Status => "status",
            Self::Tables => "tables",
            Self::Ask { .. } => "ask",
            Self::Exec { .. } => "exec",
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("askdb=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let overrides = Overrides {
        backend_url: cli.backend_url,
        timeout_ms: cli.timeout_ms,
        store_path: cli.store_path,
    };
    let command = cli.command.unwrap_or(Commands::Shell);
    let name = command.name();

    let mut session = match build_session(overrides, cli.no_persist) {
        Ok(session) => session,
        Err(e) => {
            if matches!(command, Commands::Shell) {
                return Err(e.into());
            }
            return print_error(name, &e);
        }
    };

    if matches!(command, Commands::Shell) {
        shell::run(&mut session, &TerminalPrompt).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let started = Instant::now();
    let outcome = run_one_shot(&mut session, command, &TerminalPrompt).await;
    for notice in session.drain_notices() {
        debug!(%notice, "notice");
    }

    match outcome {
        Ok((data, rows)) => {
            let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            let meta = match rows {
                Some(rows) => Metadata::with_rows(elapsed, rows),
                None => Metadata::new(elapsed),
            };
            println!("{}", serde_json::to_string(&SuccessEnvelope::new(name, data, meta))?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => print_error(name, &e),
    }
}

fn build_session(overrides: Overrides, no_persist: bool) -> Result<Session, ClientError> {
    let settings = Settings::resolve(overrides)?;
    debug!(backend = %settings.backend_url, timeout_ms = settings.timeout.as_millis(), "settings resolved");

    let backend = HttpBackend::new(&settings.backend_url, settings.timeout)?;
    let store: Arc<dyn CredentialStore> = if no_persist {
        Arc::new(MemoryCredentialStore::new())
    } else {
        Arc::new(FileCredentialStore::new(settings.store_path))
    };
    Ok(Session::new(Arc::new(backend), store, settings.timeout))
}

/// Run a one-shot command; returns the envelope data and the row count for `exec`
///
/// `connect` and `disconnect` act on the saved profile directly and skip the
/// startup reconnect; every other command reconnects first.
async fn run_one_shot(
    session: &mut Session,
    command: Commands,
    prompt: &dyn Prompt,
) -> Result<(serde_json::Value, Option<usize>), ClientError> {
    match command {
        Commands::Connect { host, port, user, password, database } => {
            let password = match password {
                Some(password) => password,
                None => prompt
                    .password("Password")
                    .map_err(|e| ClientError::validation(format!("Could not read password: {e}")))?,
            };
            let profile = ConnectionProfile::new(host, port, user, password, database);
            let status = session.connect(profile).await?;
            Ok((
                json!({
                    "status": status,
                    "target": session.profile().map(ConnectionProfile::display_target),
                    "examples": session.examples(),
                }),
                None,
            ))
        }
        Commands::Disconnect => {
            session.disconnect()?;
            Ok((json!({"status": session.status()}), None))
        }
        Commands::Status => {
            let status = session.startup().await;
            Ok((
                json!({
                    "status": status,
                    "target": session.profile().map(ConnectionProfile::display_target),
                }),
                None,
            ))
        }
        Commands::Tables => {
            session.startup().await;
            let tables = session.list_tables().await?;
            Ok((json!({"tables": tables}), None))
        }
        Commands::Ask { question } => {
            session.startup().await;
            let question = question.join(" ");
            let sql = session.generate_query(&question).await?;
            Ok((json!({"question": question, "sql": sql}), None))
        }
        Commands::Exec { sql } => {
            session.startup().await;
            let results = session.execute_query(&sql).await?;
            Ok((
                json!({
                    "table": results.source_table,
                    "columns": results.columns(),
                    "rows": results.rows,
                }),
                Some(results.len()),
            ))
        }
        Commands::Shell => Err(ClientError::validation("shell is not a one-shot command")),
    }
}

fn print_error(command: &str, err: &ClientError) -> anyhow::Result<ExitCode> {
    println!("{}", serde_json::to_string(&ErrorEnvelope::from_error(command, err))?);
    Ok(ExitCode::FAILURE)
}
