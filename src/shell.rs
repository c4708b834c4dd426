//! Interactive Shell
//!
//! A line-oriented loop over stdin. Each line is one command; notices the
//! session produced while handling it are printed before its output.
//!
//! # Commands
//! - `connect [host port user database]` - missing fields are prompted for
//! - `disconnect`, `status`, `tables`, `examples`
//! - `use <n>` - make example question `n` the current question
//! - `ask [question]` - generate SQL (the current question when omitted)
//! - `sql` - show the generated SQL
//! - `copy` - put the generated SQL on the system clipboard
//! - `run [sql]` - execute the given SQL, or the generated SQL
//! - `results`, `help`, `quit`

use anyhow::Result;
use std::io::{self, Write};
use tracing::warn;

use crate::error::ClientError;
use crate::render;
use crate::service::{ConnectionProfile, DEFAULT_HOST, DEFAULT_PORT};
use crate::session::{Session, SessionStatus};

pub const HELP: &str = "\
Commands:
  connect [host port user database]  Connect (prompts for anything missing)
  disconnect                         Disconnect and forget the saved profile
  status                             Show the connection status
  tables                             List tables in the connected database
  examples                           Show example questions
  use <n>                            Make example question n the current question
  ask [question]                     Generate SQL for a question
  sql                                Show the generated SQL
  copy                               Copy the generated SQL to the clipboard
  run [sql]                          Execute SQL (the generated SQL by default)
  results                            Show the last results
  help                               Show this help
  quit                               Leave the shell";

/// Fields given on the `connect` line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectArgs {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Connect(ConnectArgs),
    Disconnect,
    Status,
    Tables,
    Examples,
    /// 1-based example number
    Use(usize),
    Ask(Option<String>),
    Sql,
    Copy,
    Run(Option<String>),
    Results,
    Help,
    Quit,
}

/// Parse one input line; blank lines parse to `None`
pub fn parse_command(line: &str) -> std::result::Result<Option<ShellCommand>, ClientError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let rest_opt = || (!rest.is_empty()).then(|| rest.to_string());

    let command = match word.to_ascii_lowercase().as_str() {
        "connect" => ShellCommand::Connect(parse_connect_args(rest)?),
        "disconnect" => ShellCommand::Disconnect,
        "status" => ShellCommand::Status,
        "tables" => ShellCommand::Tables,
        "examples" => ShellCommand::Examples,
        "use" => {
            let n = rest
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ClientError::validation("Usage: use <n> (n starts at 1)"))?;
            ShellCommand::Use(n)
        }
        "ask" => ShellCommand::Ask(rest_opt()),
        "sql" => ShellCommand::Sql,
        "copy" => ShellCommand::Copy,
        "run" => ShellCommand::Run(rest_opt()),
        "results" => ShellCommand::Results,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => {
            return Err(ClientError::validation(format!(
                "Unknown command '{other}'. Type 'help' for commands."
            )))
        }
    };
    Ok(Some(command))
}

fn parse_connect_args(rest: &str) -> std::result::Result<ConnectArgs, ClientError> {
    let words: Vec<&str> = rest.split_whitespace().collect();
    match words.as_slice() {
        [] => Ok(ConnectArgs::default()),
        [host, port, user, database] => {
            let port = port
                .parse::<u16>()
                .map_err(|_| ClientError::validation(format!("Invalid port '{port}'")))?;
            Ok(ConnectArgs {
                host: Some((*host).to_string()),
                port: Some(port),
                user: Some((*user).to_string()),
                database: Some((*database).to_string()),
            })
        }
        _ => Err(ClientError::validation("Usage: connect [host port user database]")),
    }
}

/// Source of interactive input for `connect`
pub trait Prompt {
    /// Ask for a field, offering `default` when there is one
    fn text(&self, label: &str, default: Option<&str>) -> Result<String>;

    /// Ask for a password without echo; empty is allowed
    fn password(&self, label: &str) -> Result<String>;
}

/// Terminal prompts on stderr
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn text(&self, label: &str, default: Option<&str>) -> Result<String> {
        let mut input = dialoguer::Input::<String>::new().with_prompt(label).allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text()?)
    }

    fn password(&self, label: &str) -> Result<String> {
        Ok(dialoguer::Password::new()
            .with_prompt(label)
            .allow_empty_password(true)
            .interact()?)
    }
}

/// Fill in a profile from the `connect` line, prompting for the rest
///
/// Prompts offer the fields of `saved` (the last profile) as defaults.
pub fn complete_profile(
    args: ConnectArgs,
    saved: Option<&ConnectionProfile>,
    prompt: &dyn Prompt,
) -> Result<ConnectionProfile> {
    let host = match args.host {
        Some(host) => host,
        None => {
            let default = remembered(saved.map(|p| p.host.as_str())).unwrap_or(DEFAULT_HOST);
            prompt.text("Host", Some(default))?
        }
    };
    let port = match args.port {
        Some(port) => port,
        None => {
            let default = saved.map_or(DEFAULT_PORT, |p| p.port);
            let raw = prompt.text("Port", Some(&default.to_string()))?;
            raw.trim()
                .parse::<u16>()
                .map_err(|_| ClientError::validation(format!("Invalid port '{raw}'")))?
        }
    };
    let user = match args.user {
        Some(user) => user,
        None => prompt.text("User", remembered(saved.map(|p| p.user.as_str())))?,
    };
    let password = prompt.password("Password")?;
    let database = match args.database {
        Some(database) => database,
        None => prompt.text("Database", remembered(saved.map(|p| p.database.as_str())))?,
    };
    Ok(ConnectionProfile::new(host, port, user, password, database))
}

fn remembered(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

/// What the loop should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Print the text (if any) and read the next line
    Continue(String),
    Quit,
}

/// Run one command against the session
///
/// Failures of session operations are reported through the session's
/// notices; only shell-level errors (such as prompt I/O) are returned.
pub async fn handle(
    session: &mut Session,
    prompt: &dyn Prompt,
    command: ShellCommand,
) -> Result<Flow> {
    let text = match command {
        ShellCommand::Connect(args) => {
            if session.is_connected() {
                "Already connected; disconnect first.".to_string()
            } else {
                let saved = session.profile().cloned();
                let profile = match complete_profile(args, saved.as_ref(), prompt) {
                    Ok(profile) => profile,
                    Err(e) => match e.downcast::<ClientError>() {
                        Ok(invalid) => return Ok(Flow::Continue(invalid.message())),
                        Err(e) => return Err(e),
                    },
                };
                match session.connect(profile).await {
                    Ok(_) => render::render_examples(session.examples()),
                    Err(_) => String::new(),
                }
            }
        }
        ShellCommand::Disconnect => {
            let _ = session.disconnect();
            String::new()
        }
        ShellCommand::Status => render::render_status(session),
        ShellCommand::Tables => match session.list_tables().await {
            Ok(tables) if tables.is_empty() => "No tables found.".to_string(),
            Ok(tables) => tables.join("\n"),
            Err(e) => e.to_string(),
        },
        ShellCommand::Examples => {
            if session.is_connected() {
                render::render_examples(session.examples())
            } else {
                ClientError::NotConnected.to_string()
            }
        }
        ShellCommand::Use(n) => {
            let picked = n
                .checked_sub(1)
                .ok_or_else(|| ClientError::validation("Example numbers start at 1"))
                .and_then(|index| session.use_example(index).map(str::to_string));
            match picked {
                Ok(question) => format!("Question: {question}"),
                Err(e) => e.to_string(),
            }
        }
        ShellCommand::Ask(question) => {
            let question =
                question.unwrap_or_else(|| session.pipeline().question().to_string());
            match session.generate_query(&question).await {
                Ok(sql) => render::render_sql(&sql),
                Err(_) => String::new(),
            }
        }
        ShellCommand::Sql => match session.pipeline().generated_query() {
            Some(sql) => render::render_sql(sql),
            None => "No SQL generated yet.".to_string(),
        },
        ShellCommand::Copy => match session.pipeline().generated_query() {
            Some(sql) => copy_to_clipboard(sql),
            None => "No SQL generated yet.".to_string(),
        },
        ShellCommand::Run(sql) => {
            let outcome = match sql {
                Some(sql) => session.execute_query(&sql).await,
                None => session.execute_generated().await,
            };
            match outcome {
                Ok(results) => render::render_results(Some(results)),
                Err(_) => String::new(),
            }
        }
        ShellCommand::Results => render::render_results(session.pipeline().results()),
        ShellCommand::Help => HELP.to_string(),
        ShellCommand::Quit => return Ok(Flow::Quit),
    };
    Ok(Flow::Continue(text))
}

/// Put `text` on the system clipboard and describe what happened
fn copy_to_clipboard(text: &str) -> String {
    let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
    match copied {
        Ok(()) => copied_summary(text),
        Err(e) => {
            warn!(error = %e, "clipboard unavailable");
            format!("Failed to copy: {e}")
        }
    }
}

fn copied_summary(text: &str) -> String {
    let lines = text.lines().count();
    let chars = text.chars().count();
    format!(
        "Copied {lines} line{}, {chars} char{}",
        if lines == 1 { "" } else { "s" },
        if chars == 1 { "" } else { "s" }
    )
}

/// Run the shell until `quit` or end of input
pub async fn run(session: &mut Session, prompt: &dyn Prompt) -> Result<()> {
    let mut stdout = io::stdout();

    let status = session.startup().await;
    print_notices(session, &mut stdout)?;
    writeln!(stdout, "{}", render::render_status(session))?;
    if status == SessionStatus::Connected {
        writeln!(stdout, "{}", render::render_examples(session.examples()))?;
    }
    writeln!(stdout, "Type 'help' for commands.")?;

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        write!(stdout, "askdb> ")?;
        stdout.flush()?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            writeln!(stdout)?;
            break;
        }

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                writeln!(stdout, "{}", e.message())?;
                continue;
            }
        };

        let flow = handle(session, prompt, command).await?;
        print_notices(session, &mut stdout)?;
        match flow {
            Flow::Continue(text) if text.is_empty() => {}
            Flow::Continue(text) => writeln!(stdout, "{text}")?,
            Flow::Quit => break,
        }
    }

    Ok(())
}

fn print_notices(session: &mut Session, out: &mut impl Write) -> Result<()> {
    for notice in session.drain_notices() {
        writeln!(out, "{notice}")?;
    }
    Ok(())
}
