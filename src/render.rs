//! Plain-text rendering for the interactive shell

use std::fmt::Write as _;

use crate::pipeline::ResultSet;
use crate::session::{Session, SessionStatus};

pub const NOT_EXECUTED: &str = "No query executed yet.";
pub const NO_ROWS: &str = "No rows found.";

/// Cell text for a JSON value: strings bare, everything else as JSON
#[must_use]
pub fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render results as an aligned table
///
/// Headers come from the first row. `None` and an empty set render as two
/// different messages.
#[must_use]
pub fn render_results(results: Option<&ResultSet>) -> String {
    let Some(results) = results else {
        return NOT_EXECUTED.to_string();
    };

    let mut out = String::new();
    if let Some(table) = &results.source_table {
        let _ = writeln!(out, "Query Results (from table: {table})");
    } else {
        out.push_str("Query Results\n");
    }

    if results.is_empty() {
        out.push_str(NO_ROWS);
        return out;
    }

    let columns = results.columns();
    let cells: Vec<Vec<String>> = results
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| row.get(*col).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
    push_row(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &cells {
        push_row(&mut out, row, &widths);
    }

    let _ = write!(out, "({} row{})", results.len(), if results.len() == 1 { "" } else { "s" });
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(line.join(" | ").trim_end());
    out.push('\n');
}

/// Generated SQL with right-aligned line numbers
#[must_use]
pub fn render_sql(sql: &str) -> String {
    sql.lines()
        .enumerate()
        .map(|(i, line)| format!("{:>3}  {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Numbered example questions, 1-based to match `use <n>`
#[must_use]
pub fn render_examples(examples: &[String]) -> String {
    if examples.is_empty() {
        return "No example questions available.".to_string();
    }
    let mut out = String::from("Example Questions\n");
    for (i, question) in examples.iter().enumerate() {
        let _ = writeln!(out, "  {}. {question}", i + 1);
    }
    out.trim_end().to_string()
}

/// One-line summary of the session
#[must_use]
pub fn render_status(session: &Session) -> String {
    match (session.status(), session.profile()) {
        (SessionStatus::Connected, Some(profile)) => {
            format!(
                "Connected to {} (pipeline: {})",
                profile.display_target(),
                session.pipeline().stage()
            )
        }
        (SessionStatus::Connected, None) => "Connected".to_string(),
        (SessionStatus::Disconnected, _) => "Disconnected. Connect to a database first.".to_string(),
    }
}
