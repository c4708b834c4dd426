//! Local preconditions checked before anything is sent to the backend
//!
//! A query that is empty, blank, or made only of comments has nothing to
//! execute, so it is rejected here instead of costing a round trip.

use crate::error::{ClientError, Result};

/// Check that `sql` contains at least one token outside of comments
///
/// Returns the trimmed query text to send.
pub fn validate_query_text(sql: &str) -> Result<&str> {
    let trimmed = sql.trim();
    if trimmed.is_empty() || strip_comments(trimmed).trim().is_empty() {
        return Err(ClientError::validation("No SQL query to execute"));
    }
    Ok(trimmed)
}

/// Check that a question has some text in it
pub fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(ClientError::validation("Question cannot be empty"));
    }
    Ok(trimmed)
}

/// Strip SQL comments from query
///
/// Handles:
/// - Line comments: -- comment
/// - Block comments: /* comment */
///
/// Quoted text is copied verbatim so `'--'` inside a literal survives.
fn strip_comments(sql: &str) -> String {
    let mut result = String::new();
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            result.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                result.push(ch);
            }
            '-' if chars.peek() == Some(&'-') => {
                // Line comment: skip until newline
                chars.next();
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                // Block comment: skip until */
                chars.next();
                let mut prev = ' ';
                for ch in chars.by_ref() {
                    if prev == '*' && ch == '/' {
                        break;
                    }
                    prev = ch;
                }
                result.push(' ');
            }
            _ => result.push(ch),
        }
    }

    result
}
