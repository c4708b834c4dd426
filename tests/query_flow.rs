//! Query Flow Tests
//!
//! Question to SQL to rows, through a connected `Session`.

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use askdb::{
    ClientError, ExecuteOutcome, GenerateOutcome, MemoryCredentialStore, NoticeLevel,
    PipelineStage, ResultSet,
};
use common::{
    connected_session, fresh_session, rows, session_with, shop_profile, transport_error,
    FakeBackend,
};

#[tokio::test]
async fn test_count_question_end_to_end() {
    let (mut session, backend, _store) = connected_session().await;

    let sql = session.generate_query("How many rows are in orders?").await.unwrap();
    assert_eq!(sql, "SELECT COUNT(*) FROM orders;");
    assert_eq!(session.pipeline().stage(), PipelineStage::Generated);

    let results = session.execute_generated().await.unwrap().clone();
    assert_eq!(backend.last_sql().as_deref(), Some("SELECT COUNT(*) FROM orders;"));
    assert_eq!(results.source_table.as_deref(), Some("orders"));
    assert_eq!(results.columns(), vec!["COUNT(*)"]);
    assert_eq!(results.rows, rows(json!([{"COUNT(*)": 42}])));
    assert_eq!(session.pipeline().stage(), PipelineStage::Executed);

    let texts: Vec<String> = session.drain_notices().into_iter().map(|n| n.text).collect();
    assert_eq!(texts, vec!["SQL Generated Successfully!", "Query Executed Successfully!"]);
}

#[tokio::test]
async fn test_new_generation_clears_results() {
    let (mut session, _backend, _store) = connected_session().await;
    session.generate_query("How many rows are in orders?").await.unwrap();
    session.execute_generated().await.unwrap();
    assert!(session.pipeline().results().is_some());

    session.generate_query("Show all records from products").await.unwrap();

    assert_eq!(session.pipeline().results(), None);
    assert_eq!(session.pipeline().question(), "Show all records from products");
}

#[tokio::test]
async fn test_failed_generation_keeps_previous_sql() {
    let (mut session, backend, _store) = connected_session().await;
    session.generate_query("How many rows are in orders?").await.unwrap();

    backend.reply_generate(Ok(GenerateOutcome::failed("Could not understand the question")));
    let err = session.generate_query("asdf").await.unwrap_err();

    assert_eq!(err, ClientError::logical("Could not understand the question"));
    assert_eq!(session.pipeline().generated_query(), Some("SELECT COUNT(*) FROM orders;"));
    let notice = session.drain_notices().pop().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.text, "SQL Generation failed: Could not understand the question");
}

#[tokio::test]
async fn test_blank_question_is_rejected_without_request() {
    let (mut session, backend, _store) = connected_session().await;

    let err = session.generate_query("   ").await.unwrap_err();

    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert_eq!(backend.calls.generate(), 0);
    assert_eq!(session.drain_notices()[0].level, NoticeLevel::Warning);
}

#[tokio::test]
async fn test_empty_sql_makes_no_request() {
    let (mut session, backend, _store) = connected_session().await;

    for sql in ["", "   ", "-- just a comment", "/* nothing */"] {
        let err = session.execute_query(sql).await.unwrap_err();
        assert_eq!(err, ClientError::validation("No SQL query to execute"));
    }
    assert_eq!(backend.calls.execute(), 0);
    assert_eq!(session.pipeline().results(), None);
}

#[tokio::test]
async fn test_execute_generated_without_generation() {
    let (mut session, backend, _store) = connected_session().await;

    let err = session.execute_generated().await.unwrap_err();

    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert_eq!(backend.calls.execute(), 0);
}

#[tokio::test]
async fn test_zero_rows_differs_from_not_executed() {
    let (mut session, backend, _store) = connected_session().await;
    assert_eq!(session.pipeline().results(), None);

    backend.reply_execute(Ok(ExecuteOutcome::rows(Vec::new(), Some("orders".to_string()))));
    session.execute_query("SELECT * FROM orders WHERE 1 = 0").await.unwrap();

    let results = session.pipeline().results().unwrap();
    assert!(results.is_empty());
    assert!(results.columns().is_empty());
}

#[tokio::test]
async fn test_transport_failure_keeps_previous_results() {
    let (mut session, backend, _store) = connected_session().await;
    session.execute_query("SELECT COUNT(*) FROM orders;").await.unwrap();
    let before = session.pipeline().results().cloned();

    backend.reply_execute(Err(transport_error()));
    let err = session.execute_query("SELECT * FROM products").await.unwrap_err();

    assert_eq!(err.error_code(), "TRANSPORT_FAILURE");
    assert_eq!(session.pipeline().results().cloned(), before);
    assert_eq!(session.pipeline().stage(), PipelineStage::Executed);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_logical_failure_reports_backend_message() {
    let (mut session, backend, _store) = connected_session().await;
    backend.reply_execute(Ok(ExecuteOutcome::failed("Table 'shop.users' doesn't exist")));

    let err = session.execute_query("SELECT * FROM users").await.unwrap_err();

    assert_eq!(err, ClientError::logical("Table 'shop.users' doesn't exist"));
    assert_eq!(
        session.drain_notices().pop().unwrap().text,
        "Execution failed: Table 'shop.users' doesn't exist"
    );
}

#[tokio::test]
async fn test_hand_edited_sql_becomes_current_query() {
    let (mut session, backend, _store) = connected_session().await;
    session.generate_query("How many rows are in orders?").await.unwrap();

    session.execute_query("SELECT COUNT(*) FROM orders WHERE total > 10").await.unwrap();

    assert_eq!(
        session.pipeline().generated_query(),
        Some("SELECT COUNT(*) FROM orders WHERE total > 10")
    );
    assert_eq!(
        backend.last_sql().as_deref(),
        Some("SELECT COUNT(*) FROM orders WHERE total > 10")
    );
}

#[tokio::test]
async fn test_columns_keep_backend_order() {
    let (mut session, backend, _store) = connected_session().await;
    backend.reply_execute(Ok(ExecuteOutcome::rows(
        rows(json!([{"zeta": 1, "alpha": "a", "mid": null}])),
        None,
    )));

    let results: ResultSet =
        session.execute_query("SELECT zeta, alpha, mid FROM t").await.unwrap().clone();

    assert_eq!(results.columns(), vec!["zeta", "alpha", "mid"]);
}

#[tokio::test]
async fn test_use_example_then_generate() {
    let (mut session, backend, _store) = connected_session().await;
    let picked = session.examples()[2].clone();

    assert_eq!(session.use_example(2).unwrap(), picked);
    let question = session.pipeline().question().to_string();
    session.generate_query(&question).await.unwrap();

    assert_eq!(session.pipeline().question(), picked);
    assert_eq!(backend.calls.generate(), 1);
    assert!(session.use_example(99).is_err());
}

#[tokio::test]
async fn test_execute_times_out() {
    let backend = FakeBackend::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let mut session = session_with(&backend, &store, Duration::from_millis(50));
    session.connect(shop_profile()).await.unwrap();

    backend.set_delay(Duration::from_millis(500));
    let err = session.execute_query("SELECT 1").await.unwrap_err();

    assert_eq!(err, ClientError::transport("execute timed out after 50 ms"));
    assert_eq!(session.pipeline().results(), None);
}

// ============================================================================
// Two-phase requests
// ============================================================================

#[tokio::test]
async fn test_newer_generation_supersedes_older_through_session() {
    let (mut session, _backend, _store) = connected_session().await;

    let first = session.begin_generate("Show all records from orders").unwrap();
    let second = session.begin_generate("Show all records from products").unwrap();
    assert_eq!(session.pipeline().stage(), PipelineStage::Generating);

    let late = session.finish_generate(first, Ok(GenerateOutcome::generated("SELECT * FROM orders")));
    assert_eq!(late, Err(ClientError::superseded("generate")));
    assert_eq!(session.pipeline().generated_query(), None);

    let sql = session
        .finish_generate(second, Ok(GenerateOutcome::generated("SELECT * FROM products")))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM products");
    assert_eq!(session.pipeline().question(), "Show all records from products");

    let levels: Vec<NoticeLevel> = session.drain_notices().into_iter().map(|n| n.level).collect();
    assert_eq!(levels, vec![NoticeLevel::Info, NoticeLevel::Success]);
}

#[tokio::test]
async fn test_generation_drops_rows_executed_while_it_was_pending() {
    let (mut session, _backend, _store) = connected_session().await;

    let generate = session.begin_generate("How many rows are in products?").unwrap();
    let execute = session.begin_execute("SELECT COUNT(*) FROM orders").unwrap();
    session
        .finish_execute(
            execute,
            Ok(ExecuteOutcome::rows(rows(json!([{"COUNT(*)": 42}])), Some("orders".to_string()))),
        )
        .unwrap();
    assert!(session.pipeline().results().is_some());

    session
        .finish_generate(generate, Ok(GenerateOutcome::generated("SELECT COUNT(*) FROM products")))
        .unwrap();

    assert_eq!(session.pipeline().generated_query(), Some("SELECT COUNT(*) FROM products"));
    assert_eq!(session.pipeline().results(), None);
    assert_eq!(session.pipeline().stage(), PipelineStage::Generated);
}

#[tokio::test]
async fn test_disconnect_discards_pending_generation() {
    let (mut session, _backend, _store) = connected_session().await;
    let ticket = session.begin_generate("How many rows are in orders?").unwrap();

    session.disconnect().unwrap();
    let late = session.finish_generate(ticket, Ok(GenerateOutcome::generated("SELECT 1")));

    assert_eq!(late, Err(ClientError::superseded("generate")));
    assert_eq!(session.pipeline().generated_query(), None);
    assert_eq!(session.pipeline().stage(), PipelineStage::Idle);
}

#[tokio::test]
async fn test_begin_execute_checks_text_before_connection() {
    let (mut session, backend, _store) = fresh_session();

    assert_eq!(
        session.begin_execute("-- nothing").unwrap_err(),
        ClientError::validation("No SQL query to execute")
    );
    assert_eq!(session.begin_execute("SELECT 1").unwrap_err(), ClientError::NotConnected);
    assert_eq!(session.begin_generate("q").unwrap_err(), ClientError::NotConnected);
    assert_eq!(backend.calls.execute(), 0);

    let levels: Vec<NoticeLevel> = session.drain_notices().into_iter().map(|n| n.level).collect();
    assert_eq!(levels, vec![NoticeLevel::Warning, NoticeLevel::Error, NoticeLevel::Error]);
}
