//! HTTP implementation of the backend service traits
//!
//! Every endpoint answers with the same envelope shape:
//! `{"success": bool, "message"?: string, ...endpoint fields}`.
//! A non-2xx status whose body still parses as that envelope is a logical
//! failure carrying the backend's message; any body that does not parse is a
//! transport failure.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{
    ConnectOutcome, ConnectionProfile, ConnectionService, ExecuteOutcome, GenerateOutcome,
    QueryService, Row,
};
use crate::error::{ClientError, Result};

const GENERIC_FAILURE: &str = "Backend reported a failure without a message";

/// Response envelope shared by all backend endpoints
#[derive(Debug, Default, Deserialize)]
struct WireResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    tables: Option<Vec<String>>,
    #[serde(default)]
    sql: Option<String>,
    #[serde(default)]
    results: Option<Vec<Row>>,
    #[serde(default)]
    table: Option<String>,
}

impl WireResponse {
    fn failure_message(&mut self) -> String {
        self.message
            .take()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE.to_string())
    }
}

/// Client for the question-to-SQL backend
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a backend client with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::config_error(format!("Could not create HTTP client: {e}")))?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_envelope(&self, response: reqwest::Response) -> Result<WireResponse> {
        let status = response.status();
        let body = response.text().await?;
        parse_envelope(status, &body)
    }

    async fn post<B: serde::Serialize + Sync>(&self, path: &str, body: &B) -> Result<WireResponse> {
        debug!(path, "POST");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        self.read_envelope(response).await
    }

    async fn get(&self, path: &str) -> Result<WireResponse> {
        debug!(path, "GET");
        let response = self.client.get(self.url(path)).send().await?;
        self.read_envelope(response).await
    }
}

/// Decode a response body, folding error statuses into logical failures
fn parse_envelope(status: StatusCode, body: &str) -> Result<WireResponse> {
    match serde_json::from_str::<WireResponse>(body) {
        Ok(mut envelope) => {
            if !status.is_success() {
                envelope.success = false;
                if envelope.message.is_none() {
                    envelope.message = Some(format!("HTTP {status}"));
                }
            }
            Ok(envelope)
        }
        Err(e) if status.is_success() => {
            Err(ClientError::transport(format!("malformed response: {e}")))
        }
        Err(_) => Err(ClientError::transport(format!("HTTP {status}"))),
    }
}

#[async_trait]
impl ConnectionService for HttpBackend {
    async fn connect(&self, profile: &ConnectionProfile) -> Result<ConnectOutcome> {
        let mut envelope = self.post("/connect", profile).await?;
        if envelope.success {
            Ok(ConnectOutcome::accepted())
        } else {
            Ok(ConnectOutcome::refused(envelope.failure_message()))
        }
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut envelope = self.get("/tables").await?;
        if envelope.success {
            Ok(envelope.tables.unwrap_or_default())
        } else {
            Err(ClientError::logical(envelope.failure_message()))
        }
    }
}

#[async_trait]
impl QueryService for HttpBackend {
    async fn generate_sql(&self, question: &str) -> Result<GenerateOutcome> {
        let body = serde_json::json!({ "question": question });
        let mut envelope = self.post("/generate-sql", &body).await?;
        if envelope.success {
            Ok(GenerateOutcome { success: true, sql: envelope.sql, message: None })
        } else {
            Ok(GenerateOutcome::failed(envelope.failure_message()))
        }
    }

    async fn execute_sql(&self, sql: &str) -> Result<ExecuteOutcome> {
        let body = serde_json::json!({ "sql": sql });
        let mut envelope = self.post("/execute", &body).await?;
        if envelope.success {
            let table = envelope.table.filter(|t| !t.is_empty());
            Ok(ExecuteOutcome::rows(envelope.results.unwrap_or_default(), table))
        } else {
            Ok(ExecuteOutcome::failed(envelope.failure_message()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:5000");
        assert_eq!(backend.url("/tables"), "http://localhost:5000/tables");
    }

    #[test]
    fn test_parse_success_envelope() {
        let envelope = parse_envelope(
            StatusCode::OK,
            r#"{"success": true, "results": [{"COUNT(*)": 42}], "table": "orders"}"#,
        )
        .unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.table.as_deref(), Some("orders"));
        let rows = envelope.results.unwrap();
        assert_eq!(rows[0]["COUNT(*)"], serde_json::json!(42));
    }

    #[test]
    fn test_parse_logical_failure() {
        let mut envelope =
            parse_envelope(StatusCode::OK, r#"{"success": false, "message": "bad sql"}"#).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.failure_message(), "bad sql");
    }

    #[test]
    fn test_parse_error_status_with_envelope_is_logical() {
        let mut envelope = parse_envelope(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"success": true, "message": "Access denied"}"#,
        )
        .unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.failure_message(), "Access denied");
    }

    #[test]
    fn test_parse_error_status_without_message() {
        let mut envelope = parse_envelope(StatusCode::BAD_REQUEST, "{}").unwrap();
        assert!(!envelope.success);
        assert!(envelope.failure_message().contains("400"));
    }

    #[test]
    fn test_parse_malformed_body_is_transport_failure() {
        let err = parse_envelope(StatusCode::OK, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, ClientError::TransportFailure(_)));

        let err = parse_envelope(StatusCode::BAD_GATEWAY, "Bad Gateway").unwrap_err();
        assert!(matches!(err, ClientError::TransportFailure(_)));
        assert!(err.message().contains("502"));
    }

    #[test]
    fn test_missing_message_gets_generic_text() {
        let mut envelope = parse_envelope(StatusCode::OK, r#"{"success": false}"#).unwrap();
        assert_eq!(envelope.failure_message(), GENERIC_FAILURE);
    }

    #[test]
    fn test_row_column_order_preserved() {
        let envelope = parse_envelope(
            StatusCode::OK,
            r#"{"success": true, "results": [{"zeta": 1, "alpha": 2, "mid": 3}]}"#,
        )
        .unwrap();
        let rows = envelope.results.unwrap();
        let columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_failure() {
        // Port 9 (discard) is almost never listening locally
        let backend = HttpBackend::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = backend.execute_sql("SELECT 1").await.unwrap_err();
        assert!(matches!(err, ClientError::TransportFailure(_)));
    }
}
