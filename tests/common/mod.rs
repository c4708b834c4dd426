//! Shared fakes for the integration tests
//!
//! `FakeBackend` answers every call from a scripted reply and counts calls,
//! so tests can assert both on the session state and on whether a request
//! was made at all.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use askdb::{
    ClientError, ConnectOutcome, ConnectionProfile, ConnectionService, CredentialStore,
    ExecuteOutcome, GenerateOutcome, MemoryCredentialStore, QueryService, Result, Row, Session,
};

pub const TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Fake backend
// ============================================================================

#[derive(Default)]
pub struct CallCounts {
    pub connect: AtomicUsize,
    pub list_tables: AtomicUsize,
    pub generate: AtomicUsize,
    pub execute: AtomicUsize,
}

impl CallCounts {
    pub fn connect(&self) -> usize {
        self.connect.load(Ordering::SeqCst)
    }

    pub fn list_tables(&self) -> usize {
        self.list_tables.load(Ordering::SeqCst)
    }

    pub fn generate(&self) -> usize {
        self.generate.load(Ordering::SeqCst)
    }

    pub fn execute(&self) -> usize {
        self.execute.load(Ordering::SeqCst)
    }
}

pub struct FakeBackend {
    connect_reply: Mutex<Result<ConnectOutcome>>,
    tables_reply: Mutex<Result<Vec<String>>>,
    generate_reply: Mutex<Result<GenerateOutcome>>,
    execute_reply: Mutex<Result<ExecuteOutcome>>,
    delay: Mutex<Option<Duration>>,
    last_profile: Mutex<Option<ConnectionProfile>>,
    last_sql: Mutex<Option<String>>,
    pub calls: CallCounts,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            connect_reply: Mutex::new(Ok(ConnectOutcome::accepted())),
            tables_reply: Mutex::new(Ok(vec!["orders".to_string(), "products".to_string()])),
            generate_reply: Mutex::new(Ok(GenerateOutcome::generated(
                "SELECT COUNT(*) FROM orders;",
            ))),
            execute_reply: Mutex::new(Ok(ExecuteOutcome::rows(
                rows(serde_json::json!([{"COUNT(*)": 42}])),
                Some("orders".to_string()),
            ))),
            delay: Mutex::new(None),
            last_profile: Mutex::new(None),
            last_sql: Mutex::new(None),
            calls: CallCounts::default(),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_connect(&self, reply: Result<ConnectOutcome>) {
        *self.connect_reply.lock().unwrap() = reply;
    }

    pub fn reply_tables(&self, reply: Result<Vec<String>>) {
        *self.tables_reply.lock().unwrap() = reply;
    }

    pub fn reply_generate(&self, reply: Result<GenerateOutcome>) {
        *self.generate_reply.lock().unwrap() = reply;
    }

    pub fn reply_execute(&self, reply: Result<ExecuteOutcome>) {
        *self.execute_reply.lock().unwrap() = reply;
    }

    /// Every call sleeps this long before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn last_profile(&self) -> Option<ConnectionProfile> {
        self.last_profile.lock().unwrap().clone()
    }

    pub fn last_sql(&self) -> Option<String> {
        self.last_sql.lock().unwrap().clone()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ConnectionService for FakeBackend {
    async fn connect(&self, profile: &ConnectionProfile) -> Result<ConnectOutcome> {
        self.calls.connect.fetch_add(1, Ordering::SeqCst);
        *self.last_profile.lock().unwrap() = Some(profile.clone());
        self.pause().await;
        self.connect_reply.lock().unwrap().clone()
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        self.calls.list_tables.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.tables_reply.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryService for FakeBackend {
    async fn generate_sql(&self, _question: &str) -> Result<GenerateOutcome> {
        self.calls.generate.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.generate_reply.lock().unwrap().clone()
    }

    async fn execute_sql(&self, sql: &str) -> Result<ExecuteOutcome> {
        self.calls.execute.fetch_add(1, Ordering::SeqCst);
        *self.last_sql.lock().unwrap() = Some(sql.to_string());
        self.pause().await;
        self.execute_reply.lock().unwrap().clone()
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn shop_profile() -> ConnectionProfile {
    ConnectionProfile::new("localhost", 3306, "root", "x", "shop")
}

/// Rows from a JSON array of objects
pub fn rows(value: serde_json::Value) -> Vec<Row> {
    value
        .as_array()
        .expect("rows must be an array")
        .iter()
        .map(|row| row.as_object().expect("row must be an object").clone())
        .collect()
}

pub fn session_with(
    backend: &Arc<FakeBackend>,
    store: &Arc<MemoryCredentialStore>,
    timeout: Duration,
) -> Session {
    let store: Arc<dyn CredentialStore> = store.clone();
    Session::new(backend.clone(), store, timeout)
}

/// Fresh session over a fake backend and an empty in-memory store
pub fn fresh_session() -> (Session, Arc<FakeBackend>, Arc<MemoryCredentialStore>) {
    let backend = FakeBackend::new();
    let store = Arc::new(MemoryCredentialStore::new());
    let session = session_with(&backend, &store, TIMEOUT);
    (session, backend, store)
}

/// Session that has connected to the shop database
pub async fn connected_session() -> (Session, Arc<FakeBackend>, Arc<MemoryCredentialStore>) {
    let (mut session, backend, store) = fresh_session();
    session.connect(shop_profile()).await.expect("connect should succeed");
    session.drain_notices();
    (session, backend, store)
}

pub fn transport_error() -> ClientError {
    ClientError::transport("connection refused")
}
