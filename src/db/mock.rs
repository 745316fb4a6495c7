//! Mock engine drivers for testing.
//!
//! `MockDriver` answers every statement from a canned script, optionally
//! after an injected delay, and records what it ran; `FailingDriver`
//! refuses everything. Neither touches the network.

use super::{ColumnInfo, EngineDriver, EngineKind, QueryResult, Value};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A mock driver that returns predefined results.
pub struct MockDriver {
    kind: EngineKind,
    delay: Duration,
    invocations: AtomicUsize,
    log: Arc<Mutex<Vec<String>>>,
    closed: AtomicUsize,
}

impl MockDriver {
    /// Creates a mock driver posing as the given engine.
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            delay: Duration::ZERO,
            invocations: AtomicUsize::new(0),
            log: Arc::new(Mutex::new(Vec::new())),
            closed: AtomicUsize::new(0),
        }
    }

    /// Injects an artificial latency into every execute.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shares the execution log: `start:<sql>` / `end:<sql>` markers in the
    /// order the driver observed them.
    pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }

    /// Number of statements this driver has been asked to run.
    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Number of times close was called.
    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineDriver for MockDriver {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn execute(&self, sql: &str, _cancel: &CancellationToken) -> Result<QueryResult> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(format!("start:{sql}"));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.log.lock().unwrap().push(format!("end:{sql}"));

        if sql.trim().to_uppercase().starts_with("SELECT") {
            Ok(QueryResult::with_data(
                vec![ColumnInfo::new("result", "TEXT")],
                vec![vec![Value::Text(format!("mock result for: {sql}"))]],
            ))
        } else {
            Ok(QueryResult::new())
        }
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A mock driver whose every execute fails with an engine-style error.
pub struct FailingDriver {
    kind: EngineKind,
}

impl FailingDriver {
    pub fn new(kind: EngineKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl EngineDriver for FailingDriver {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn execute(&self, _sql: &str, _cancel: &CancellationToken) -> Result<QueryResult> {
        Err(GatewayError::execution_with_code(
            "mock execution failure",
            "MOCK1",
        ))
    }

    async fn close(&self) {}
}
