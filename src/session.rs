//! Session tracking.
//!
//! The registry is the single owner of live connections: it issues opaque
//! ids, resolves them back to sessions, and is the only component that
//! hands a driver out for closing. State is process-wide and gone on
//! restart; every previously issued id then resolves to `SessionNotFound`.

use crate::db::{EngineDriver, EngineKind, QueryResult};
use crate::error::{GatewayError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// A live binding between one issued id and one open connection.
pub struct Session {
    id: String,
    kind: EngineKind,
    driver: Box<dyn EngineDriver>,
    created_at: SystemTime,
    last_used: Mutex<SystemTime>,
    /// Serializes statements on this session: most engine handles are not
    /// safe for concurrent statements, so same-session executes queue here
    /// in submission order.
    exec_gate: tokio::sync::Mutex<()>,
}

impl Session {
    fn new(driver: Box<dyn EngineDriver>) -> Self {
        let now = SystemTime::now();
        Self {
            // 32 hex chars from OS randomness: fixed-length, unguessable,
            // opaque to callers.
            id: Uuid::new_v4().simple().to_string(),
            kind: driver.kind(),
            driver,
            created_at: now,
            last_used: Mutex::new(now),
            exec_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// The opaque session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The engine behind this session.
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// When the session was registered.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// When the session last finished a statement (creation time if never).
    pub fn last_used(&self) -> SystemTime {
        *self.last_used.lock().unwrap()
    }

    /// Runs one statement, queued behind any statement already in flight
    /// on this session.
    pub async fn execute(&self, sql: &str, cancel: &CancellationToken) -> Result<QueryResult> {
        let _gate = self.exec_gate.lock().await;
        let result = self.driver.execute(sql, cancel).await;
        *self.last_used.lock().unwrap() = SystemTime::now();
        result
    }

    /// Releases the underlying connection. Idempotent.
    pub(crate) async fn close(&self) {
        self.driver.close().await;
    }
}

// Manual impl: the boxed driver has nothing useful to print.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Process-wide map from opaque session id to open session.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Takes ownership of an open driver and issues a session id for it.
    pub fn register(&self, driver: Box<dyn EngineDriver>) -> Arc<Session> {
        let session = Arc::new(Session::new(driver));
        let previous = self
            .sessions
            .lock()
            .unwrap()
            .insert(session.id().to_string(), Arc::clone(&session));
        // Ids are never reused while a session is registered.
        debug_assert!(previous.is_none());
        debug!(id = session.id(), engine = %session.kind(), "session registered");
        session
    }

    /// Resolves a session id.
    pub fn lookup(&self, id: &str) -> Result<Arc<Session>> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::SessionNotFound(id.to_string()))
    }

    /// Removes a session, returning it so the caller can close the driver
    /// outside the registry lock.
    pub fn remove(&self, id: &str) -> Result<Arc<Session>> {
        self.sessions
            .lock()
            .unwrap()
            .remove(id)
            .ok_or_else(|| GatewayError::SessionNotFound(id.to_string()))
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// True when no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().unwrap().is_empty()
    }

    /// Drains and closes every session. Used at process teardown.
    pub async fn close_all(&self) {
        let drained: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.drain().map(|(_, s)| s).collect()
        };
        for session in drained {
            session.close().await;
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockDriver;

    fn mock() -> Box<MockDriver> {
        Box::new(MockDriver::new(EngineKind::Sqlite))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = SessionRegistry::new();
        let session = registry.register(mock());

        let found = registry.lookup(session.id()).unwrap();
        assert_eq!(found.id(), session.id());
        assert_eq!(found.kind(), EngineKind::Sqlite);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_are_fixed_length_and_unique() {
        let registry = SessionRegistry::new();
        let a = registry.register(mock());
        let b = registry.register(mock());

        assert_eq!(a.id().len(), 32);
        assert_eq!(b.id().len(), 32);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_debug_output_names_id_and_engine() {
        let registry = SessionRegistry::new();
        let session = registry.register(mock());

        let rendered = format!("{session:?}");
        assert!(rendered.contains(session.id()));
        assert!(rendered.contains("Sqlite"));
    }

    #[test]
    fn test_lookup_unknown_id_fails() {
        let registry = SessionRegistry::new();
        let err = registry.lookup("deadbeef").unwrap_err();
        assert!(matches!(err, GatewayError::SessionNotFound(_)));
    }

    #[test]
    fn test_remove_is_not_idempotent() {
        let registry = SessionRegistry::new();
        let session = registry.register(mock());
        let id = session.id().to_string();

        assert!(registry.remove(&id).is_ok());
        let err = registry.remove(&id).unwrap_err();
        assert!(matches!(err, GatewayError::SessionNotFound(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removed_id_no_longer_resolves() {
        let registry = SessionRegistry::new();
        let session = registry.register(mock());
        let id = session.id().to_string();

        registry.remove(&id).unwrap();
        assert!(registry.lookup(&id).is_err());
    }

    #[tokio::test]
    async fn test_execute_updates_last_used() {
        let registry = SessionRegistry::new();
        let session = registry.register(mock());
        let before = session.last_used();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        session
            .execute("SELECT 1", &CancellationToken::new())
            .await
            .unwrap();

        assert!(session.last_used() > before);
    }

    #[tokio::test]
    async fn test_close_all_drains_registry() {
        let registry = SessionRegistry::new();
        registry.register(mock());
        registry.register(mock());
        assert_eq!(registry.len(), 2);

        registry.close_all().await;
        assert!(registry.is_empty());
    }
}
