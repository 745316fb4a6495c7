//! The gateway façade.
//!
//! This is the surface a UI (or any client) calls: `connect` turns a
//! connection string into an opaque session id, `execute` runs SQL against
//! a session, `disconnect` tears it down. The gateway holds no state of its
//! own beyond the registry; cross-session calls never share a lock.

use crate::config::GatewayConfig;
use crate::db::{self, QueryResult};
use crate::error::{GatewayError, Result};
use crate::session::SessionRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Multi-engine SQL session gateway.
pub struct Gateway {
    registry: SessionRegistry,
    config: GatewayConfig,
}

impl Gateway {
    /// Creates a gateway with default configuration.
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    /// Creates a gateway with the given configuration.
    pub fn with_config(config: GatewayConfig) -> Self {
        Self {
            registry: SessionRegistry::new(),
            config,
        }
    }

    /// The session registry. Exposed so embedders and tests can register
    /// drivers directly or inspect live-session counts.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Opens a connection and returns the opaque session id for it.
    ///
    /// The engine is derived from the connection string's scheme prefix;
    /// an unrecognized scheme fails with `UnsupportedEngine` before any
    /// network or file access. A failed open registers nothing.
    pub async fn connect(&self, conn_string: &str) -> Result<String> {
        let driver = db::connect(conn_string, &self.config).await?;
        let session = self.registry.register(driver);
        info!(
            id = session.id(),
            engine = %session.kind(),
            "connected"
        );
        Ok(session.id().to_string())
    }

    /// Executes one SQL statement against the given session.
    ///
    /// Whitespace-only SQL is rejected without contacting the engine.
    /// Statements on the same session queue in submission order; statements
    /// on different sessions run independently. Multi-statement text is
    /// handed to the engine unchanged and behaves however that engine's
    /// prepared-statement path behaves.
    pub async fn execute(&self, session_id: &str, sql: &str) -> Result<QueryResult> {
        if sql.trim().is_empty() {
            return Err(GatewayError::execution("empty query"));
        }

        let session = self.registry.lookup(session_id)?;
        debug!(id = session_id, "executing statement");

        // Internal cancellation hook; not yet wired to the caller surface.
        let cancel = CancellationToken::new();
        session.execute(sql, &cancel).await
    }

    /// Closes a session and releases its connection.
    ///
    /// A second disconnect for the same id fails with `SessionNotFound`;
    /// the underlying close is idempotent either way.
    pub async fn disconnect(&self, session_id: &str) -> Result<()> {
        // Remove under the lock, close after the guard is gone.
        let session = self.registry.remove(session_id)?;
        session.close().await;
        info!(id = session_id, "disconnected");
        Ok(())
    }

    /// Closes every remaining session. Call at process teardown.
    pub async fn shutdown(&self) {
        self.registry.close_all().await;
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{EngineKind, FailingDriver, MockDriver};

    #[tokio::test]
    async fn test_empty_sql_is_rejected_before_lookup() {
        let gateway = Gateway::new();
        // Even a nonexistent session gets the empty-query error: the check
        // runs before the registry is consulted.
        let err = gateway.execute("no-such-session", "   \n\t").await.unwrap_err();
        assert!(matches!(err, GatewayError::Execution { ref message, .. } if message == "empty query"));
    }

    #[tokio::test]
    async fn test_empty_sql_never_reaches_the_driver() {
        let gateway = Gateway::new();
        let driver = MockDriver::new(EngineKind::Sqlite);
        let log = driver.log();
        let session = gateway.registry().register(Box::new(driver));
        let id = session.id().to_string();

        let err = gateway.execute(&id, "").await.unwrap_err();
        assert!(matches!(err, GatewayError::Execution { .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_execute_unknown_session_fails() {
        let gateway = Gateway::new();
        let err = gateway.execute("deadbeef", "SELECT 1").await.unwrap_err();
        assert!(matches!(err, GatewayError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_disconnect_unknown_session_fails() {
        let gateway = Gateway::new();
        let err = gateway.disconnect("deadbeef").await.unwrap_err();
        assert!(matches!(err, GatewayError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_fails_fast() {
        let gateway = Gateway::new();
        let err = gateway.connect("mongodb://localhost/db").await.unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedEngine(_)));
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_connection_string_fails_fast() {
        let gateway = Gateway::new();
        let err = gateway.connect("not a url at all").await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidConnectionString(_)));
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn test_driver_failure_is_execution_error() {
        let gateway = Gateway::new();
        let session = gateway
            .registry()
            .register(Box::new(FailingDriver::new(EngineKind::Postgres)));
        let id = session.id().to_string();

        let err = gateway.execute(&id, "SELECT 1").await.unwrap_err();
        assert_eq!(err.engine_code(), Some("MOCK1"));
    }

    #[tokio::test]
    async fn test_shutdown_closes_all_sessions() {
        let gateway = Gateway::new();
        gateway
            .registry()
            .register(Box::new(MockDriver::new(EngineKind::Sqlite)));
        gateway
            .registry()
            .register(Box::new(MockDriver::new(EngineKind::MySql)));

        gateway.shutdown().await;
        assert!(gateway.registry().is_empty());
    }
}
