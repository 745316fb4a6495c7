//! Gateway tuning knobs.
//!
//! All values have conservative defaults; callers that need different pool
//! sizing or timeouts construct a `GatewayConfig` and pass it to
//! `Gateway::with_config`.

use std::time::Duration;

/// Default per-session pool size.
const DEFAULT_MAX_POOL_CONNECTIONS: u32 = 5;

/// Default timeout for acquiring/establishing a connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a single statement.
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on rows returned from a single statement.
const DEFAULT_MAX_ROWS: usize = 1000;

/// Configuration for driver pools and statement execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Maximum physical connections in a session's pool. SQLite sessions
    /// ignore this and pin a single connection.
    pub max_pool_connections: u32,

    /// How long a driver waits for the engine handshake before giving up.
    pub connect_timeout: Duration,

    /// How long a single statement may run before the driver reports a
    /// timeout to the caller.
    pub query_timeout: Duration,

    /// Result sets larger than this are truncated and flagged.
    pub max_rows: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_pool_connections: DEFAULT_MAX_POOL_CONNECTIONS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl GatewayConfig {
    /// Sets the per-session pool size.
    pub fn with_max_pool_connections(mut self, n: u32) -> Self {
        self.max_pool_connections = n;
        self
    }

    /// Sets the connection handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-statement timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Sets the row cap.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }
}
