//! Database abstraction layer.
//!
//! Provides a trait-based interface over the supported engines so sessions
//! can execute SQL without knowing which engine sits behind them. Engine
//! differences (wire protocol, type taxonomy, connection string syntax)
//! stop at this boundary.

mod mock;
mod mysql;
mod postgres;
mod sqlite;
mod types;

pub use mock::{FailingDriver, MockDriver};
pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;
pub use sqlite::SqliteDriver;
pub use types::{ColumnInfo, QueryResult, Row, Timestamp, Value};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Postgres,
    MySql,
    Sqlite,
}

impl EngineKind {
    /// Returns the engine as a string for display and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses an engine from a URL scheme.
    pub fn parse(scheme: &str) -> Option<Self> {
        match scheme.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" => Some(Self::MySql),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the canonical URL scheme for this engine.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Determines the engine from a connection string's scheme prefix.
///
/// Fails with `InvalidConnectionString` when the string is empty or has no
/// scheme, and with `UnsupportedEngine` when the scheme names an engine we
/// do not drive. No network or file access happens here.
///
/// SQLite connection strings (`sqlite::memory:`, `sqlite://path`) name a
/// file rather than an authority and are not RFC-3986 URLs, so only the
/// network engines get full URL validation.
pub fn detect_engine(conn_string: &str) -> Result<EngineKind> {
    let trimmed = conn_string.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidConnectionString(
            "connection string is empty".to_string(),
        ));
    }

    let scheme = match trimmed.split_once(':') {
        Some((scheme, _)) if is_scheme(scheme) => scheme.to_ascii_lowercase(),
        _ => {
            return Err(GatewayError::InvalidConnectionString(format!(
                "no scheme prefix in {trimmed:?}"
            )));
        }
    };

    let kind = EngineKind::parse(&scheme).ok_or(GatewayError::UnsupportedEngine(scheme))?;

    if kind != EngineKind::Sqlite {
        Url::parse(trimmed)
            .map_err(|e| GatewayError::InvalidConnectionString(format!("{trimmed}: {e}")))?;
    }

    Ok(kind)
}

/// A scheme is one ASCII letter followed by letters, digits, `+`, `-`, `.`.
fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Trait defining the interface for engine drivers.
///
/// Exactly one capability set: open (via each driver's `connect`), execute,
/// close. Drivers never leak native types or native errors past this
/// boundary; results arrive as [`QueryResult`] and failures as
/// [`GatewayError`].
#[async_trait]
pub trait EngineDriver: Send + Sync {
    /// The engine this driver speaks to.
    fn kind(&self) -> EngineKind;

    /// Executes one SQL statement and returns the coerced result.
    ///
    /// `cancel` is an internal hook: drivers abandon the statement when it
    /// fires. The gateway does not yet expose cancellation to callers and
    /// passes a token that never fires.
    async fn execute(&self, sql: &str, cancel: &CancellationToken) -> Result<QueryResult>;

    /// Releases the underlying connection. Idempotent; safe on an
    /// already-closed or failed handle.
    async fn close(&self);
}

/// Opens a driver for the given connection string.
///
/// This is the central factory: engine detection happens first, so an
/// unsupported scheme fails before any connection attempt.
pub async fn connect(conn_string: &str, config: &GatewayConfig) -> Result<Box<dyn EngineDriver>> {
    let kind = detect_engine(conn_string)?;
    match kind {
        EngineKind::Postgres => {
            let driver = PostgresDriver::connect(conn_string, config).await?;
            Ok(Box::new(driver))
        }
        EngineKind::MySql => {
            let driver = MySqlDriver::connect(conn_string, config).await?;
            Ok(Box::new(driver))
        }
        EngineKind::Sqlite => {
            let driver = SqliteDriver::connect(conn_string, config).await?;
            Ok(Box::new(driver))
        }
    }
}

/// Wraps an engine-side failure, keeping the native message and error code
/// (e.g. SQLSTATE) when the engine reported one.
pub(crate) fn map_execution_error(error: sqlx::Error) -> GatewayError {
    match error.as_database_error() {
        Some(db_error) => {
            let message = db_error.message().to_string();
            match db_error.code() {
                Some(code) => GatewayError::execution_with_code(message, code.to_string()),
                None => GatewayError::execution(message),
            }
        }
        None => GatewayError::execution(error.to_string()),
    }
}

/// Generates the `describe_columns` helper a driver uses to recover the
/// true column list of a zero-row result: prepare (not execute) the
/// statement again. Best effort; statements with no result shape, or that
/// no longer prepare cleanly, yield no columns.
macro_rules! describe_columns_fn {
    () => {
        async fn describe_columns(&self, sql: &str) -> Vec<$crate::db::ColumnInfo> {
            match self.pool.describe(sql).await {
                Ok(described) => described
                    .columns()
                    .iter()
                    .map(|col| $crate::db::ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect(),
                Err(_) => Vec::new(),
            }
        }
    };
}
pub(crate) use describe_columns_fn;

/// Expands to the shared body of `EngineDriver::execute`: run one statement
/// under the driver's query timeout and the cancellation token, then
/// assemble a [`QueryResult`] through the invoking module's `convert_row`.
macro_rules! fetch_query_result {
    ($driver:expr, $sql:expr, $cancel:expr) => {{
        let start = std::time::Instant::now();

        let fetch = tokio::time::timeout(
            $driver.query_timeout,
            sqlx::query($sql).fetch_all(&$driver.pool),
        );
        let fetched = tokio::select! {
            _ = $cancel.cancelled() => {
                return Err($crate::error::GatewayError::execution("statement cancelled"));
            }
            res = fetch => res,
        };

        let result = fetched
            .map_err(|_| {
                $crate::error::GatewayError::execution(format!(
                    "statement timed out after {}s",
                    $driver.query_timeout.as_secs()
                ))
            })?
            .map_err($crate::db::map_execution_error)?;

        let execution_time = start.elapsed();

        let columns: Vec<$crate::db::ColumnInfo> = if let Some(first_row) = result.first() {
            first_row
                .columns()
                .iter()
                .map(|col| $crate::db::ColumnInfo::new(col.name(), col.type_info().name()))
                .collect()
        } else {
            $driver.describe_columns($sql).await
        };

        let total_rows = result.len();
        let truncated = total_rows > $driver.max_rows;
        if truncated {
            tracing::warn!(
                "statement returned {} rows, truncating to {}",
                total_rows,
                $driver.max_rows
            );
        }

        let rows: Vec<$crate::db::Row> = result
            .iter()
            .take($driver.max_rows)
            .map(convert_row)
            .collect();

        Ok($crate::db::QueryResult {
            columns,
            rows,
            execution_time,
            truncated,
        })
    }};
}
pub(crate) use fetch_query_result;
