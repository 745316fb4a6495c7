//! PostgreSQL engine driver.
//!
//! Implements the `EngineDriver` trait over sqlx's `PgPool` and owns the
//! Postgres-native-type to [`Value`] coercion.

use crate::config::GatewayConfig;
use crate::db::{
    describe_columns_fn, detect_engine, fetch_query_result, EngineDriver, EngineKind, QueryResult,
    Row, Timestamp, Value,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, TypeInfo};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// PostgreSQL driver backed by a small connection pool.
#[derive(Debug)]
pub struct PostgresDriver {
    pool: PgPool,
    query_timeout: Duration,
    max_rows: usize,
}

impl PostgresDriver {
    /// Opens a pool against the given `postgres://` connection string.
    pub async fn connect(conn_string: &str, config: &GatewayConfig) -> Result<Self> {
        // Scheme mismatch here is a dispatcher bug, not a caller error.
        debug_assert_eq!(detect_engine(conn_string).ok(), Some(EngineKind::Postgres));

        debug!("opening postgres connection");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_pool_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(conn_string)
            .await
            .map_err(map_connection_error)?;

        Ok(Self {
            pool,
            query_timeout: config.query_timeout,
            max_rows: config.max_rows,
        })
    }

    /// Creates a driver from an existing pool. Primarily useful for testing.
    #[allow(dead_code)]
    pub fn from_pool(pool: PgPool, config: &GatewayConfig) -> Self {
        Self {
            pool,
            query_timeout: config.query_timeout,
            max_rows: config.max_rows,
        }
    }

    describe_columns_fn!();
}

#[async_trait]
impl EngineDriver for PostgresDriver {
    fn kind(&self) -> EngineKind {
        EngineKind::Postgres
    }

    async fn execute(&self, sql: &str, cancel: &CancellationToken) -> Result<QueryResult> {
        fetch_query_result!(self, sql, cancel)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

fn decode<'r, T>(row: &'r PgRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

/// Coerces one Postgres-native cell into a [`Value`].
///
/// Pure with respect to the row: no I/O, no session state. NULL in any
/// native type becomes `Value::Null`; unrecognized types fall back to the
/// engine's text rendering, or Null if the value cannot be handed over as
/// text, never an error.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index).map(Value::Bool).unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => decode::<i16>(row, index)
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => decode::<i32>(row, index)
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => decode::<i64>(row, index).map(Value::Int).unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => decode::<f32>(row, index)
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => {
            decode::<f64>(row, index).map(Value::Float).unwrap_or(Value::Null)
        }

        // Arbitrary precision: render as text rather than lose digits in f64.
        "NUMERIC" | "DECIMAL" => decode::<rust_decimal::Decimal>(row, index)
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMPTZ" => decode::<DateTime<FixedOffset>>(row, index)
            .map(|v| Value::Timestamp(Timestamp::with_offset(v)))
            .unwrap_or(Value::Null),

        "TIMESTAMP" => decode::<NaiveDateTime>(row, index)
            .map(|v| Value::Timestamp(Timestamp::naive(v)))
            .unwrap_or(Value::Null),

        "DATE" => decode::<NaiveDate>(row, index)
            .map(|v| Value::Timestamp(Timestamp::date(v)))
            .unwrap_or(Value::Null),

        // Time-of-day carries no instant; render as text.
        "TIME" => decode::<NaiveTime>(row, index)
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null),

        "BYTEA" => decode::<Vec<u8>>(row, index).map(Value::Bytes).unwrap_or(Value::Null),

        "UUID" => decode::<uuid::Uuid>(row, index)
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null),

        "JSON" | "JSONB" => decode::<serde_json::Value>(row, index)
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null),

        // Everything else: the engine's string rendering, or Null.
        _ => decode::<String>(row, index).map(Value::Text).unwrap_or(Value::Null),
    }
}

/// Maps sqlx connection errors into engine-attributable gateway errors.
fn map_connection_error(error: sqlx::Error) -> GatewayError {
    let msg = error.to_string();
    let lower = msg.to_lowercase();

    if lower.contains("connection refused") || lower.contains("could not connect") {
        GatewayError::connection(format!("postgres refused the connection: {msg}"))
    } else if lower.contains("password authentication failed")
        || lower.contains("authentication failed")
    {
        GatewayError::connection(format!("postgres authentication failed: {msg}"))
    } else if lower.contains("does not exist") && lower.contains("database") {
        GatewayError::connection(msg)
    } else if lower.contains("ssl") || lower.contains("tls") {
        GatewayError::connection(format!(
            "{msg} (the server may require '?sslmode=require' in the connection string)"
        ))
    } else if lower.contains("timed out") || lower.contains("timeout") {
        GatewayError::connection(format!("postgres connection timed out: {msg}"))
    } else {
        GatewayError::connection(msg)
    }
}
