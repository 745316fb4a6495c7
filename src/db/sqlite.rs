//! SQLite engine driver.
//!
//! SQLite is dynamically typed: column type names come from declarations,
//! and any cell may hold any storage class. Coercion dispatches on the
//! declared name when one exists; literal and expression columns have no
//! declaration (sqlx reports their type as `NULL`), so those dispatch on
//! the storage class of the value itself.
//!
//! The pool is pinned to a single connection. An in-memory database lives
//! and dies with its connection, so a wider pool would hand each statement
//! a different, empty database; idle and lifetime reaping are disabled for
//! the same reason.

use crate::config::GatewayConfig;
use crate::db::{
    describe_columns_fn, detect_engine, fetch_query_result, EngineDriver, EngineKind, QueryResult,
    Row, Timestamp, Value,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, TypeInfo, ValueRef as SqlxValueRef};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// SQLite driver over a single pooled connection.
#[derive(Debug)]
pub struct SqliteDriver {
    pool: SqlitePool,
    query_timeout: Duration,
    max_rows: usize,
}

impl SqliteDriver {
    /// Opens the database named by the given `sqlite://` connection string.
    pub async fn connect(conn_string: &str, config: &GatewayConfig) -> Result<Self> {
        debug_assert_eq!(detect_engine(conn_string).ok(), Some(EngineKind::Sqlite));

        debug!("opening sqlite database");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
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

    describe_columns_fn!();
}

#[async_trait]
impl EngineDriver for SqliteDriver {
    fn kind(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    async fn execute(&self, sql: &str, cancel: &CancellationToken) -> Result<QueryResult> {
        fetch_query_result!(self, sql, cancel)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Converts a sqlx SqliteRow to our Row type.
///
/// A column with no declaration (a literal or an expression) is reported
/// by sqlx with type name `NULL` whatever it holds, so those columns are
/// dispatched on the storage class of the value instead. An actual NULL
/// value keeps the `NULL` name and lands on the Null arm either way.
fn convert_row(row: &SqliteRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let declared = col.type_info().name();
            let type_name = if declared.eq_ignore_ascii_case("NULL") {
                match row.try_get_raw(i) {
                    Ok(value) => value.type_info().name().to_string(),
                    Err(_) => declared.to_string(),
                }
            } else {
                declared.to_string()
            };
            convert_value(row, i, &type_name)
        })
        .collect()
}

fn decode<'r, T>(row: &'r SqliteRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

/// Coerces one SQLite cell into a [`Value`]. Pure; never fails.
fn convert_value(row: &SqliteRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "NULL" => Value::Null,

        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" => {
            decode::<i64>(row, index).map(Value::Int).unwrap_or(Value::Null)
        }

        "REAL" | "FLOAT" | "DOUBLE" => {
            decode::<f64>(row, index).map(Value::Float).unwrap_or(Value::Null)
        }

        "BOOLEAN" | "BOOL" => decode::<bool>(row, index).map(Value::Bool).unwrap_or(Value::Null),

        // NUMERIC affinity stores whatever fits; try storage classes in turn.
        "NUMERIC" | "DECIMAL" => decode::<i64>(row, index)
            .map(Value::Int)
            .or_else(|| decode::<f64>(row, index).map(Value::Float))
            .or_else(|| decode::<String>(row, index).map(Value::Text))
            .unwrap_or(Value::Null),

        "DATETIME" | "TIMESTAMP" => decode::<NaiveDateTime>(row, index)
            .map(|v| Value::Timestamp(Timestamp::naive(v)))
            .or_else(|| decode::<String>(row, index).map(Value::Text))
            .unwrap_or(Value::Null),

        "DATE" => decode::<NaiveDate>(row, index)
            .map(|v| Value::Timestamp(Timestamp::date(v)))
            .or_else(|| decode::<String>(row, index).map(Value::Text))
            .unwrap_or(Value::Null),

        "BLOB" => decode::<Vec<u8>>(row, index).map(Value::Bytes).unwrap_or(Value::Null),

        _ => decode::<String>(row, index).map(Value::Text).unwrap_or(Value::Null),
    }
}

/// Maps sqlx connection errors into engine-attributable gateway errors.
fn map_connection_error(error: sqlx::Error) -> GatewayError {
    let msg = error.to_string();
    let lower = msg.to_lowercase();

    if lower.contains("unable to open") || lower.contains("no such file") {
        GatewayError::connection(format!("sqlite could not open the database file: {msg}"))
    } else if lower.contains("timed out") || lower.contains("timeout") {
        GatewayError::connection(format!("sqlite open timed out: {msg}"))
    } else {
        GatewayError::connection(msg)
    }
}
