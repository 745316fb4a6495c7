//! MySQL engine driver.
//!
//! Same contract as the Postgres driver, over sqlx's `MySqlPool`. MySQL's
//! unsigned integer types need one extra rule: a `BIGINT UNSIGNED` value
//! above `i64::MAX` cannot be a [`Value::Int`] and is rendered as text.

use crate::config::GatewayConfig;
use crate::db::{
    describe_columns_fn, detect_engine, fetch_query_result, EngineDriver, EngineKind, QueryResult,
    Row, Timestamp, Value,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, TypeInfo};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// MySQL driver backed by a small connection pool.
#[derive(Debug)]
pub struct MySqlDriver {
    pool: MySqlPool,
    query_timeout: Duration,
    max_rows: usize,
}

impl MySqlDriver {
    /// Opens a pool against the given `mysql://` connection string.
    pub async fn connect(conn_string: &str, config: &GatewayConfig) -> Result<Self> {
        debug_assert_eq!(detect_engine(conn_string).ok(), Some(EngineKind::MySql));

        debug!("opening mysql connection");
        let pool = MySqlPoolOptions::new()
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

    describe_columns_fn!();
}

#[async_trait]
impl EngineDriver for MySqlDriver {
    fn kind(&self) -> EngineKind {
        EngineKind::MySql
    }

    async fn execute(&self, sql: &str, cancel: &CancellationToken) -> Result<QueryResult> {
        fetch_query_result!(self, sql, cancel)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Converts a sqlx MySqlRow to our Row type.
fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

fn decode<'r, T>(row: &'r MySqlRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

/// Coerces one MySQL-native cell into a [`Value`]. Pure; never fails.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        // tinyint(1) surfaces as BOOLEAN
        "BOOLEAN" | "BOOL" => decode::<bool>(row, index).map(Value::Bool).unwrap_or(Value::Null),

        "TINYINT" => decode::<i8>(row, index)
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "SMALLINT" => decode::<i16>(row, index)
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "MEDIUMINT" | "INT" | "INTEGER" => decode::<i32>(row, index)
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "BIGINT" => decode::<i64>(row, index).map(Value::Int).unwrap_or(Value::Null),

        "TINYINT UNSIGNED" => decode::<u8>(row, index)
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "SMALLINT UNSIGNED" | "YEAR" => decode::<u16>(row, index)
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "MEDIUMINT UNSIGNED" | "INT UNSIGNED" | "INTEGER UNSIGNED" => decode::<u32>(row, index)
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "BIGINT UNSIGNED" => decode::<u64>(row, index)
            .map(|v| match i64::try_from(v) {
                Ok(i) => Value::Int(i),
                Err(_) => Value::Text(v.to_string()),
            })
            .unwrap_or(Value::Null),

        "FLOAT" => decode::<f32>(row, index)
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "DOUBLE" => decode::<f64>(row, index).map(Value::Float).unwrap_or(Value::Null),

        "DECIMAL" | "NUMERIC" => decode::<rust_decimal::Decimal>(row, index)
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null),

        // TIMESTAMP is stored in UTC; DATETIME carries no zone.
        "TIMESTAMP" => decode::<DateTime<Utc>>(row, index)
            .map(|v| Value::Timestamp(Timestamp::utc(v)))
            .unwrap_or(Value::Null),

        "DATETIME" => decode::<NaiveDateTime>(row, index)
            .map(|v| Value::Timestamp(Timestamp::naive(v)))
            .unwrap_or(Value::Null),

        "DATE" => decode::<NaiveDate>(row, index)
            .map(|v| Value::Timestamp(Timestamp::date(v)))
            .unwrap_or(Value::Null),

        "TIME" => decode::<NaiveTime>(row, index)
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null),

        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            decode::<Vec<u8>>(row, index).map(Value::Bytes).unwrap_or(Value::Null)
        }

        "JSON" => decode::<serde_json::Value>(row, index)
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null),

        _ => decode::<String>(row, index).map(Value::Text).unwrap_or(Value::Null),
    }
}

/// Maps sqlx connection errors into engine-attributable gateway errors.
fn map_connection_error(error: sqlx::Error) -> GatewayError {
    let msg = error.to_string();
    let lower = msg.to_lowercase();

    if lower.contains("connection refused") {
        GatewayError::connection(format!("mysql refused the connection: {msg}"))
    } else if lower.contains("access denied") {
        GatewayError::connection(format!("mysql access denied: {msg}"))
    } else if lower.contains("unknown database") {
        GatewayError::connection(msg)
    } else if lower.contains("timed out") || lower.contains("timeout") {
        GatewayError::connection(format!("mysql connection timed out: {msg}"))
    } else {
        GatewayError::connection(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Live tests run only when GATEWAY_MYSQL_URL points at a reachable server.

    async fn get_test_driver() -> Option<MySqlDriver> {
        let url = std::env::var("GATEWAY_MYSQL_URL").ok()?;
        MySqlDriver::connect(&url, &GatewayConfig::default())
            .await
            .ok()
    }

    #[tokio::test]
    async fn test_literal_coercion_round_trip() {
        let Some(driver) = get_test_driver().await else {
            eprintln!("Skipping test: GATEWAY_MYSQL_URL not set");
            return;
        };

        let result = driver
            .execute(
                "SELECT NULL AS n, CAST(1 AS SIGNED) AS i, 'x' AS t",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.column_names(), vec!["n", "i", "t"]);
        assert_eq!(result.rows[0][0], Value::Null);
        assert_eq!(result.rows[0][1], Value::Int(1));
        assert_eq!(result.rows[0][2], Value::Text("x".to_string()));

        driver.close().await;
    }

    #[tokio::test]
    async fn test_unsigned_bigint_overflow_renders_as_text() {
        let Some(driver) = get_test_driver().await else {
            eprintln!("Skipping test: GATEWAY_MYSQL_URL not set");
            return;
        };

        let result = driver
            .execute(
                "SELECT CAST(18446744073709551615 AS UNSIGNED) AS big",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            result.rows[0][0],
            Value::Text("18446744073709551615".to_string())
        );

        driver.close().await;
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let Some(driver) = get_test_driver().await else {
            eprintln!("Skipping test: GATEWAY_MYSQL_URL not set");
            return;
        };

        driver.close().await;
        driver.close().await;
    }
}
