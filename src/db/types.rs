//! Engine-agnostic result types.
//!
//! Every driver funnels its native rows into these structures; nothing
//! downstream of the driver boundary sees a native type again.

use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Represents the result of executing a SQL statement.
///
/// Invariant: every row holds exactly `columns.len()` values, aligned
/// positionally. A statement with no result shape (DDL, DML) has zero
/// columns and zero rows; a zero-row SELECT keeps its true column list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column metadata, in the engine's column order. Duplicate names
    /// (e.g. from a join) are preserved as-is; disambiguation is a
    /// renderer concern.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data.
    pub rows: Vec<Row>,

    /// Time taken to execute the statement.
    #[serde(with = "duration_serde")]
    pub execution_time: Duration,

    /// Whether rows were dropped because the result exceeded the row cap.
    #[serde(default)]
    pub truncated: bool,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query result with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
            truncated: false,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Returns true if the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Renders the rows as ordered JSON maps keyed by column name, the
    /// shape a row grid consumes directly.
    ///
    /// When two columns share a name the later one wins within a map;
    /// the structured `columns`/`rows` pair remains the lossless contract.
    pub fn into_row_maps(self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .into_iter()
            .map(|row| {
                let mut map = serde_json::Map::new();
                for (col, value) in self.columns.iter().zip(row) {
                    map.insert(col.name.clone(), value.into_json());
                }
                map
            })
            .collect()
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Engine-native type name, kept for display attribution only.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and native type name.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// The engine-agnostic tagged representation of one cell.
///
/// Produced only by the drivers' coercion functions; immutable afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Value {
    /// NULL in any engine's representation.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Fixed-width whole number (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text. Also the home of values that cannot be represented
    /// losslessly otherwise (NUMERIC/DECIMAL, exotic engine types).
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Normalized temporal value.
    Timestamp(Timestamp),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value for display.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
            Value::Timestamp(t) => t.to_string(),
        }
    }

    /// Converts the value into its JSON wire representation.
    ///
    /// Bytes are base64-encoded; timestamps and non-finite floats are
    /// rendered as strings.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(f) => match serde_json::Number::from_f64(f) {
                Some(n) => serde_json::Value::Number(n),
                None => serde_json::Value::String(f.to_string()),
            },
            Value::Text(s) => serde_json::Value::String(s),
            Value::Bytes(b) => {
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            Value::Timestamp(t) => serde_json::Value::String(t.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

// Conversion implementations for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// A normalized temporal value: civil date-time plus an explicit
/// UTC-offset-or-none flag, independent of the engine's calendar model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Timestamp {
    /// Civil date-time as observed in `offset_seconds` (or engine-local
    /// time when no offset is known).
    pub datetime: NaiveDateTime,

    /// UTC offset in seconds, when the native type carries one.
    pub offset_seconds: Option<i32>,
}

impl Timestamp {
    /// A timestamp with no timezone information.
    pub fn naive(datetime: NaiveDateTime) -> Self {
        Self {
            datetime,
            offset_seconds: None,
        }
    }

    /// A timestamp pinned to UTC.
    pub fn utc(datetime: DateTime<Utc>) -> Self {
        Self {
            datetime: datetime.naive_utc(),
            offset_seconds: Some(0),
        }
    }

    /// A timestamp carrying an explicit offset.
    pub fn with_offset(datetime: DateTime<FixedOffset>) -> Self {
        Self {
            datetime: datetime.naive_local(),
            offset_seconds: Some(datetime.offset().local_minus_utc()),
        }
    }

    /// A date with no time component, normalized to midnight.
    pub fn date(date: NaiveDate) -> Self {
        Self {
            datetime: date.and_hms_opt(0, 0, 0).unwrap_or_default(),
            offset_seconds: None,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.datetime.format("%Y-%m-%d %H:%M:%S%.f"))?;
        if let Some(offset) = self.offset_seconds {
            let sign = if offset < 0 { '-' } else { '+' };
            let abs = offset.unsigned_abs();
            write!(f, "{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)?;
        }
        Ok(())
    }
}

/// Serde support for Duration (not natively supported by serde).
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_nanos().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u128::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_display_string(), "NULL");
        assert_eq!(Value::Bool(true).to_display_string(), "true");
        assert_eq!(Value::Int(42).to_display_string(), "42");
        assert_eq!(Value::Float(2.71).to_display_string(), "2.71");
        assert_eq!(Value::Text("hello".to_string()).to_display_string(), "hello");
        assert_eq!(Value::Bytes(vec![1, 2, 3]).to_display_string(), "<3 bytes>");
    }

    #[test]
    fn test_value_is_null() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(false).is_null());
        assert!(!Value::Int(0).is_null());
    }

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(2.71f64), Value::Float(2.71));
        assert_eq!(Value::from("hello"), Value::Text("hello".to_string()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(42i32)), Value::Int(42));
    }

    #[test]
    fn test_timestamp_display_naive() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 45)
            .unwrap();
        assert_eq!(Timestamp::naive(dt).to_string(), "2024-03-01 12:30:45");
    }

    #[test]
    fn test_timestamp_display_with_offset() {
        let dt = FixedOffset::east_opt(5 * 3600 + 1800)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 12, 30, 45)
            .unwrap();
        let ts = Timestamp::with_offset(dt);
        assert_eq!(ts.offset_seconds, Some(19800));
        assert_eq!(ts.to_string(), "2024-03-01 12:30:45+05:30");
    }

    #[test]
    fn test_timestamp_utc_has_zero_offset() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let ts = Timestamp::utc(dt);
        assert_eq!(ts.offset_seconds, Some(0));
        assert_eq!(ts.to_string(), "2024-03-01 00:00:00+00:00");
    }

    #[test]
    fn test_timestamp_date_is_midnight() {
        let ts = Timestamp::date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(ts.to_string(), "2024-03-01 00:00:00");
        assert_eq!(ts.offset_seconds, None);
    }

    #[test]
    fn test_value_into_json() {
        assert_eq!(Value::Null.into_json(), serde_json::Value::Null);
        assert_eq!(Value::Int(7).into_json(), serde_json::json!(7));
        assert_eq!(Value::Bool(true).into_json(), serde_json::json!(true));
        assert_eq!(Value::Text("x".into()).into_json(), serde_json::json!("x"));
        assert_eq!(
            Value::Bytes(vec![1, 2, 3]).into_json(),
            serde_json::json!("AQID")
        );
        // Non-finite floats cannot be JSON numbers
        assert_eq!(
            Value::Float(f64::NAN).into_json(),
            serde_json::json!("NaN")
        );
    }

    #[test]
    fn test_query_result_with_data() {
        let columns = vec![
            ColumnInfo::new("id", "INTEGER"),
            ColumnInfo::new("name", "TEXT"),
        ];
        let rows = vec![
            vec![Value::Int(1), Value::Text("Alice".to_string())],
            vec![Value::Int(2), Value::Null],
        ];

        let result = QueryResult::with_data(columns, rows);

        assert!(!result.is_empty());
        assert_eq!(result.column_names(), vec!["id", "name"]);
        assert_eq!(result.rows.len(), 2);
        assert!(!result.truncated);
    }

    #[test]
    fn test_empty_result_may_have_zero_columns() {
        let result = QueryResult::new();
        assert!(result.is_empty());
        assert!(result.columns.is_empty());
    }

    #[test]
    fn test_into_row_maps() {
        let result = QueryResult::with_data(
            vec![
                ColumnInfo::new("a", "INTEGER"),
                ColumnInfo::new("b", "TEXT"),
            ],
            vec![vec![Value::Int(1), Value::Text("x".to_string())]],
        );

        let maps = result.into_row_maps();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].get("a"), Some(&serde_json::json!(1)));
        assert_eq!(maps[0].get("b"), Some(&serde_json::json!("x")));
    }

    #[test]
    fn test_duplicate_columns_preserved_in_result() {
        let result = QueryResult::with_data(
            vec![
                ColumnInfo::new("a", "INTEGER"),
                ColumnInfo::new("a", "TEXT"),
            ],
            vec![vec![Value::Int(1), Value::Text("x".to_string())]],
        );
        assert_eq!(result.column_names(), vec!["a", "a"]);

        // The map view collapses duplicates; last one wins.
        let maps = result.into_row_maps();
        assert_eq!(maps[0].len(), 1);
        assert_eq!(maps[0].get("a"), Some(&serde_json::json!("x")));
    }
}
