//! db-gateway - a multi-engine SQL session gateway.
//!
//! Accepts connection strings for Postgres, MySQL and SQLite, tracks live
//! sessions behind opaque ids, and executes SQL returning one uniform
//! tabular result regardless of the source engine.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod session;

pub use config::GatewayConfig;
pub use db::{ColumnInfo, EngineKind, QueryResult, Row, Timestamp, Value};
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use session::{Session, SessionRegistry};
