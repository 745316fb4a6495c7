//! Error types for the gateway.
//!
//! Defines the single structured error returned across the command boundary.

use thiserror::Error;

/// Main error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The connection string could not be parsed at all.
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The connection string parsed but names an engine we do not drive.
    #[error("Unsupported database engine: {0}")]
    UnsupportedEngine(String),

    /// Connection errors (host unreachable, auth failed, engine refusal, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The session id is not registered (never issued, or already disconnected).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A session already has an in-flight statement.
    ///
    /// The gateway itself queues same-session executes and never emits this;
    /// it exists for callers that layer a reject-while-busy policy on top.
    #[error("Session busy: {0}")]
    SessionBusy(String),

    /// Statement execution errors (malformed SQL, constraint violations,
    /// engine-side failures). `code` carries the engine-native error code
    /// (e.g. SQLSTATE) when the engine reported one.
    #[error("Execution error: {message}")]
    Execution {
        message: String,
        code: Option<String>,
    },

    /// Internal errors (driver or coercion bugs, unexpected states).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an execution error without an engine-native code.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution {
            message: msg.into(),
            code: None,
        }
    }

    /// Creates an execution error carrying an engine-native code.
    pub fn execution_with_code(msg: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Execution {
            message: msg.into(),
            code: Some(code.into()),
        }
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidConnectionString(_) => "Invalid Connection String",
            Self::UnsupportedEngine(_) => "Unsupported Engine",
            Self::Connection(_) => "Connection Error",
            Self::SessionNotFound(_) => "Session Not Found",
            Self::SessionBusy(_) => "Session Busy",
            Self::Execution { .. } => "Execution Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the engine-native error code, if the engine reported one.
    pub fn engine_code(&self) -> Option<&str> {
        match self {
            Self::Execution { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection() {
        let err = GatewayError::connection("Cannot connect to localhost:5432");
        assert_eq!(
            err.to_string(),
            "Connection error: Cannot connect to localhost:5432"
        );
        assert_eq!(err.category(), "Connection Error");
    }

    #[test]
    fn test_error_display_execution() {
        let err = GatewayError::execution("syntax error at or near \"SELEC\"");
        assert_eq!(
            err.to_string(),
            "Execution error: syntax error at or near \"SELEC\""
        );
        assert_eq!(err.category(), "Execution Error");
        assert_eq!(err.engine_code(), None);
    }

    #[test]
    fn test_execution_error_carries_engine_code() {
        let err = GatewayError::execution_with_code("duplicate key value", "23505");
        assert_eq!(err.engine_code(), Some("23505"));
        assert_eq!(err.to_string(), "Execution error: duplicate key value");
    }

    #[test]
    fn test_error_display_session_not_found() {
        let err = GatewayError::SessionNotFound("abc123".to_string());
        assert_eq!(err.to_string(), "Session not found: abc123");
        assert_eq!(err.category(), "Session Not Found");
    }

    #[test]
    fn test_error_display_unsupported_engine() {
        let err = GatewayError::UnsupportedEngine("mongodb".to_string());
        assert_eq!(err.to_string(), "Unsupported database engine: mongodb");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GatewayError>();
    }
}
