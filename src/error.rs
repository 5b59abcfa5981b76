//! Error taxonomy shared across the query core.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for query core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors crossing the query core boundary.
///
/// Query execution failures never propagate as `Err` past the execution
/// gateway; they are folded into the result's error fields. Everything else
/// (malformed requests, cache rebuild failures) surfaces as one of these.
#[derive(Debug, Error, Clone, Serialize)]
pub enum CoreError {
    /// Malformed request: unknown permission mode, parameter mismatch, bad config
    #[error("validation error: {0}")]
    Validation(String),

    /// Write statement attempted while the process is in read-only mode
    #[error("permission denied: {0}")]
    Permission(String),

    /// Connection failure, syntax error, constraint violation from the backend
    #[error("backend error: {0}")]
    Backend(String),

    /// Execution aborted by timeout or caller cancellation
    #[error("query cancelled: {0}")]
    Cancelled(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => Self::Backend("connection pool timed out".to_string()),
            sqlx::Error::Io(io) => Self::Backend(format!("connection failed: {}", io)),
            other => Self::Backend(other.to_string()),
        }
    }
}
