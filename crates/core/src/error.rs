//! Unified error types for upcache.
//!
//! Every variant renders as `CODE: detail` so callers can match on the prefix.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the upstream cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., bad header names).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Target URL is not a well-formed http(s) URL. Never cached.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Transport-level failure talking to the upstream.
    #[error("UPSTREAM_UNREACHABLE: {0}")]
    UpstreamUnreachable(String),

    /// Upstream answered with a status the cache cannot serve.
    #[error("UPSTREAM_STATUS: upstream request failed ({status})")]
    UpstreamStatus { status: u16, body: String },

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored value could not be encoded or decoded.
    #[error("STORE_ERROR: {0}")]
    Storage(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message, data) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone(), None),
            Error::InvalidUrl(msg) => (-32003, msg.clone(), None),
            Error::UpstreamUnreachable(msg) => (-32006, msg.clone(), None),
            Error::UpstreamStatus { status, body } => (
                -32008,
                err.to_string(),
                Some(serde_json::json!({ "status": status, "body": body })),
            ),
            Error::Database(e) => (-32002, e.to_string(), None),
            Error::MigrationFailed(msg) => (-32002, msg.clone(), None),
            Error::Storage(msg) => (-32002, msg.clone(), None),
        };

        McpError { code: ErrorCode(code), message: message.into(), data }
    }
}
