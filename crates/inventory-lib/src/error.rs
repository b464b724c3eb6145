//! Error types shared by the backend boundary and the query engine

use std::time::Duration;
use thiserror::Error;

/// Failure of a single call to an external backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend unreachable: {0}")]
    Unavailable(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("backend returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("malformed backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether the whole backend is gone rather than one call failing
    pub fn is_fatal_for_fetcher(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Timeout(_) => "timeout",
            BackendError::Unavailable(_) => "unavailable",
            BackendError::Throttled(_) => "throttled",
            BackendError::NotFound(_) => "not_found",
            BackendError::Status { .. } => "status",
            BackendError::Decode(_) => "decode",
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(Duration::ZERO)
        } else if err.is_connect() {
            BackendError::Unavailable(err.to_string())
        } else if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            BackendError::Status {
                code: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            BackendError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

/// Contract violation detected while filtering a table
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("row {resource_id} has no value for column {column}")]
    MissingColumn {
        column: &'static str,
        resource_id: String,
    },
}
