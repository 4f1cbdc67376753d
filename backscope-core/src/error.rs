//! Structured error types for fetches, payload validation and configuration.
//!
//! These are designed to be displayable in both CLI and TUI contexts, and
//! `FetchError` is `Clone` so a failure can be stored per tab and sent across
//! the worker channel.

use thiserror::Error;

use crate::model::BacktestId;

/// A payload that decoded but does not have the shape the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed record: {0}")]
pub struct MalformedRecord(pub String);

impl MalformedRecord {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<serde_json::Error> for MalformedRecord {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// Failures at the remote API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("backtest {id} not found")]
    NotFound { id: BacktestId },

    #[error("authentication required: {0}")]
    Unauthorized(String),

    #[error("server responded with HTTP {code}")]
    Status { code: u16 },

    #[error(transparent)]
    Malformed(#[from] MalformedRecord),
}

impl FetchError {
    /// Short category label for the error history overlay.
    pub fn category(&self) -> &'static str {
        match self {
            FetchError::Network(_) | FetchError::Timeout { .. } => "NET",
            FetchError::NotFound { .. } | FetchError::Status { .. } => "HTTP",
            FetchError::Unauthorized(_) => "AUTH",
            FetchError::Malformed(_) => "DATA",
        }
    }
}

/// Configuration load failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
