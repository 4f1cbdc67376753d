//! Remote backtest API boundary.
//!
//! The `BacktestApi` trait abstracts over the HTTP service so the session
//! cache and the worker can be driven by a mock in tests.

mod http;

pub use http::{HttpApi, DEFAULT_TIMEOUT};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::model::{BacktestId, BacktestRecord, BacktestSummary};

/// Login form contents.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Opaque session token issued by the login endpoint.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Backtest service operations.
///
/// Implementations perform blocking I/O and are called from the worker
/// thread or the CLI, never from the UI thread.
pub trait BacktestApi: Send + Sync {
    /// Human-readable name of this backend.
    fn name(&self) -> &str;

    fn login(&self, credentials: &Credentials) -> Result<AuthToken, FetchError>;

    fn fetch_summaries(&self, token: &AuthToken) -> Result<Vec<BacktestSummary>, FetchError>;

    fn fetch_backtest(&self, token: &AuthToken, id: BacktestId)
        -> Result<BacktestRecord, FetchError>;
}
