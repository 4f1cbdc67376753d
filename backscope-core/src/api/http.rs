//! HTTP implementation of the backtest API.
//!
//! Token-authenticated JSON endpoints under `/api/`. Responses are read as
//! text and decoded through the model's validating constructors, so a
//! payload with the wrong shape surfaces as `FetchError::Malformed`.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{AuthToken, BacktestApi, Credentials};
use crate::error::{FetchError, MalformedRecord};
use crate::model::{BacktestId, BacktestRecord, BacktestSummary};

/// Default client-side request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// Blocking HTTP client for the backtest service.
pub struct HttpApi {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("backscope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder, token: &AuthToken) -> RequestBuilder {
        builder
            .header("Authorization", format!("Token {}", token.as_str()))
            .header("Content-Type", "application/json")
    }

    /// Send a request and return the body of a 2xx response.
    fn execute(
        &self,
        builder: RequestBuilder,
        url: &str,
        id: Option<BacktestId>,
    ) -> Result<String, FetchError> {
        debug!(url, "request");
        let resp = builder.send().map_err(|e| self.transport_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let err = status_error(status, id);
            warn!(url, status = status.as_u16(), error = %err, "request failed");
            return Err(err);
        }

        resp.text().map_err(|e| self.transport_error(url, e))
    }

    fn transport_error(&self, url: &str, err: reqwest::Error) -> FetchError {
        warn!(url, error = %err, "transport error");
        if err.is_timeout() {
            FetchError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else if err.is_decode() {
            FetchError::Malformed(MalformedRecord::new(err.to_string()))
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Map a non-2xx status onto the fetch error taxonomy.
fn status_error(status: StatusCode, id: Option<BacktestId>) -> FetchError {
    match (status.as_u16(), id) {
        (404, Some(id)) => FetchError::NotFound { id },
        (code @ (401 | 403), _) => {
            FetchError::Unauthorized(format!("server rejected credentials (HTTP {code})"))
        }
        (code, _) => FetchError::Status { code },
    }
}

impl BacktestApi for HttpApi {
    fn name(&self) -> &str {
        "http"
    }

    fn login(&self, credentials: &Credentials) -> Result<AuthToken, FetchError> {
        let url = self.endpoint("login/");
        let builder = self.client.post(&url).json(credentials);
        let body = self.execute(builder, &url, None).map_err(|err| match err {
            FetchError::Status { code: 400 } => {
                FetchError::Unauthorized("invalid username or password".into())
            }
            other => other,
        })?;

        let parsed: LoginResponse = serde_json::from_str(&body).map_err(MalformedRecord::from)?;
        match parsed.token {
            Some(token) if !token.is_empty() => {
                info!(user = %credentials.username, "logged in");
                Ok(AuthToken::new(token))
            }
            _ => Err(FetchError::Unauthorized("login response carried no token".into())),
        }
    }

    fn fetch_summaries(&self, token: &AuthToken) -> Result<Vec<BacktestSummary>, FetchError> {
        let url = self.endpoint("backtest/");
        let builder = self.authorized(self.client.get(&url), token);
        let body = self.execute(builder, &url, None)?;
        let summaries = BacktestSummary::list_from_json(&body)?;
        info!(count = summaries.len(), "fetched summaries");
        Ok(summaries)
    }

    fn fetch_backtest(
        &self,
        token: &AuthToken,
        id: BacktestId,
    ) -> Result<BacktestRecord, FetchError> {
        let url = self.endpoint(&format!("backtest/{id}/"));
        let builder = self.authorized(self.client.get(&url), token);
        let body = self.execute(builder, &url, Some(id))?;
        let record = BacktestRecord::from_json(id, &body)?;
        info!(
            id = %id,
            points = record.timeseries_data.len(),
            trades = record.trades.len(),
            "fetched backtest"
        );
        Ok(record)
    }
}
