//! Backscope core: typed backtest results, the per-session record cache, the
//! chart data pipeline and pagination.
//!
//! This crate never touches the terminal. It contains:
//! - Domain types decoded and validated at the API boundary
//! - The sans-IO session cache (tabs, dedup of in-flight fetches, reselection)
//! - The grouped summary index behind the Filter view
//! - Pure chart transforms (series, ticker groups, signal markers, legends)
//! - A generic page cursor shared by every table
//! - The `BacktestApi` trait and its blocking HTTP implementation
//! - TOML configuration with environment overrides

pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod model;
pub mod pagination;
pub mod session;
pub mod summary;

pub use error::{ConfigError, FetchError, MalformedRecord};
pub use model::{BacktestId, BacktestRecord, BacktestSummary};

#[cfg(test)]
mod tests {
    use super::*;

    /// Everything that crosses the worker channel must be Send, and the
    /// API handle is shared behind an `Arc`.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<model::BacktestRecord>();
        require_sync::<model::BacktestRecord>();
        require_send::<model::BacktestSummary>();
        require_send::<error::FetchError>();
        require_sync::<error::FetchError>();
        require_send::<session::FetchTicket>();
        require_send::<summary::SummaryTicket>();
        require_send::<api::AuthToken>();
        require_send::<api::Credentials>();
        require_send::<session::Session>();
        require_send::<api::HttpApi>();
        require_sync::<api::HttpApi>();
    }

    #[test]
    fn domain_types_are_send_sync() {
        assert_send_sync();
    }
}
