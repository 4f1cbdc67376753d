//! Backscope TUI: terminal dashboard for browsing backtest results.
//!
//! Views:
//! - Login: username and password form
//! - Backtests: summaries grouped by strategy
//! - Dashboard: open backtest tabs with charts and paged tables
//! - Help: keyboard shortcuts
//!
//! Network I/O runs on a single worker thread; all state lives on the main
//! thread in [`app::AppState`].

pub mod app;
pub mod input;
pub mod persistence;
pub mod theme;
pub mod ui;
pub mod worker;
