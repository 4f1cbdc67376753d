//! Application state. Single-owner, main-thread only.
//!
//! All TUI state lives here, including the [`Session`]. The worker thread
//! communicates via channels; every response is applied through
//! [`AppState::handle_response`], which routes it into the session cache's
//! transition functions.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use backscope_core::api::{AuthToken, Credentials};
use backscope_core::chart::{flatten_signals, overview_pairs, DashboardCharts, OverviewPair};
use backscope_core::model::{BacktestId, BacktestRecord, BacktestSummary};
use backscope_core::pagination::Paginator;
use backscope_core::session::{
    CacheEntry, Completion, ReselectPolicy, SelectOutcome, Session,
};
use backscope_core::summary::{SummaryCompletion, SummaryOutcome};
use backscope_core::FetchError;

use crate::worker::{WorkerCommand, WorkerResponse};

const ERROR_HISTORY_CAP: usize = 50;

/// Which view is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum View {
    Login,
    Filter,
    Dashboard,
    Help,
}

impl View {
    /// Views reachable by number and Tab, in order.
    pub const CYCLE: [View; 3] = [View::Filter, View::Dashboard, View::Help];

    pub fn label(self) -> &'static str {
        match self {
            View::Login => "Login",
            View::Filter => "Backtests",
            View::Dashboard => "Dashboard",
            View::Help => "Help",
        }
    }

    /// Hotkey number, if the view has one.
    pub fn number(self) -> Option<usize> {
        Self::CYCLE.iter().position(|&v| v == self).map(|i| i + 1)
    }

    pub fn from_number(n: usize) -> Option<Self> {
        n.checked_sub(1).and_then(|i| Self::CYCLE.get(i).copied())
    }

    pub fn requires_auth(self) -> bool {
        matches!(self, View::Filter | View::Dashboard)
    }

    pub fn next(self) -> View {
        match self.number() {
            Some(n) => Self::CYCLE[n % Self::CYCLE.len()],
            None => View::Filter,
        }
    }

    pub fn prev(self) -> View {
        let len = Self::CYCLE.len();
        match self.number() {
            Some(n) => Self::CYCLE[(n - 1 + len - 1) % len],
            None => View::Help,
        }
    }
}

/// Status message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// What an error-history entry was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Worker,
    Login,
    BacktestList,
    Backtest(BacktestId),
}

/// An error record for the error history overlay.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub timestamp: NaiveDateTime,
    pub category: &'static str,
    pub message: String,
    pub source: ErrorSource,
}

/// Which overlay (if any) is shown on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    ErrorHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Username,
    Password,
}

/// Login form state.
#[derive(Debug, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub focus: LoginField,
    pub submitting: bool,
}

impl LoginForm {
    pub fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }

    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

/// Filter view state: selected strategy tab and row cursor.
#[derive(Debug, Default)]
pub struct FilterState {
    pub strategy: Option<String>,
    pub cursor: usize,
}

/// Which table the dashboard shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TableKind {
    #[default]
    Overview,
    Trades,
    Signals,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [TableKind::Overview, TableKind::Trades, TableKind::Signals];

    pub fn label(self) -> &'static str {
        match self {
            TableKind::Overview => "Overview",
            TableKind::Trades => "Trades",
            TableKind::Signals => "Signals",
        }
    }
}

/// Chart and table data derived from one cached record.
///
/// Rebuilt whenever the current record's identity changes and dropped when
/// nothing is selected, so derived series never outlive their record.
#[derive(Debug)]
pub struct DerivedView {
    pub id: BacktestId,
    pub record: Arc<BacktestRecord>,
    pub charts: DashboardCharts,
    pub overview: Vec<OverviewPair>,
    pub flat_signal_count: usize,
}

impl DerivedView {
    pub fn build(id: BacktestId, record: Arc<BacktestRecord>) -> Self {
        Self {
            id,
            charts: DashboardCharts::derive(&record),
            overview: overview_pairs(&record.static_stats),
            flat_signal_count: flatten_signals(&record.signal_data).len(),
            record,
        }
    }

    fn is_for(&self, id: BacktestId, record: &Arc<BacktestRecord>) -> bool {
        self.id == id && Arc::ptr_eq(&self.record, record)
    }

    /// Rows the pager windows for `kind`.
    pub fn table_len(&self, kind: TableKind) -> usize {
        match kind {
            TableKind::Overview => self.overview.len(),
            TableKind::Trades => self.record.trades.len(),
            TableKind::Signals => self.record.signal_data.len(),
        }
    }
}

/// Dashboard view state.
#[derive(Debug)]
pub struct DashboardState {
    pub table: TableKind,
    pub pager: Paginator<(BacktestId, TableKind)>,
    pub derived: Option<DerivedView>,
}

impl DashboardState {
    pub fn new(page_size: usize) -> Self {
        Self {
            table: TableKind::default(),
            pager: Paginator::new(page_size),
            derived: None,
        }
    }
}

/// Top-level application state.
pub struct AppState {
    // Navigation
    pub active_view: View,
    pub running: bool,

    // Session and view states
    pub session: Session,
    pub login: LoginForm,
    pub filter: FilterState,
    pub dashboard: DashboardState,

    // Worker communication
    pub worker_tx: Sender<WorkerCommand>,
    pub worker_rx: Receiver<WorkerResponse>,

    // Cross-cutting
    pub status_message: Option<(String, StatusLevel)>,
    pub error_history: VecDeque<ErrorRecord>,
    pub error_scroll: usize,
    pub overlay: Overlay,

    pub state_path: PathBuf,
}

impl AppState {
    pub fn new(
        worker_tx: Sender<WorkerCommand>,
        worker_rx: Receiver<WorkerResponse>,
        policy: ReselectPolicy,
        page_size: usize,
        state_path: PathBuf,
    ) -> Self {
        Self {
            active_view: View::Login,
            running: true,
            session: Session::new(policy),
            login: LoginForm::default(),
            filter: FilterState::default(),
            dashboard: DashboardState::new(page_size),
            worker_tx,
            worker_rx,
            status_message: None,
            error_history: VecDeque::with_capacity(ERROR_HISTORY_CAP),
            error_scroll: 0,
            overlay: Overlay::None,
            state_path,
        }
    }

    /// Push an error to the history, capping at 50.
    pub fn push_error(&mut self, category: &'static str, message: String, source: ErrorSource) {
        let record = ErrorRecord {
            timestamp: chrono::Local::now().naive_local(),
            category,
            message: message.clone(),
            source,
        };
        self.error_history.push_front(record);
        if self.error_history.len() > ERROR_HISTORY_CAP {
            self.error_history.pop_back();
        }
        self.status_message = Some((message, StatusLevel::Error));
    }

    fn push_fetch_error(&mut self, err: &FetchError, source: ErrorSource) {
        self.push_error(err.category(), err.to_string(), source);
    }

    /// Set an info status message.
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Info));
    }

    /// Set a warning status message.
    pub fn set_warning(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Warning));
    }

    fn dispatch(&mut self, cmd: WorkerCommand) {
        if self.worker_tx.send(cmd).is_err() {
            self.push_error("ERR", "background worker is not running".into(), ErrorSource::Worker);
        }
    }

    /// Switch views. Protected views bounce to Login while unauthenticated.
    pub fn switch_view(&mut self, view: View) {
        if view.requires_auth() && !self.session.is_authenticated() {
            self.active_view = View::Login;
            self.set_warning("Log in to view backtests");
            return;
        }
        self.active_view = view;
        if view == View::Filter {
            self.request_summaries();
        }
    }

    // ── Login ───────────────────────────────────────────────────────

    pub fn submit_login(&mut self) {
        if self.login.submitting {
            return;
        }
        if !self.login.is_complete() {
            self.set_warning("Enter a username and password");
            return;
        }
        self.login.submitting = true;
        let credentials = Credentials::new(self.login.username.trim(), self.login.password.clone());
        self.set_status("Logging in...");
        self.dispatch(WorkerCommand::Login { credentials });
    }

    /// Adopt a token and land on the Filter view.
    pub fn authenticate(&mut self, token: AuthToken) {
        self.session.authenticate(token);
        self.login.password.clear();
        self.login.submitting = false;
        self.switch_view(View::Filter);
    }

    /// Tear down the session and return to Login.
    pub fn logout(&mut self) {
        self.session.logout();
        self.dashboard.derived = None;
        self.filter.cursor = 0;
        self.login = LoginForm::default();
        self.active_view = View::Login;
        self.set_status("Logged out");
    }

    // ── Summaries ───────────────────────────────────────────────────

    /// Fetch the summary list unless it is cached or already loading.
    pub fn request_summaries(&mut self) {
        let Some(token) = self.session.token().cloned() else {
            return;
        };
        if let SummaryOutcome::Fetch(ticket) = self.session.summaries.request() {
            self.dispatch(WorkerCommand::FetchSummaries { ticket, token });
        }
    }

    pub fn refresh_summaries(&mut self) {
        self.session.summaries.invalidate();
        self.request_summaries();
        self.set_status("Refreshing backtests...");
    }

    /// Summaries of the selected strategy tab.
    pub fn filter_rows(&self) -> &[BacktestSummary] {
        match (self.session.summaries.grouped(), self.filter.strategy.as_deref()) {
            (Some(grouped), Some(name)) => grouped.get(name).unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Step the strategy tab left or right.
    pub fn cycle_strategy(&mut self, forward: bool) {
        let Some(grouped) = self.session.summaries.grouped() else {
            return;
        };
        let names: Vec<&str> = grouped.strategy_names().collect();
        if names.is_empty() {
            return;
        }
        let len = names.len();
        let pos = self
            .filter
            .strategy
            .as_deref()
            .and_then(|current| names.iter().position(|&n| n == current));
        let next = match pos {
            Some(p) if forward => (p + 1) % len,
            Some(p) => (p + len - 1) % len,
            None => 0,
        };
        self.filter.strategy = Some(names[next].to_string());
        self.filter.cursor = 0;
    }

    pub fn move_filter_cursor(&mut self, down: bool) {
        let len = self.filter_rows().len();
        if len == 0 {
            self.filter.cursor = 0;
        } else if down {
            self.filter.cursor = (self.filter.cursor + 1).min(len - 1);
        } else {
            self.filter.cursor = self.filter.cursor.saturating_sub(1);
        }
    }

    /// Open the summary under the cursor and go to the Dashboard.
    pub fn open_selected(&mut self) {
        let Some(id) = self.filter_rows().get(self.filter.cursor).map(|s| s.id) else {
            return;
        };
        self.open_backtest(id);
        self.switch_view(View::Dashboard);
    }

    // ── Backtest tabs ───────────────────────────────────────────────

    pub fn open_backtest(&mut self, id: BacktestId) {
        let Some(token) = self.session.token().cloned() else {
            self.switch_view(View::Login);
            return;
        };
        let outcome = self.session.cache.select_tab(id);
        self.after_select(outcome, token);
    }

    fn after_select(&mut self, outcome: SelectOutcome, token: AuthToken) {
        if let SelectOutcome::Fetch(ticket) = outcome {
            self.set_status(format!("Loading backtest {}...", ticket.id()));
            self.dispatch(WorkerCommand::FetchBacktest { ticket, token });
        }
    }

    pub fn cycle_tab(&mut self, forward: bool) {
        let Some(token) = self.session.token().cloned() else {
            return;
        };
        if let Some(outcome) = self.session.cache.cycle(forward) {
            self.after_select(outcome, token);
        }
    }

    pub fn close_current_tab(&mut self) {
        let Some(id) = self.session.cache.current() else {
            return;
        };
        let now = self.session.cache.close_tab(id);
        self.set_status(format!("Closed backtest {id}"));
        // The neighbor may be Failed; selecting it again retries.
        if let Some(next) = now {
            self.open_backtest(next);
        }
    }

    pub fn set_table(&mut self, kind: TableKind) {
        self.dashboard.table = kind;
    }

    pub fn next_page(&mut self) {
        self.dashboard.pager.next();
    }

    pub fn previous_page(&mut self) {
        self.dashboard.pager.previous();
    }

    // ── Worker responses ────────────────────────────────────────────

    pub fn handle_response(&mut self, resp: WorkerResponse) {
        match resp {
            WorkerResponse::LoggedIn(Ok(token)) => {
                let user = self.login.username.clone();
                self.authenticate(token);
                self.set_status(format!("Logged in as {user}"));
            }
            WorkerResponse::LoggedIn(Err(err)) => {
                self.login.submitting = false;
                self.push_fetch_error(&err, ErrorSource::Login);
            }
            WorkerResponse::Summaries { ticket, result } => {
                match self.session.summaries.complete(ticket, result) {
                    SummaryCompletion::Ready => self.on_summaries_ready(),
                    SummaryCompletion::Failed(err) => {
                        self.push_fetch_error(&err, ErrorSource::BacktestList)
                    }
                    SummaryCompletion::Discarded => debug!("stale summary list dropped"),
                }
            }
            WorkerResponse::Backtest { ticket, result } => {
                match self.session.cache.complete_fetch(ticket, *result) {
                    Completion::Ready(id) => self.set_status(format!("Backtest {id} loaded")),
                    Completion::Failed(id, err) => {
                        self.push_fetch_error(&err, ErrorSource::Backtest(id))
                    }
                    Completion::Discarded(id) => debug!(id = %id, "result for closed tab dropped"),
                }
            }
        }
    }

    fn on_summaries_ready(&mut self) {
        let Some(grouped) = self.session.summaries.grouped() else {
            return;
        };
        let keep = self
            .filter
            .strategy
            .as_deref()
            .is_some_and(|name| grouped.get(name).is_some());
        if !keep {
            self.filter.strategy = grouped.first_strategy().map(str::to_string);
            self.filter.cursor = 0;
        }
        let count: usize = grouped.iter().map(|g| g.summaries.len()).sum();
        let msg = format!("{count} backtests in {} strategies", grouped.len());
        self.set_status(msg);
    }

    /// True while the worker may still be running a request.
    pub fn worker_busy(&self) -> bool {
        self.login.submitting || self.session.cache.loading() || self.session.summaries.loading()
    }

    /// Drain pending worker responses without blocking.
    pub fn drain_worker(&mut self) {
        while let Ok(resp) = self.worker_rx.try_recv() {
            self.handle_response(resp);
        }
    }

    /// Re-derive dashboard data after the selection or record changed and
    /// rebind the pager to the visible table.
    pub fn sync_views(&mut self) {
        let current = self
            .session
            .cache
            .current()
            .zip(self.session.cache.current_record().cloned());

        match current {
            Some((id, record)) => {
                let stale = self
                    .dashboard
                    .derived
                    .as_ref()
                    .map_or(true, |d| !d.is_for(id, &record));
                if stale {
                    debug!(id = %id, "deriving dashboard view");
                    self.dashboard.derived = Some(DerivedView::build(id, record));
                }
            }
            None => self.dashboard.derived = None,
        }

        if let Some(derived) = &self.dashboard.derived {
            let kind = self.dashboard.table;
            self.dashboard.pager.sync((derived.id, kind), derived.table_len(kind));
        }

        let rows = self.filter_rows().len();
        if rows > 0 && self.filter.cursor >= rows {
            self.filter.cursor = rows - 1;
        }
    }

    /// Dashboard body state for the current tab.
    pub fn dashboard_status(&self) -> DashboardStatus<'_> {
        match self.session.cache.current_entry() {
            None => DashboardStatus::NoSelection,
            Some(CacheEntry::Loading) => DashboardStatus::Loading,
            Some(CacheEntry::Failed(err)) => DashboardStatus::Failed(err),
            Some(CacheEntry::Ready(record)) if record.is_empty() => DashboardStatus::Empty,
            Some(CacheEntry::Ready(_)) => match &self.dashboard.derived {
                Some(derived) => DashboardStatus::Ready(derived),
                None => DashboardStatus::Loading,
            },
        }
    }
}

/// What the dashboard body should render.
#[derive(Debug)]
pub enum DashboardStatus<'a> {
    NoSelection,
    Loading,
    Failed(&'a FetchError),
    Empty,
    Ready(&'a DerivedView),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn app() -> (AppState, Receiver<WorkerCommand>, Sender<WorkerResponse>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();
        let app = AppState::new(cmd_tx, resp_rx, ReselectPolicy::Neighbor, 20, PathBuf::from("."));
        (app, cmd_rx, resp_tx)
    }

    #[test]
    fn view_cycle() {
        assert_eq!(View::Filter.next(), View::Dashboard);
        assert_eq!(View::Help.next(), View::Filter);
        assert_eq!(View::Filter.prev(), View::Help);
        assert_eq!(View::Login.next(), View::Filter);
        for n in 1..=3 {
            assert_eq!(View::from_number(n).unwrap().number(), Some(n));
        }
        assert!(View::from_number(0).is_none());
        assert!(View::from_number(4).is_none());
    }

    #[test]
    fn protected_views_bounce_to_login() {
        let (mut app, _cmd_rx, _resp_tx) = app();
        app.switch_view(View::Dashboard);
        assert_eq!(app.active_view, View::Login);
        app.switch_view(View::Help);
        assert_eq!(app.active_view, View::Help);
    }

    #[test]
    fn error_history_caps_at_50() {
        let (mut app, _cmd_rx, _resp_tx) = app();
        for i in 0..60 {
            app.push_error("ERR", format!("error {i}"), ErrorSource::Worker);
        }
        assert_eq!(app.error_history.len(), 50);
        assert!(app.error_history[0].message.contains("59"));
    }

    #[test]
    fn login_success_requests_summaries() {
        let (mut app, cmd_rx, _resp_tx) = app();
        app.login.username = "analyst".into();
        app.login.password = "pw".into();
        app.submit_login();
        assert!(matches!(cmd_rx.try_recv(), Ok(WorkerCommand::Login { .. })));

        app.handle_response(WorkerResponse::LoggedIn(Ok(AuthToken::new("t"))));
        assert_eq!(app.active_view, View::Filter);
        assert!(app.login.password.is_empty());
        assert!(matches!(cmd_rx.try_recv(), Ok(WorkerCommand::FetchSummaries { .. })));

        // Revisiting the view reuses the cached or in-flight list.
        app.switch_view(View::Filter);
        assert!(cmd_rx.try_recv().is_err());
    }

    #[test]
    fn incomplete_login_is_not_sent() {
        let (mut app, cmd_rx, _resp_tx) = app();
        app.login.username = "analyst".into();
        app.submit_login();
        assert!(cmd_rx.try_recv().is_err());
        assert!(matches!(app.status_message, Some((_, StatusLevel::Warning))));
    }

    #[test]
    fn failed_login_is_recorded() {
        let (mut app, _cmd_rx, _resp_tx) = app();
        app.login.submitting = true;
        app.handle_response(WorkerResponse::LoggedIn(Err(FetchError::Unauthorized(
            "bad password".into(),
        ))));
        assert!(!app.login.submitting);
        assert_eq!(app.active_view, View::Login);
        assert_eq!(app.error_history[0].category, "AUTH");
    }

    #[test]
    fn logout_clears_everything() {
        let (mut app, _cmd_rx, _resp_tx) = app();
        app.authenticate(AuthToken::new("t"));
        app.open_backtest(BacktestId::new(3));
        app.logout();
        assert_eq!(app.active_view, View::Login);
        assert!(!app.session.is_authenticated());
        assert!(app.session.cache.tabs().is_empty());
        assert!(app.dashboard.derived.is_none());
    }

    #[test]
    fn dashboard_without_selection_prompts() {
        let (mut app, _cmd_rx, _resp_tx) = app();
        app.sync_views();
        assert!(matches!(app.dashboard_status(), DashboardStatus::NoSelection));
    }
}
