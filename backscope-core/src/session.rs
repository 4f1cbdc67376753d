//! Backtest session cache and the session context that owns it.
//!
//! The cache is a sans-IO state machine. `select_tab` hands out a
//! [`FetchTicket`] when a fetch must be dispatched, and the caller reports
//! back through [`SessionCache::complete_fetch`]. At most one ticket is live
//! per id, which is what deduplicates concurrent selections. Closing a tab
//! forgets its ticket, so a late completion is discarded rather than written.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{AuthToken, BacktestApi};
use crate::error::FetchError;
use crate::model::{BacktestId, BacktestRecord};
use crate::summary::{GroupedSummaries, SummaryCompletion, SummaryIndex, SummaryOutcome};

/// What becomes current after the current tab is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReselectPolicy {
    /// Tab to the right, else the tab to the left, else nothing.
    #[default]
    Neighbor,
    /// Leave nothing selected.
    None,
}

/// Identifies one dispatched detail fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    id: BacktestId,
    seq: u64,
}

impl FetchTicket {
    pub fn id(&self) -> BacktestId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Loading,
    Ready(Arc<BacktestRecord>),
    Failed(FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Caller must fetch the id and complete with this ticket.
    Fetch(FetchTicket),
    /// A fetch for the id is already in flight.
    Pending,
    /// The record is cached.
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Ready(BacktestId),
    Failed(BacktestId, FetchError),
    /// Ticket no longer live; the result was dropped.
    Discarded(BacktestId),
}

/// Open tabs, their cached records and the current selection.
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    tabs: Vec<BacktestId>,
    entries: HashMap<BacktestId, CacheEntry>,
    in_flight: HashMap<BacktestId, FetchTicket>,
    current: Option<BacktestId>,
    next_seq: u64,
    policy: ReselectPolicy,
}

impl SessionCache {
    pub fn new(policy: ReselectPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> ReselectPolicy {
        self.policy
    }

    /// Make `id` current, opening it as a tab if needed.
    pub fn select_tab(&mut self, id: BacktestId) -> SelectOutcome {
        if !self.tabs.contains(&id) {
            self.tabs.push(id);
        }
        self.current = Some(id);

        match self.entries.get(&id) {
            Some(CacheEntry::Ready(_)) => SelectOutcome::Ready,
            Some(CacheEntry::Loading) => SelectOutcome::Pending,
            Some(CacheEntry::Failed(_)) | None => {
                self.next_seq += 1;
                let ticket = FetchTicket {
                    id,
                    seq: self.next_seq,
                };
                self.entries.insert(id, CacheEntry::Loading);
                self.in_flight.insert(id, ticket);
                debug!(id = %id, seq = ticket.seq, "fetch issued");
                SelectOutcome::Fetch(ticket)
            }
        }
    }

    /// Apply the result of a dispatched fetch.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<BacktestRecord, FetchError>,
    ) -> Completion {
        let id = ticket.id;
        if self.in_flight.get(&id) != Some(&ticket) {
            debug!(id = %id, seq = ticket.seq, "stale fetch discarded");
            return Completion::Discarded(id);
        }
        self.in_flight.remove(&id);

        match result {
            Ok(record) => {
                debug!(id = %id, "backtest ready");
                self.entries.insert(id, CacheEntry::Ready(Arc::new(record)));
                Completion::Ready(id)
            }
            Err(err) => {
                warn!(id = %id, error = %err, "backtest fetch failed");
                self.entries.insert(id, CacheEntry::Failed(err.clone()));
                Completion::Failed(id, err)
            }
        }
    }

    /// Close a tab and drop its entry. Returns the current id afterwards.
    pub fn close_tab(&mut self, id: BacktestId) -> Option<BacktestId> {
        let Some(pos) = self.tabs.iter().position(|&t| t == id) else {
            return self.current;
        };
        self.tabs.remove(pos);
        self.entries.remove(&id);
        self.in_flight.remove(&id);

        if self.current == Some(id) {
            self.current = match self.policy {
                ReselectPolicy::Neighbor => self
                    .tabs
                    .get(pos)
                    .or_else(|| pos.checked_sub(1).and_then(|left| self.tabs.get(left)))
                    .copied(),
                ReselectPolicy::None => None,
            };
            debug!(closed = %id, current = ?self.current, "current tab closed");
        }
        self.current
    }

    /// True while any detail fetch is in flight.
    pub fn loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn is_loading(&self, id: BacktestId) -> bool {
        self.in_flight.contains_key(&id)
    }

    pub fn entry(&self, id: BacktestId) -> Option<&CacheEntry> {
        self.entries.get(&id)
    }

    pub fn record(&self, id: BacktestId) -> Option<&Arc<BacktestRecord>> {
        match self.entries.get(&id) {
            Some(CacheEntry::Ready(record)) => Some(record),
            _ => None,
        }
    }

    pub fn current(&self) -> Option<BacktestId> {
        self.current
    }

    pub fn current_entry(&self) -> Option<&CacheEntry> {
        self.current.and_then(|id| self.entries.get(&id))
    }

    pub fn current_record(&self) -> Option<&Arc<BacktestRecord>> {
        self.current.and_then(|id| self.record(id))
    }

    /// Open tabs in the order they were opened.
    pub fn tabs(&self) -> &[BacktestId] {
        &self.tabs
    }

    /// Step the selection through the open tabs, wrapping at either end.
    pub fn cycle(&mut self, forward: bool) -> Option<SelectOutcome> {
        if self.tabs.is_empty() {
            return None;
        }
        let len = self.tabs.len();
        let next = match self.current.and_then(|c| self.tabs.iter().position(|&t| t == c)) {
            Some(pos) if forward => (pos + 1) % len,
            Some(pos) => (pos + len - 1) % len,
            None => 0,
        };
        Some(self.select_tab(self.tabs[next]))
    }

    /// Drop every tab and record. Ticket numbering carries on, so a fetch
    /// issued before the clear can never match one issued after it.
    pub fn clear(&mut self) {
        let seq = self.next_seq;
        *self = Self::new(self.policy);
        self.next_seq = seq;
    }
}

/// Explicitly owned session state: auth token, detail cache and summary
/// index. Starts empty and is torn down by [`Session::logout`].
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<AuthToken>,
    pub cache: SessionCache,
    pub summaries: SummaryIndex,
}

impl Session {
    pub fn new(policy: ReselectPolicy) -> Self {
        Self {
            token: None,
            cache: SessionCache::new(policy),
            summaries: SummaryIndex::new(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    pub fn authenticate(&mut self, token: AuthToken) {
        info!("session authenticated");
        self.token = Some(token);
    }

    /// Drop the token and every cached summary and record.
    pub fn logout(&mut self) {
        info!(tabs = self.cache.tabs().len(), "session cleared");
        self.token = None;
        self.cache.clear();
        self.summaries.reset();
    }

    fn require_token(&self) -> Result<AuthToken, FetchError> {
        self.token
            .clone()
            .ok_or_else(|| FetchError::Unauthorized("not logged in".into()))
    }

    /// Select `id` and, if needed, fetch it inline through `api`.
    pub fn open_blocking(
        &mut self,
        api: &dyn BacktestApi,
        id: BacktestId,
    ) -> Result<Arc<BacktestRecord>, FetchError> {
        let token = self.require_token()?;
        if let SelectOutcome::Fetch(ticket) = self.cache.select_tab(id) {
            let result = api.fetch_backtest(&token, id);
            if let Completion::Failed(_, err) = self.cache.complete_fetch(ticket, result) {
                return Err(err);
            }
        }
        self.cache
            .record(id)
            .cloned()
            .ok_or_else(|| FetchError::Network(format!("backtest {id} is still loading")))
    }

    /// Grouped summary list, fetched inline through `api` on first use.
    pub fn grouped_blocking(
        &mut self,
        api: &dyn BacktestApi,
    ) -> Result<&GroupedSummaries, FetchError> {
        let token = self.require_token()?;
        if let SummaryOutcome::Fetch(ticket) = self.summaries.request() {
            let result = api.fetch_summaries(&token);
            if let SummaryCompletion::Failed(err) = self.summaries.complete(ticket, result) {
                return Err(err);
            }
        }
        self.summaries
            .grouped()
            .ok_or_else(|| FetchError::Network("summaries are still loading".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Credentials;
    use crate::model::fixtures::{record, summary};
    use crate::model::BacktestSummary;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(raw: u64) -> BacktestId {
        BacktestId::new(raw)
    }

    fn fetch_ticket(outcome: SelectOutcome) -> FetchTicket {
        match outcome {
            SelectOutcome::Fetch(ticket) => ticket,
            other => panic!("expected a fetch, got {other:?}"),
        }
    }

    fn open_ready(cache: &mut SessionCache, raw: u64) {
        let ticket = fetch_ticket(cache.select_tab(id(raw)));
        assert_eq!(cache.complete_fetch(ticket, Ok(record(raw))), Completion::Ready(id(raw)));
    }

    #[test]
    fn concurrent_selects_issue_one_fetch() {
        let mut cache = SessionCache::default();
        let ticket = fetch_ticket(cache.select_tab(id(7)));
        assert_eq!(cache.select_tab(id(7)), SelectOutcome::Pending);
        assert_eq!(cache.select_tab(id(7)), SelectOutcome::Pending);
        assert!(cache.loading());
        assert_eq!(cache.tabs(), &[id(7)]);

        assert_eq!(cache.complete_fetch(ticket, Ok(record(7))), Completion::Ready(id(7)));
        assert!(!cache.loading());
        assert_eq!(cache.select_tab(id(7)), SelectOutcome::Ready);
        assert_eq!(cache.current_record().unwrap().id, id(7));
    }

    #[test]
    fn duplicate_completion_is_discarded() {
        let mut cache = SessionCache::default();
        let ticket = fetch_ticket(cache.select_tab(id(1)));
        cache.complete_fetch(ticket, Ok(record(1)));
        let first = Arc::clone(cache.record(id(1)).unwrap());

        assert_eq!(cache.complete_fetch(ticket, Ok(record(1))), Completion::Discarded(id(1)));
        assert!(Arc::ptr_eq(&first, cache.record(id(1)).unwrap()));
    }

    #[test]
    fn switching_to_ready_tab_needs_no_fetch() {
        let mut cache = SessionCache::default();
        open_ready(&mut cache, 1);
        open_ready(&mut cache, 2);
        assert_eq!(cache.current(), Some(id(2)));
        assert_eq!(cache.select_tab(id(1)), SelectOutcome::Ready);
        assert_eq!(cache.current(), Some(id(1)));
        assert_eq!(cache.tabs(), &[id(1), id(2)]);
    }

    #[test]
    fn close_removes_tab_and_entry_and_refetches() {
        let mut cache = SessionCache::default();
        open_ready(&mut cache, 7);
        cache.close_tab(id(7));
        assert!(cache.tabs().is_empty());
        assert!(cache.entry(id(7)).is_none());
        assert_eq!(cache.current(), None);

        assert!(matches!(cache.select_tab(id(7)), SelectOutcome::Fetch(_)));
    }

    #[test]
    fn neighbor_policy_prefers_right_then_left() {
        let mut cache = SessionCache::new(ReselectPolicy::Neighbor);
        for raw in 1..=3 {
            open_ready(&mut cache, raw);
        }
        cache.select_tab(id(2));
        assert_eq!(cache.close_tab(id(2)), Some(id(3)));
        assert_eq!(cache.close_tab(id(3)), Some(id(1)));
        assert_eq!(cache.close_tab(id(1)), None);
    }

    #[test]
    fn none_policy_leaves_selection_empty() {
        let mut cache = SessionCache::new(ReselectPolicy::None);
        open_ready(&mut cache, 1);
        open_ready(&mut cache, 2);
        assert_eq!(cache.close_tab(id(2)), None);
        assert_eq!(cache.tabs(), &[id(1)]);
        assert!(cache.current_record().is_none());
    }

    #[test]
    fn closing_another_tab_keeps_current() {
        let mut cache = SessionCache::default();
        open_ready(&mut cache, 1);
        open_ready(&mut cache, 2);
        assert_eq!(cache.close_tab(id(1)), Some(id(2)));
        assert_eq!(cache.close_tab(id(99)), Some(id(2)));
    }

    #[test]
    fn close_during_flight_discards_late_result() {
        let mut cache = SessionCache::default();
        let stale = fetch_ticket(cache.select_tab(id(4)));
        cache.close_tab(id(4));
        assert!(!cache.loading());
        assert_eq!(cache.complete_fetch(stale, Ok(record(4))), Completion::Discarded(id(4)));
        assert!(cache.entry(id(4)).is_none());

        let fresh = fetch_ticket(cache.select_tab(id(4)));
        assert_ne!(stale, fresh);
        assert_eq!(cache.complete_fetch(stale, Ok(record(4))), Completion::Discarded(id(4)));
        assert_eq!(cache.entry(id(4)), Some(&CacheEntry::Loading));
        assert_eq!(cache.complete_fetch(fresh, Ok(record(4))), Completion::Ready(id(4)));
    }

    #[test]
    fn failure_is_stored_and_retried_on_reselect() {
        let mut cache = SessionCache::default();
        let ticket = fetch_ticket(cache.select_tab(id(5)));
        let err = FetchError::NotFound { id: id(5) };
        assert_eq!(
            cache.complete_fetch(ticket, Err(err.clone())),
            Completion::Failed(id(5), err.clone())
        );
        assert_eq!(cache.current_entry(), Some(&CacheEntry::Failed(err)));
        assert!(cache.current_record().is_none());

        assert!(matches!(cache.select_tab(id(5)), SelectOutcome::Fetch(_)));
        assert_eq!(cache.entry(id(5)), Some(&CacheEntry::Loading));
    }

    #[test]
    fn clear_keeps_ticket_numbering() {
        let mut cache = SessionCache::default();
        let before = fetch_ticket(cache.select_tab(id(7)));
        cache.clear();
        assert!(cache.tabs().is_empty());
        let after = fetch_ticket(cache.select_tab(id(7)));
        assert_ne!(before, after);
        assert_eq!(cache.complete_fetch(before, Ok(record(7))), Completion::Discarded(id(7)));
        assert_eq!(cache.entry(id(7)), Some(&CacheEntry::Loading));
    }

    #[test]
    fn fetches_from_before_logout_are_dropped_after_relogin() {
        let mut session = Session::default();
        session.authenticate(AuthToken::new("first"));
        let old_detail = fetch_ticket(session.cache.select_tab(id(7)));
        let SummaryOutcome::Fetch(old_list) = session.summaries.request() else {
            panic!("expected summary fetch");
        };

        session.logout();
        session.authenticate(AuthToken::new("second"));
        let new_detail = fetch_ticket(session.cache.select_tab(id(7)));
        let SummaryOutcome::Fetch(new_list) = session.summaries.request() else {
            panic!("expected summary fetch");
        };

        assert_eq!(
            session.cache.complete_fetch(old_detail, Ok(record(7))),
            Completion::Discarded(id(7))
        );
        assert_eq!(
            session.summaries.complete(old_list, Ok(vec![summary(1, "A")])),
            SummaryCompletion::Discarded
        );
        assert!(session.summaries.loading());
        assert_eq!(
            session.cache.complete_fetch(new_detail, Ok(record(7))),
            Completion::Ready(id(7))
        );
        assert_eq!(
            session.summaries.complete(new_list, Ok(vec![summary(2, "B")])),
            SummaryCompletion::Ready
        );
        assert!(session.summaries.grouped().unwrap().find(id(2)).is_some());
    }

    #[test]
    fn cycle_wraps_through_tabs() {
        let mut cache = SessionCache::default();
        assert_eq!(cache.cycle(true), None);
        for raw in 1..=3 {
            open_ready(&mut cache, raw);
        }
        cache.cycle(true);
        assert_eq!(cache.current(), Some(id(1)));
        cache.cycle(false);
        assert_eq!(cache.current(), Some(id(3)));
    }

    #[test]
    fn reselect_policy_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&ReselectPolicy::Neighbor).unwrap(), "\"neighbor\"");
        let parsed: ReselectPolicy = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(parsed, ReselectPolicy::None);
    }

    #[derive(Default)]
    struct CountingApi {
        detail_calls: AtomicUsize,
        summary_calls: AtomicUsize,
    }

    impl BacktestApi for CountingApi {
        fn name(&self) -> &str {
            "counting"
        }

        fn login(&self, _: &Credentials) -> Result<AuthToken, FetchError> {
            Ok(AuthToken::new("t"))
        }

        fn fetch_summaries(&self, _: &AuthToken) -> Result<Vec<BacktestSummary>, FetchError> {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![summary(1, "A"), summary(2, "B"), summary(3, "A")])
        }

        fn fetch_backtest(
            &self,
            _: &AuthToken,
            id: BacktestId,
        ) -> Result<BacktestRecord, FetchError> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            if id.get() == 404 {
                return Err(FetchError::NotFound { id });
            }
            Ok(record(id.get()))
        }
    }

    #[test]
    fn blocking_helpers_require_login() {
        let api = CountingApi::default();
        let mut session = Session::default();
        assert!(!session.is_authenticated());
        assert!(matches!(session.open_blocking(&api, id(1)), Err(FetchError::Unauthorized(_))));
        assert!(matches!(session.grouped_blocking(&api), Err(FetchError::Unauthorized(_))));
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn blocking_open_fetches_once() {
        let api = CountingApi::default();
        let mut session = Session::default();
        session.authenticate(AuthToken::new("t"));

        let first = session.open_blocking(&api, id(7)).unwrap();
        let second = session.open_blocking(&api, id(7)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 1);

        session.cache.close_tab(id(7));
        session.open_blocking(&api, id(7)).unwrap();
        assert_eq!(api.detail_calls.load(Ordering::SeqCst), 2);

        let err = session.open_blocking(&api, id(404)).unwrap_err();
        assert_eq!(err, FetchError::NotFound { id: id(404) });
    }

    #[test]
    fn blocking_summaries_are_cached_until_logout() {
        let api = CountingApi::default();
        let mut session = Session::default();
        session.authenticate(AuthToken::new("t"));

        assert_eq!(session.grouped_blocking(&api).unwrap().len(), 2);
        assert_eq!(session.grouped_blocking(&api).unwrap().len(), 2);
        assert_eq!(api.summary_calls.load(Ordering::SeqCst), 1);

        session.open_blocking(&api, id(1)).unwrap();
        session.logout();
        assert!(!session.is_authenticated());
        assert!(session.cache.tabs().is_empty());
        assert!(session.summaries.grouped().is_none());
    }
}
