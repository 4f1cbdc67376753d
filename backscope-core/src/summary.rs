//! Backtest list grouped by strategy name, and the fetch-once index that
//! owns it.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{FetchError, MalformedRecord};
use crate::model::{BacktestId, BacktestSummary};

/// Summaries sharing one `strategy_name`, in server order.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyGroup {
    pub name: String,
    pub summaries: Vec<BacktestSummary>,
}

/// `strategy_name -> summaries`, iterating in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedSummaries {
    groups: Vec<StrategyGroup>,
}

impl GroupedSummaries {
    /// Group a summary list. A summary without a strategy name is rejected.
    pub fn build(summaries: Vec<BacktestSummary>) -> Result<Self, MalformedRecord> {
        let mut groups: Vec<StrategyGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for summary in summaries {
            summary.validate()?;
            match index.get(&summary.strategy_name) {
                Some(&i) => groups[i].summaries.push(summary),
                None => {
                    index.insert(summary.strategy_name.clone(), groups.len());
                    groups.push(StrategyGroup {
                        name: summary.strategy_name.clone(),
                        summaries: vec![summary],
                    });
                }
            }
        }

        Ok(Self { groups })
    }

    pub fn strategy_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.name.as_str())
    }

    pub fn get(&self, strategy: &str) -> Option<&[BacktestSummary]> {
        self.groups
            .iter()
            .find(|g| g.name == strategy)
            .map(|g| g.summaries.as_slice())
    }

    pub fn first_strategy(&self) -> Option<&str> {
        self.groups.first().map(|g| g.name.as_str())
    }

    pub fn find(&self, id: BacktestId) -> Option<&BacktestSummary> {
        self.groups
            .iter()
            .flat_map(|g| g.summaries.iter())
            .find(|s| s.id == id)
    }

    /// Number of strategies.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StrategyGroup> {
        self.groups.iter()
    }
}

/// Handle for one in-flight summary list fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SummaryTicket {
    seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
enum SummaryState {
    Idle,
    Loading(SummaryTicket),
    Ready(GroupedSummaries),
    Failed(FetchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Caller must fetch the list and report back with this ticket.
    Fetch(SummaryTicket),
    /// A fetch is already in flight.
    Pending,
    /// The cached grouping is available through [`SummaryIndex::grouped`].
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryCompletion {
    Ready,
    Failed(FetchError),
    Discarded,
}

/// Fetch-once, deduplicated cache of the grouped backtest list.
#[derive(Debug, Clone)]
pub struct SummaryIndex {
    state: SummaryState,
    next_seq: u64,
}

impl Default for SummaryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryIndex {
    pub fn new() -> Self {
        Self {
            state: SummaryState::Idle,
            next_seq: 0,
        }
    }

    pub fn request(&mut self) -> SummaryOutcome {
        match self.state {
            SummaryState::Ready(_) => SummaryOutcome::Ready,
            SummaryState::Loading(_) => SummaryOutcome::Pending,
            SummaryState::Idle | SummaryState::Failed(_) => {
                self.next_seq += 1;
                let ticket = SummaryTicket { seq: self.next_seq };
                debug!(seq = ticket.seq, "summary fetch issued");
                self.state = SummaryState::Loading(ticket);
                SummaryOutcome::Fetch(ticket)
            }
        }
    }

    pub fn complete(
        &mut self,
        ticket: SummaryTicket,
        result: Result<Vec<BacktestSummary>, FetchError>,
    ) -> SummaryCompletion {
        if self.state != SummaryState::Loading(ticket) {
            debug!(seq = ticket.seq, "stale summary fetch discarded");
            return SummaryCompletion::Discarded;
        }

        match result.and_then(|list| GroupedSummaries::build(list).map_err(FetchError::from)) {
            Ok(grouped) => {
                debug!(strategies = grouped.len(), "summaries ready");
                self.state = SummaryState::Ready(grouped);
                SummaryCompletion::Ready
            }
            Err(err) => {
                warn!(error = %err, "summary fetch failed");
                self.state = SummaryState::Failed(err.clone());
                SummaryCompletion::Failed(err)
            }
        }
    }

    /// Drop the cached grouping. The next `request` fetches again. Any
    /// in-flight fetch is orphaned and its completion discarded.
    pub fn invalidate(&mut self) {
        self.state = SummaryState::Idle;
    }

    /// Forget the cached list, keeping ticket numbering monotonic.
    pub fn reset(&mut self) {
        let seq = self.next_seq;
        *self = Self::new();
        self.next_seq = seq;
    }

    pub fn grouped(&self) -> Option<&GroupedSummaries> {
        match &self.state {
            SummaryState::Ready(grouped) => Some(grouped),
            _ => None,
        }
    }

    pub fn loading(&self) -> bool {
        matches!(self.state, SummaryState::Loading(_))
    }

    pub fn error(&self) -> Option<&FetchError> {
        match &self.state {
            SummaryState::Failed(err) => Some(err),
            _ => None,
        }
    }
}
