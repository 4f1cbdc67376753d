//! UI preference persistence: JSON save/load across restarts.
//!
//! Only navigation preferences are stored. Backtest data and tokens never
//! touch disk from here.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::app::{AppState, View};

/// Serializable subset of app state that persists across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub last_view: View,
    pub last_strategy: Option<String>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            last_view: View::Filter,
            last_strategy: None,
        }
    }
}

/// Load persisted state from disk. Returns defaults if file is missing or corrupt.
pub fn load(path: &Path) -> PersistedState {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => PersistedState::default(),
    }
}

/// Save persisted state to disk. Creates parent directories if needed.
pub fn save(path: &Path, state: &PersistedState) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Extract persisted state from AppState.
pub fn extract(app: &AppState) -> PersistedState {
    let last_view = match app.active_view {
        View::Login => PersistedState::default().last_view,
        view => view,
    };
    PersistedState {
        last_view,
        last_strategy: app.filter.strategy.clone(),
    }
}

/// Apply persisted state to AppState. The view is only restored when the
/// session is already authenticated.
pub fn apply(app: &mut AppState, state: PersistedState) {
    app.filter.strategy = state.last_strategy;
    if state.last_view != View::Login && app.session.is_authenticated() {
        app.switch_view(state.last_view);
    }
}
