//! Error history overlay.

use ratatui::layout::Rect;
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use backscope_core::session::SessionCache;

use crate::app::{AppState, ErrorRecord, ErrorSource};
use crate::theme;
use crate::ui::centered_rect;

/// Where the error came from, and how to act on it now.
pub fn source_hint(cache: &SessionCache, source: ErrorSource) -> String {
    match source {
        ErrorSource::Worker => "background worker: restart backscope".into(),
        ErrorSource::Login => "login: check the username, password and api.base_url".into(),
        ErrorSource::BacktestList => "backtest list: [r] on Backtests refreshes".into(),
        ErrorSource::Backtest(id) if cache.tabs().contains(&id) => {
            format!("backtest #{id}: tab open, select it or [r] to retry")
        }
        ErrorSource::Backtest(id) => format!("backtest #{id}: tab closed"),
    }
}

/// `"3 NET, 1 HTTP"`, in order of first appearance.
fn category_tally<'a>(records: impl Iterator<Item = &'a ErrorRecord>) -> String {
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for record in records {
        match tally.iter_mut().find(|(c, _)| *c == record.category) {
            Some((_, n)) => *n += 1,
            None => tally.push((record.category, 1)),
        }
    }
    tally
        .iter()
        .map(|(c, n)| format!("{n} {c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_error_history(f: &mut Frame, area: Rect, app: &AppState) {
    let popup = centered_rect(80, 70, area);
    f.render_widget(Clear, popup);

    let title = if app.error_history.is_empty() {
        " Errors [Esc]close ".to_string()
    } else {
        format!(
            " Errors: {} [Esc]close [j/k]scroll ",
            category_tally(app.error_history.iter())
        )
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::negative())
        .title(title)
        .title_style(theme::negative());

    let inner = block.inner(popup);
    f.render_widget(block, popup);

    if app.error_history.is_empty() {
        let text = Paragraph::new(Span::styled("No fetch errors this session.", theme::muted()));
        f.render_widget(text, inner);
        return;
    }

    let cache = &app.session.cache;
    let lines: Vec<Line> = app
        .error_history
        .iter()
        .enumerate()
        .skip(app.error_scroll)
        .take((inner.height as usize / 2).max(1))
        .flat_map(|(i, err)| {
            let style = if i == app.error_scroll {
                theme::negative().add_modifier(Modifier::BOLD)
            } else {
                theme::text()
            };
            [
                Line::from(vec![
                    Span::styled(err.timestamp.format("%H:%M:%S ").to_string(), theme::muted()),
                    Span::styled(format!("{:<4} ", err.category), theme::warning()),
                    Span::styled(err.message.clone(), style),
                ]),
                Line::from(Span::styled(
                    format!("         {}", source_hint(cache, err.source)),
                    theme::muted(),
                )),
            ]
        })
        .collect();

    f.render_widget(Paragraph::new(lines), inner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use backscope_core::model::BacktestId;
    use backscope_core::session::{ReselectPolicy, SelectOutcome};

    fn record(category: &'static str) -> ErrorRecord {
        ErrorRecord {
            timestamp: chrono::NaiveDateTime::default(),
            category,
            message: String::new(),
            source: ErrorSource::Worker,
        }
    }

    #[test]
    fn hint_tracks_whether_the_tab_is_still_open() {
        let mut cache = SessionCache::new(ReselectPolicy::Neighbor);
        let id = BacktestId::new(7);
        assert!(matches!(cache.select_tab(id), SelectOutcome::Fetch(_)));
        assert!(source_hint(&cache, ErrorSource::Backtest(id)).contains("#7: tab open"));

        cache.close_tab(id);
        assert_eq!(source_hint(&cache, ErrorSource::Backtest(id)), "backtest #7: tab closed");
    }

    #[test]
    fn tally_counts_categories_in_first_seen_order() {
        let records = [record("NET"), record("HTTP"), record("NET")];
        assert_eq!(category_tally(records.iter()), "2 NET, 1 HTTP");
    }
}
