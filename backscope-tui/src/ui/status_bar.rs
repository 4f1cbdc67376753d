//! Bottom status bar: view hints, fetch activity, last status message.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::{AppState, StatusLevel, View};
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let mut spans: Vec<Span> = Vec::new();

    let hints = match app.active_view {
        View::Login => " [Tab]field [Enter]login [Esc]quit",
        _ => " 1:Backtests 2:Dashboard 3:Help [e]rrors [L]ogout [q]uit",
    };
    spans.push(Span::styled(hints, theme::muted()));

    if app.session.cache.loading() || app.session.summaries.loading() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled("fetching", theme::warning()));
    }

    spans.push(Span::raw(" | "));

    if let Some((msg, level)) = &app.status_message {
        let style = match level {
            StatusLevel::Info => theme::accent(),
            StatusLevel::Warning => theme::warning(),
            StatusLevel::Error => theme::negative(),
        };
        spans.push(Span::styled(msg.as_str(), style));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
