//! Top-level UI layout: view tabs, active view, status bar, overlays.

pub mod charts;
pub mod dashboard_view;
pub mod filter_view;
pub mod help_view;
pub mod login_view;
pub mod overlays;
pub mod status_bar;
pub mod tables;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{AppState, Overlay, View};
use crate::theme;

/// Draw the entire UI.
pub fn draw(f: &mut Frame, app: &AppState) {
    // Split: view tabs + main area + 1-line status bar.
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_view_tabs(f, chunks[0], app);
    draw_view(f, chunks[1], app);
    status_bar::render(f, chunks[2], app);

    if app.overlay == Overlay::ErrorHistory {
        overlays::render_error_history(f, chunks[1], app);
    }
}

fn draw_view_tabs(f: &mut Frame, area: Rect, app: &AppState) {
    let mut spans = vec![Span::styled(" BACKSCOPE ", theme::accent_bold())];
    for view in View::CYCLE {
        let active = view == app.active_view;
        let style = if active {
            theme::accent_bold()
        } else if view.requires_auth() && !app.session.is_authenticated() {
            theme::muted()
        } else {
            theme::text()
        };
        let label = match view.number() {
            Some(n) => format!(" {n}:{} ", view.label()),
            None => format!(" {} ", view.label()),
        };
        spans.push(Span::styled(label, style));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Draw the active view inside its border.
fn draw_view(f: &mut Frame, area: Rect, app: &AppState) {
    let view = app.active_view;
    let title = match view.number() {
        Some(n) => format!(" {} [{n}] ", view.label()),
        None => format!(" {} ", view.label()),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(true))
        .title(title)
        .title_style(theme::panel_title(true));

    let inner = block.inner(area);
    f.render_widget(block, area);

    match view {
        View::Login => login_view::render(f, inner, app),
        View::Filter => filter_view::render(f, inner, app),
        View::Dashboard => dashboard_view::render(f, inner, app),
        View::Help => help_view::render(f, inner, app),
    }
}

/// Compute a centered rect for overlays.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Shorten to `max` chars, marking the cut with a trailing dot.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('.');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_is_inside() {
        let area = Rect::new(0, 0, 100, 50);
        let popup = centered_rect(60, 40, area);
        assert!(popup.x >= area.x && popup.right() <= area.right());
        assert!(popup.y >= area.y && popup.bottom() <= area.bottom());
        assert_eq!(popup.width, 60);
        assert_eq!(popup.height, 20);
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("ZScore", 10), "ZScore");
        assert_eq!(truncate("ZScoreReversion", 7), "ZScore.");
        assert_eq!(truncate("ÉÉÉÉ", 3), "ÉÉ.");
    }
}
