//! Help view: keyboard shortcuts.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::AppState;
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, _app: &AppState) {
    let mut lines: Vec<Line> = Vec::new();

    section(&mut lines, "Global");
    key(&mut lines, "1-3", "Switch view by number");
    key(&mut lines, "Tab / Shift+Tab", "Cycle views forward / back");
    key(&mut lines, "? / F1", "Open this help");
    key(&mut lines, "e", "Open error history overlay");
    key(&mut lines, "L", "Log out and clear all open backtests");
    key(&mut lines, "q / Ctrl+C", "Quit");
    lines.push(Line::from(""));

    section(&mut lines, "Login");
    key(&mut lines, "Tab / Up / Down", "Switch between username and password");
    key(&mut lines, "Enter", "Log in");
    key(&mut lines, "Esc", "Quit");
    lines.push(Line::from(""));

    section(&mut lines, "1 Backtests");
    key(&mut lines, "h / l", "Previous / next strategy");
    key(&mut lines, "j / k", "Move cursor down / up");
    key(&mut lines, "Enter", "Open backtest in a dashboard tab");
    key(&mut lines, "r", "Refresh the backtest list");
    lines.push(Line::from(""));

    section(&mut lines, "2 Dashboard");
    key(&mut lines, "[ / ]", "Previous / next open backtest");
    key(&mut lines, "x", "Close the current backtest tab");
    key(&mut lines, "r", "Retry a failed load");
    key(&mut lines, "o / t / s", "Overview / trades / signals table");
    key(&mut lines, "n / p", "Next / previous table page");
    lines.push(Line::from(""));

    section(&mut lines, "Signal markers");
    key(&mut lines, "▲ green", "LONG or COVER");
    key(&mut lines, "▼ red", "SHORT or SELL");
    key(&mut lines, "● yellow", "Any other action");

    f.render_widget(Paragraph::new(lines), area);
}

fn section<'a>(lines: &mut Vec<Line<'a>>, title: &str) {
    lines.push(Line::from(Span::styled(title.to_string(), theme::accent_bold())));
}

fn key<'a>(lines: &mut Vec<Line<'a>>, keys: &str, desc: &str) {
    lines.push(Line::from(vec![
        Span::styled(format!("  {:>18}  ", keys), theme::accent()),
        Span::styled(desc.to_string(), theme::muted()),
    ]));
}
