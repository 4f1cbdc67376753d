//! Backtests view: strategy tabs over the grouped summary list.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Cell, Paragraph, Row, Table, TableState, Tabs};
use ratatui::Frame;

use backscope_core::model::BacktestSummary;

use crate::app::AppState;
use crate::theme;
use crate::ui::tables::format_money;
use crate::ui::truncate;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let summaries = &app.session.summaries;

    let Some(grouped) = summaries.grouped() else {
        let line = if summaries.loading() {
            Line::from(Span::styled("Loading backtests...", theme::warning()))
        } else if let Some(err) = summaries.error() {
            Line::from(vec![
                Span::styled(format!("Failed to load backtests: {err}"), theme::negative()),
                Span::styled("  [r]etry", theme::muted()),
            ])
        } else {
            Line::from(Span::styled("No backtests loaded.  [r]efresh", theme::muted()))
        };
        f.render_widget(Paragraph::new(vec![Line::from(""), line]), area);
        return;
    };

    if grouped.is_empty() {
        let line = Line::from(Span::styled("No backtests found.", theme::muted()));
        f.render_widget(Paragraph::new(vec![Line::from(""), line]), area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .split(area);

    // Strategy tabs
    let names: Vec<&str> = grouped.strategy_names().collect();
    let selected = app
        .filter
        .strategy
        .as_deref()
        .and_then(|current| names.iter().position(|&n| n == current));
    let tabs = Tabs::new(names.iter().map(|n| Line::from(*n)))
        .select(selected)
        .style(theme::muted())
        .highlight_style(theme::accent_bold())
        .divider(Span::styled("|", theme::muted()));
    f.render_widget(tabs, chunks[0]);

    let rows = app.filter_rows();
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(format!("{} backtests", rows.len()), theme::accent()),
            Span::styled("  [h/l]strategy [j/k]move [Enter]open [r]efresh", theme::muted()),
        ])),
        chunks[1],
    );

    render_table(f, chunks[2], rows, app.filter.cursor);
}

fn render_table(f: &mut Frame, area: Rect, summaries: &[BacktestSummary], cursor: usize) {
    let header = Row::new(
        ["CREATED", "SYMBOLS", "CAPITAL", "START", "END"]
            .into_iter()
            .map(|h| Cell::from(h).style(theme::header())),
    )
    .height(1);

    let rows = summaries.iter().map(|s| {
        Row::new(vec![
            Cell::from(truncate(&s.created_at, 19)),
            Cell::from(s.tickers.join(" | ")),
            Cell::from(format_money(s.capital)),
            Cell::from(s.start_date.clone()),
            Cell::from(s.end_date.clone()),
        ])
        .style(theme::text())
    });

    let widths = [
        Constraint::Length(20),
        Constraint::Min(16),
        Constraint::Length(14),
        Constraint::Length(12),
        Constraint::Length(12),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .row_highlight_style(theme::selected_row())
        .column_spacing(1);

    let mut state = TableState::default().with_selected(Some(cursor));
    f.render_stateful_widget(table, area, &mut state);
}
