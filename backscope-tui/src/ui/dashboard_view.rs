//! Dashboard view: open backtest tabs, parameters bar, chart grid and tables.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use backscope_core::chart::SeriesField;
use backscope_core::model::{BacktestId, BacktestParameters};
use backscope_core::session::CacheEntry;

use crate::app::{AppState, DashboardStatus, DerivedView};
use crate::theme;
use crate::ui::tables::format_money;
use crate::ui::{charts, tables, truncate};

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .split(area);

    render_tab_bar(f, chunks[0], app);

    match app.dashboard_status() {
        DashboardStatus::NoSelection => {
            render_message(
                f,
                chunks[2],
                Line::from(Span::styled(
                    "Please select a backtest to view its details.",
                    theme::muted(),
                )),
            );
        }
        DashboardStatus::Loading => {
            render_message(
                f,
                chunks[2],
                Line::from(Span::styled("Loading...", theme::warning())),
            );
        }
        DashboardStatus::Failed(err) => {
            let lines = vec![
                Line::from(Span::styled(
                    "No data available for this backtest.",
                    theme::muted(),
                )),
                Line::from(vec![
                    Span::styled(format!("[{}] {err}", err.category()), theme::negative()),
                    Span::styled("  [r]etry", theme::muted()),
                ]),
            ];
            f.render_widget(Paragraph::new(lines), chunks[2]);
        }
        DashboardStatus::Empty => {
            render_message(
                f,
                chunks[2],
                Line::from(Span::styled(
                    "No data available for this backtest.",
                    theme::muted(),
                )),
            );
        }
        DashboardStatus::Ready(derived) => {
            render_parameters(f, chunks[1], &derived.record.parameters);
            render_body(f, chunks[2], app, derived);
        }
    }
}

fn render_message(f: &mut Frame, area: Rect, line: Line<'_>) {
    f.render_widget(Paragraph::new(vec![Line::from(""), line]), area);
}

fn tab_label(app: &AppState, id: BacktestId) -> String {
    let name = app
        .session
        .summaries
        .grouped()
        .and_then(|g| g.find(id))
        .map(|s| truncate(&s.strategy_name, 14));
    let marker = match app.session.cache.entry(id) {
        Some(CacheEntry::Loading) => " …",
        Some(CacheEntry::Failed(_)) => " !",
        _ => "",
    };
    match name {
        Some(name) => format!(" #{id} {name}{marker} "),
        None => format!(" #{id}{marker} "),
    }
}

fn render_tab_bar(f: &mut Frame, area: Rect, app: &AppState) {
    let cache = &app.session.cache;
    if cache.tabs().is_empty() {
        let line = Line::from(Span::styled(
            "No open backtests. Open one from the Backtests view (1).",
            theme::muted(),
        ));
        f.render_widget(Paragraph::new(line), area);
        return;
    }

    let current = cache.current();
    let mut spans = Vec::new();
    for &id in cache.tabs() {
        let style = if Some(id) == current {
            theme::selected_row()
        } else {
            theme::muted()
        };
        spans.push(Span::styled(tab_label(app, id), style));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled("[ / ]switch [x]close", theme::muted()));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_parameters(f: &mut Frame, area: Rect, params: &BacktestParameters) {
    let line = Line::from(vec![
        Span::styled(params.strategy_name.as_str(), theme::accent_bold()),
        Span::styled("  SYMBOLS ", theme::muted()),
        Span::styled(params.tickers.join(" | "), theme::text()),
        Span::styled("  CAPITAL ", theme::muted()),
        Span::styled(format_money(params.capital), theme::text()),
        Span::styled("  START ", theme::muted()),
        Span::styled(params.test_start.as_str(), theme::text()),
        Span::styled("  END ", theme::muted()),
        Span::styled(params.test_end.as_str(), theme::text()),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn render_body(f: &mut Frame, area: Rect, app: &AppState, derived: &DerivedView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(30),
            Constraint::Percentage(40),
        ])
        .split(area);
    let top = split_halves(rows[0]);
    let middle = split_halves(rows[1]);

    let charts = &derived.charts;
    charts::render_series(f, top[0], SeriesField::Equity, &charts.equity);
    charts::render_series(f, top[1], SeriesField::DailyReturn, &charts.daily_return);
    charts::render_series(f, middle[0], SeriesField::PercentDrawdown, &charts.drawdown);
    charts::render_signals(f, middle[1], &charts.overlays, &charts.legend);

    tables::render(f, rows[2], derived, app.dashboard.table, &app.dashboard.pager);
}

fn split_halves(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area)
}
