//! Dashboard tables: overview, trades and signals, one page at a time.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use ratatui::Frame;

use backscope_core::model::{SignalEvent, Timestamp, TradeInstruction};
use backscope_core::pagination::Paginator;

use crate::app::{DerivedView, TableKind};
use crate::theme;

/// `$1,234,567.89`
pub fn format_money(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let cents = format!("{:.2}", value.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}.{frac}")
}

/// One rendered row of the signals table.
#[derive(Debug, PartialEq)]
pub struct SignalRow<'a> {
    /// Set on the first instruction of each event only.
    pub time: Option<Timestamp>,
    pub instruction: &'a TradeInstruction,
}

/// Expand a page of signal events into instruction rows.
pub fn signal_rows(events: &[SignalEvent]) -> Vec<SignalRow<'_>> {
    events
        .iter()
        .flat_map(|event| {
            event
                .trade_instructions
                .iter()
                .enumerate()
                .map(move |(i, instruction)| SignalRow {
                    time: (i == 0).then_some(event.timestamp),
                    instruction,
                })
        })
        .collect()
}

pub fn render<K: PartialEq>(
    f: &mut Frame,
    area: Rect,
    derived: &DerivedView,
    kind: TableKind,
    pager: &Paginator<K>,
) {
    let title = table_title(kind);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(false))
        .title(title)
        .title_style(theme::panel_title(true));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    if derived.table_len(kind) == 0 {
        let msg = Paragraph::new(Span::styled(
            format!("No {} data available.", kind.label().to_lowercase()),
            theme::muted(),
        ));
        f.render_widget(msg, chunks[0]);
        return;
    }

    match kind {
        TableKind::Overview => render_overview(f, chunks[0], derived, pager),
        TableKind::Trades => render_trades(f, chunks[0], derived, pager),
        TableKind::Signals => render_signals(f, chunks[0], derived, pager),
    }

    render_page_indicator(f, chunks[1], pager);
}

fn table_title(kind: TableKind) -> Line<'static> {
    let mut spans = vec![Span::raw(" ")];
    for (i, k) in TableKind::ALL.into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", theme::muted()));
        }
        let style = if k == kind {
            theme::accent_bold()
        } else {
            theme::muted()
        };
        spans.push(Span::styled(k.label(), style));
    }
    spans.push(Span::styled(" [o/t/s] ", theme::muted()));
    Line::from(spans)
}

fn render_page_indicator<K: PartialEq>(f: &mut Frame, area: Rect, pager: &Paginator<K>) {
    let prev = if pager.has_previous() { "[p]rev " } else { "" };
    let next = if pager.has_next() { " [n]ext" } else { "" };
    let line = Line::from(vec![
        Span::styled(prev, theme::muted()),
        Span::styled(
            format!("Page {} of {}", pager.current_page(), pager.total_pages()),
            theme::accent(),
        ),
        Span::styled(next, theme::muted()),
        Span::styled(format!("  ({} rows)", pager.len()), theme::muted()),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn header_row<'a>(cells: &[&'a str]) -> Row<'a> {
    Row::new(cells.iter().map(|h| Cell::from(*h).style(theme::header()))).height(1)
}

fn render_overview<K: PartialEq>(
    f: &mut Frame,
    area: Rect,
    derived: &DerivedView,
    pager: &Paginator<K>,
) {
    let rows = pager.current_items(&derived.overview).iter().map(|pair| {
        Row::new(vec![
            Cell::from(pair.left_label.as_str()).style(theme::muted()),
            Cell::from(pair.left_value.as_str()).style(theme::text()),
            Cell::from(pair.right_label.as_str()).style(theme::muted()),
            Cell::from(pair.right_value.as_str()).style(theme::text()),
        ])
    });
    let widths = [
        Constraint::Percentage(25),
        Constraint::Percentage(25),
        Constraint::Percentage(25),
        Constraint::Percentage(25),
    ];
    f.render_widget(Table::new(rows, widths).column_spacing(1), area);
}

fn render_trades<K: PartialEq>(
    f: &mut Frame,
    area: Rect,
    derived: &DerivedView,
    pager: &Paginator<K>,
) {
    let header = header_row(&[
        "TIMESTAMP", "TRADE", "LEG", "TICKER", "QTY", "PRICE", "COST", "ACTION",
    ]);
    let rows = pager.current_items(&derived.record.trades).iter().map(|t| {
        Row::new(vec![
            Cell::from(t.timestamp.to_string()),
            Cell::from(t.trade_id.to_string()),
            Cell::from(t.leg_id.to_string()),
            Cell::from(t.ticker.as_str()),
            Cell::from(format!("{:.2}", t.quantity)),
            Cell::from(format_money(t.price)),
            Cell::from(format_money(t.cost)),
            Cell::from(t.action.as_str())
                .style(Style::default().fg(theme::action_color(&t.action))),
        ])
        .style(theme::text())
    });
    let widths = [
        Constraint::Length(19),
        Constraint::Length(6),
        Constraint::Length(4),
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(12),
        Constraint::Length(14),
        Constraint::Min(6),
    ];
    f.render_widget(
        Table::new(rows, widths).header(header).column_spacing(1),
        area,
    );
}

/// Pages are over signal events; each event expands to its instructions.
fn render_signals<K: PartialEq>(
    f: &mut Frame,
    area: Rect,
    derived: &DerivedView,
    pager: &Paginator<K>,
) {
    let header = header_row(&["TIMESTAMP", "TICKER", "ACTION", "LEG", "ALLOCATION"]);
    let events = pager.current_items(&derived.record.signal_data);
    let rows = signal_rows(events).into_iter().map(|row| {
        let action = &row.instruction.action;
        Row::new(vec![
            Cell::from(row.time.map(|t| t.to_string()).unwrap_or_default()),
            Cell::from(row.instruction.ticker.as_str()),
            Cell::from(action.as_str()).style(Style::default().fg(theme::action_color(action))),
            Cell::from(row.instruction.leg_id.to_string()),
            Cell::from(format!("{:.2}%", row.instruction.allocation_percent)),
        ])
        .style(theme::text())
    });
    let widths = [
        Constraint::Length(19),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(4),
        Constraint::Min(10),
    ];
    f.render_widget(
        Table::new(rows, widths).header(header).column_spacing(1),
        area,
    );
}
