//! Dashboard charts: Braille line charts for the time series and a canvas
//! for price lines with signal markers.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine, Points};
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph};
use ratatui::Frame;

use backscope_core::chart::{LegendEntry, MarkerPosition, SeriesField, SeriesPoint, TickerOverlay};
use backscope_core::model::Timestamp;

use crate::theme;

/// Padded `[min, max]` of `values`, or `None` when empty. A flat series gets
/// a unit-wide band so the axis never collapses.
pub fn padded_bounds(values: impl IntoIterator<Item = f64>) -> Option<[f64; 2]> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })?;
    if (max - min).abs() < f64::EPSILON {
        return Some([min - 1.0, max + 1.0]);
    }
    let padding = (max - min) * 0.05;
    Some([min - padding, max + padding])
}

/// Price a marker hangs off: the last close at or before `time`, else the
/// first close.
pub fn marker_anchor(points: &[SeriesPoint], time: Timestamp) -> Option<f64> {
    points
        .iter()
        .take_while(|p| p.time <= time)
        .last()
        .or_else(|| points.first())
        .map(|p| p.value)
}

fn chart_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(false))
        .title(format!(" {title} "))
        .title_style(theme::panel_title(false))
}

fn render_empty(f: &mut Frame, area: Rect, title: &str) {
    let para = Paragraph::new(Span::styled("No data", theme::muted())).block(chart_block(title));
    f.render_widget(para, area);
}

fn value_label(field: SeriesField, value: f64) -> String {
    match field {
        SeriesField::Equity => format!("{value:.0}"),
        _ => format!("{value:.2}"),
    }
}

fn time_labels(first: Timestamp, last: Timestamp) -> Vec<Span<'static>> {
    vec![
        Span::styled(first.to_string(), theme::muted()),
        Span::styled(last.to_string(), theme::muted()),
    ]
}

/// One time-series line chart.
pub fn render_series(f: &mut Frame, area: Rect, field: SeriesField, points: &[SeriesPoint]) {
    let title = field.title();
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        render_empty(f, area, title);
        return;
    };
    let Some([y_min, y_max]) = padded_bounds(points.iter().map(|p| p.value)) else {
        render_empty(f, area, title);
        return;
    };
    let x_min = first.time.as_f64();
    let x_max = last.time.as_f64().max(x_min + 1.0);

    let color = match field {
        SeriesField::Equity | SeriesField::CumulativeReturn => theme::ACCENT,
        SeriesField::DailyReturn => theme::NEUTRAL,
        SeriesField::PercentDrawdown => theme::NEGATIVE,
    };

    let data: Vec<(f64, f64)> = points.iter().map(|p| (p.time.as_f64(), p.value)).collect();
    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .style(Style::default().fg(color))
        .graph_type(GraphType::Line)
        .data(&data);

    let chart = Chart::new(vec![dataset])
        .block(chart_block(title))
        .x_axis(
            Axis::default()
                .style(theme::muted())
                .bounds([x_min, x_max])
                .labels(time_labels(first.time, last.time)),
        )
        .y_axis(
            Axis::default()
                .style(theme::muted())
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::styled(value_label(field, y_min), theme::muted()),
                    Span::styled(value_label(field, y_max), theme::muted()),
                ]),
        );

    f.render_widget(chart, area);
}

/// Price lines per ticker with signal markers, plus the legend row.
pub fn render_signals(
    f: &mut Frame,
    area: Rect,
    overlays: &[TickerOverlay],
    legend: &[LegendEntry],
) {
    let title = "Signals";
    let points = || overlays.iter().flat_map(|o| o.points.iter());
    let x = padded_bounds(points().map(|p| p.time.as_f64()));
    let y = padded_bounds(points().map(|p| p.value));
    let (Some(x_bounds), Some(y_bounds)) = (x, y) else {
        render_empty(f, area, title);
        return;
    };
    let lift = (y_bounds[1] - y_bounds[0]) * 0.04;

    let block = chart_block(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let canvas = Canvas::default()
        .marker(symbols::Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            for overlay in overlays {
                let color = theme::palette_color(overlay.color);
                if let [only] = overlay.points.as_slice() {
                    ctx.draw(&Points {
                        coords: &[(only.time.as_f64(), only.value)],
                        color,
                    });
                }
                for pair in overlay.points.windows(2) {
                    ctx.draw(&CanvasLine::new(
                        pair[0].time.as_f64(),
                        pair[0].value,
                        pair[1].time.as_f64(),
                        pair[1].value,
                        color,
                    ));
                }
            }
            // Markers on their own layer so lines never overwrite them.
            ctx.layer();
            for overlay in overlays {
                for marker in &overlay.markers {
                    let Some(price) = marker_anchor(&overlay.points, marker.time) else {
                        continue;
                    };
                    let y = match marker.position {
                        MarkerPosition::AboveBar => price + lift,
                    };
                    ctx.print(
                        marker.time.as_f64(),
                        y,
                        Span::styled(
                            theme::marker_glyph(marker.shape),
                            Style::default().fg(theme::marker_color(marker.color)),
                        ),
                    );
                }
            }
        });
    f.render_widget(canvas, chunks[0]);

    let mut spans = Vec::with_capacity(legend.len() * 2);
    for entry in legend {
        spans.push(Span::styled(
            "■ ",
            Style::default().fg(theme::palette_color(entry.color)),
        ));
        spans.push(Span::styled(format!("{}  ", entry.ticker), theme::text()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), chunks[1]);
}
