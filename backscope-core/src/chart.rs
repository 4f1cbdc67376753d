//! Chart data pipeline: pure transforms from a backtest record into
//! chart-ready series, signal markers and legends.
//!
//! Nothing here holds state between calls. Every function is deterministic
//! for a given input and safe to re-run on each render.

use std::collections::HashMap;

use crate::model::{
    Action, BacktestRecord, OverviewRow, PricePoint, SignalEvent, Timestamp, TimeseriesPoint,
    TradeInstruction,
};

/// One `(time, value)` sample of a line series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub time: Timestamp,
    pub value: f64,
}

/// Time series column to chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesField {
    Equity,
    DailyReturn,
    CumulativeReturn,
    PercentDrawdown,
}

impl SeriesField {
    pub const ALL: [SeriesField; 4] = [
        SeriesField::Equity,
        SeriesField::DailyReturn,
        SeriesField::CumulativeReturn,
        SeriesField::PercentDrawdown,
    ];

    pub fn title(self) -> &'static str {
        match self {
            SeriesField::Equity => "Equity",
            SeriesField::DailyReturn => "Return",
            SeriesField::CumulativeReturn => "Cumulative Return",
            SeriesField::PercentDrawdown => "Drawdown",
        }
    }

    fn read(self, point: &TimeseriesPoint) -> f64 {
        match self {
            SeriesField::Equity => point.equity_value,
            SeriesField::DailyReturn => point.daily_return,
            SeriesField::CumulativeReturn => point.cumulative_return,
            SeriesField::PercentDrawdown => point.percent_drawdown,
        }
    }
}

/// Fixed ticker palette, cycled by grouping position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaletteColor {
    White,
    Gray,
    Red,
    Orange,
    Purple,
    Cyan,
    Magenta,
}

pub const PALETTE: [PaletteColor; 7] = [
    PaletteColor::White,
    PaletteColor::Gray,
    PaletteColor::Red,
    PaletteColor::Orange,
    PaletteColor::Purple,
    PaletteColor::Cyan,
    PaletteColor::Magenta,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerColor {
    Green,
    Red,
    Yellow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerShape {
    UpArrow,
    DownArrow,
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerPosition {
    AboveBar,
}

/// A signal annotation on a price line.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub time: Timestamp,
    pub position: MarkerPosition,
    pub color: MarkerColor,
    pub shape: MarkerShape,
    pub label: String,
}

/// A trade instruction lifted out of its signal event.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatInstruction {
    pub time: Timestamp,
    pub instruction: TradeInstruction,
}

/// One price line of the signal chart.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerSeries {
    pub ticker: String,
    pub points: Vec<SeriesPoint>,
}

/// Price series grouped by symbol, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerGroups {
    series: Vec<TickerSeries>,
    index: HashMap<String, usize>,
}

impl TickerGroups {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn get(&self, ticker: &str) -> Option<&TickerSeries> {
        self.index.get(ticker).map(|&i| &self.series[i])
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.ticker.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TickerSeries> {
        self.series.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub ticker: String,
    pub color: PaletteColor,
}

/// Price line plus the markers that belong to it.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerOverlay {
    pub ticker: String,
    pub color: PaletteColor,
    pub points: Vec<SeriesPoint>,
    pub markers: Vec<Marker>,
}

/// One row of the two-column overview table.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewPair {
    pub left_label: String,
    pub left_value: String,
    pub right_label: String,
    pub right_value: String,
}

pub fn extract_series(timeseries: &[TimeseriesPoint], field: SeriesField) -> Vec<SeriesPoint> {
    timeseries
        .iter()
        .map(|p| SeriesPoint {
            time: p.timestamp,
            value: field.read(p),
        })
        .collect()
}

pub fn group_by_ticker(price_data: &[PricePoint]) -> TickerGroups {
    let mut groups = TickerGroups::default();
    for p in price_data {
        let point = SeriesPoint {
            time: p.timestamp,
            value: p.close,
        };
        match groups.index.get(&p.symbol) {
            Some(&i) => groups.series[i].points.push(point),
            None => {
                groups.index.insert(p.symbol.clone(), groups.series.len());
                groups.series.push(TickerSeries {
                    ticker: p.symbol.clone(),
                    points: vec![point],
                });
            }
        }
    }
    groups
}

pub fn flatten_signals(signal_data: &[SignalEvent]) -> Vec<FlatInstruction> {
    signal_data
        .iter()
        .flat_map(|event| {
            event.trade_instructions.iter().map(move |instruction| FlatInstruction {
                time: event.timestamp,
                instruction: instruction.clone(),
            })
        })
        .collect()
}

/// Position, not identity, picks the color.
pub fn color_for_ticker(index: usize) -> PaletteColor {
    PALETTE[index % PALETTE.len()]
}

pub fn marker_for(flat: &FlatInstruction) -> Marker {
    let (color, shape) = match flat.instruction.action {
        Action::Long | Action::Cover => (MarkerColor::Green, MarkerShape::UpArrow),
        Action::Short | Action::Sell => (MarkerColor::Red, MarkerShape::DownArrow),
        Action::Other(_) => (MarkerColor::Yellow, MarkerShape::Circle),
    };
    Marker {
        time: flat.time,
        position: MarkerPosition::AboveBar,
        color,
        shape,
        label: flat.instruction.action.as_str().to_string(),
    }
}

pub fn legend_for(groups: &TickerGroups) -> Vec<LegendEntry> {
    groups
        .tickers()
        .enumerate()
        .map(|(i, ticker)| LegendEntry {
            ticker: ticker.to_string(),
            color: color_for_ticker(i),
        })
        .collect()
}

/// Price lines with their markers. Instructions for a ticker without a
/// price series are dropped.
pub fn signal_overlay(price_data: &[PricePoint], signal_data: &[SignalEvent]) -> Vec<TickerOverlay> {
    let groups = group_by_ticker(price_data);
    let flat = flatten_signals(signal_data);
    groups
        .series
        .into_iter()
        .enumerate()
        .map(|(i, series)| {
            let markers = flat
                .iter()
                .filter(|f| f.instruction.ticker == series.ticker)
                .map(marker_for)
                .collect();
            TickerOverlay {
                color: color_for_ticker(i),
                ticker: series.ticker,
                points: series.points,
                markers,
            }
        })
        .collect()
}

/// Pair the first overview row's entries two per table row.
pub fn overview_pairs(static_stats: &[OverviewRow]) -> Vec<OverviewPair> {
    let Some(row) = static_stats.first() else {
        return Vec::new();
    };
    let entries: Vec<(&String, &serde_json::Value)> = row.iter().collect();
    entries
        .chunks(2)
        .map(|chunk| {
            let (left_label, left_value) = chunk[0];
            let (right_label, right_value) = chunk
                .get(1)
                .map(|(k, v)| (overview_label(k), overview_value(v)))
                .unwrap_or_default();
            OverviewPair {
                left_label: overview_label(left_label),
                left_value: overview_value(left_value),
                right_label,
                right_value,
            }
        })
        .collect()
}

fn overview_label(key: &str) -> String {
    key.replace('_', " ").to_uppercase()
}

fn overview_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Everything the dashboard draws for one record, derived in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardCharts {
    pub equity: Vec<SeriesPoint>,
    pub daily_return: Vec<SeriesPoint>,
    pub cumulative_return: Vec<SeriesPoint>,
    pub drawdown: Vec<SeriesPoint>,
    pub overlays: Vec<TickerOverlay>,
    pub legend: Vec<LegendEntry>,
}

impl DashboardCharts {
    pub fn derive(record: &BacktestRecord) -> Self {
        let ts = &record.timeseries_data;
        let overlays = signal_overlay(&record.price_data, &record.signal_data);
        let legend = overlays
            .iter()
            .map(|o| LegendEntry {
                ticker: o.ticker.clone(),
                color: o.color,
            })
            .collect();
        Self {
            equity: extract_series(ts, SeriesField::Equity),
            daily_return: extract_series(ts, SeriesField::DailyReturn),
            cumulative_return: extract_series(ts, SeriesField::CumulativeReturn),
            drawdown: extract_series(ts, SeriesField::PercentDrawdown),
            overlays,
            legend,
        }
    }

    pub fn series(&self, field: SeriesField) -> &[SeriesPoint] {
        match field {
            SeriesField::Equity => &self.equity,
            SeriesField::DailyReturn => &self.daily_return,
            SeriesField::CumulativeReturn => &self.cumulative_return,
            SeriesField::PercentDrawdown => &self.drawdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{instruction, record, ts};
    use proptest::prelude::*;

    fn price(secs: i64, symbol: &str, close: f64) -> PricePoint {
        PricePoint {
            timestamp: ts(secs),
            symbol: symbol.to_string(),
            close,
        }
    }

    #[test]
    fn extract_series_reads_each_field() {
        let rec = record(1);
        let equity = extract_series(&rec.timeseries_data, SeriesField::Equity);
        assert_eq!(equity.len(), 3);
        assert_eq!(equity[2].value, 101_000.0);
        assert_eq!(equity[0].time, rec.timeseries_data[0].timestamp);

        let dd = extract_series(&rec.timeseries_data, SeriesField::PercentDrawdown);
        assert!(dd.iter().all(|p| p.value == 0.0));
    }

    #[test]
    fn group_by_ticker_keeps_first_seen_order() {
        let prices = vec![
            price(1, "MSFT", 10.0),
            price(1, "AAPL", 20.0),
            price(2, "MSFT", 11.0),
            price(2, "AAPL", 21.0),
            price(3, "MSFT", 12.0),
        ];
        let groups = group_by_ticker(&prices);
        assert_eq!(groups.tickers().collect::<Vec<_>>(), ["MSFT", "AAPL"]);

        let msft: Vec<f64> = groups.get("MSFT").unwrap().points.iter().map(|p| p.value).collect();
        assert_eq!(msft, [10.0, 11.0, 12.0]);
        assert!(groups.get("msft").is_none());
    }

    #[test]
    fn legend_follows_grouping_order() {
        let prices = vec![price(1, "A", 1.0), price(1, "B", 1.0), price(2, "A", 1.0)];
        let legend = legend_for(&group_by_ticker(&prices));
        assert_eq!(
            legend,
            vec![
                LegendEntry { ticker: "A".into(), color: PaletteColor::White },
                LegendEntry { ticker: "B".into(), color: PaletteColor::Gray },
            ]
        );
    }

    #[test]
    fn palette_cycles_by_position() {
        assert_eq!(color_for_ticker(0), PaletteColor::White);
        assert_eq!(color_for_ticker(6), PaletteColor::Magenta);
        assert_eq!(color_for_ticker(7), PaletteColor::White);
        assert_eq!(color_for_ticker(9), PaletteColor::Red);
    }

    #[test]
    fn flatten_signals_carries_parent_timestamp() {
        let events = vec![
            SignalEvent {
                timestamp: ts(100),
                trade_instructions: vec![instruction("A", "LONG"), instruction("B", "SHORT")],
            },
            SignalEvent {
                timestamp: ts(200),
                trade_instructions: vec![],
            },
            SignalEvent {
                timestamp: ts(300),
                trade_instructions: vec![instruction("A", "SELL")],
            },
        ];
        let flat = flatten_signals(&events);
        let summary: Vec<(i64, &str)> = flat
            .iter()
            .map(|f| (f.time.secs(), f.instruction.ticker.as_str()))
            .collect();
        assert_eq!(summary, [(100, "A"), (100, "B"), (300, "A")]);
    }

    #[test]
    fn marker_mapping() {
        let flat = |action: &str| FlatInstruction {
            time: ts(5),
            instruction: instruction("A", action),
        };

        let long = marker_for(&flat("LONG"));
        assert_eq!((long.color, long.shape), (MarkerColor::Green, MarkerShape::UpArrow));
        let cover = marker_for(&flat("COVER"));
        assert_eq!((cover.color, cover.shape), (MarkerColor::Green, MarkerShape::UpArrow));

        let short = marker_for(&flat("SHORT"));
        assert_eq!((short.color, short.shape), (MarkerColor::Red, MarkerShape::DownArrow));
        let sell = marker_for(&flat("SELL"));
        assert_eq!((sell.color, sell.shape), (MarkerColor::Red, MarkerShape::DownArrow));

        let hold = marker_for(&flat("HOLD"));
        assert_eq!((hold.color, hold.shape), (MarkerColor::Yellow, MarkerShape::Circle));
        assert_eq!(hold.label, "HOLD");
        assert_eq!(hold.position, MarkerPosition::AboveBar);
        assert_eq!(hold.time, ts(5));
    }

    #[test]
    fn overlay_drops_markers_without_price_series() {
        let prices = vec![price(1, "A", 1.0), price(1, "B", 2.0)];
        let events = vec![SignalEvent {
            timestamp: ts(1),
            trade_instructions: vec![
                instruction("A", "LONG"),
                instruction("Z", "SHORT"),
                instruction("B", "SELL"),
                instruction("A", "COVER"),
            ],
        }];
        let overlays = signal_overlay(&prices, &events);
        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[0].markers.len(), 2);
        assert_eq!(overlays[1].markers.len(), 1);
        assert_eq!(overlays[1].color, PaletteColor::Gray);
    }

    #[test]
    fn empty_inputs_yield_empty_outputs() {
        assert!(group_by_ticker(&[]).is_empty());
        assert!(flatten_signals(&[]).is_empty());
        assert!(signal_overlay(&[], &[]).is_empty());
        assert!(legend_for(&TickerGroups::default()).is_empty());
        assert!(overview_pairs(&[]).is_empty());
    }

    #[test]
    fn overview_pairs_two_keys_per_row() {
        let row: OverviewRow = serde_json::from_str(
            r#"{"net_profit": 1250.5, "total_return": "12.5%", "max_drawdown": -0.08}"#,
        )
        .unwrap();
        let pairs = overview_pairs(&[row]);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].left_label, "NET PROFIT");
        assert_eq!(pairs[0].left_value, "1250.5");
        assert_eq!(pairs[0].right_label, "TOTAL RETURN");
        assert_eq!(pairs[0].right_value, "12.5%");
        assert_eq!(pairs[1].left_label, "MAX DRAWDOWN");
        assert_eq!(pairs[1].right_label, "");
        assert_eq!(pairs[1].right_value, "");
    }

    #[test]
    fn dashboard_charts_are_idempotent() {
        let rec = record(9);
        let first = DashboardCharts::derive(&rec);
        let second = DashboardCharts::derive(&rec);
        assert_eq!(first, second);
        assert_eq!(first.legend.len(), 2);
        assert_eq!(first.series(SeriesField::Equity).len(), rec.timeseries_data.len());
    }

    fn arb_events() -> impl Strategy<Value = Vec<SignalEvent>> {
        proptest::collection::vec(
            (0i64..10_000, proptest::collection::vec("[A-D]", 0..5)),
            0..20,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .map(|(secs, tickers)| SignalEvent {
                    timestamp: ts(secs),
                    trade_instructions: tickers.iter().map(|t| instruction(t, "LONG")).collect(),
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn flatten_count_is_instruction_sum(events in arb_events()) {
            let expected: usize = events.iter().map(|e| e.trade_instructions.len()).sum();
            let flat = flatten_signals(&events);
            prop_assert_eq!(flat.len(), expected);

            let parents = events
                .iter()
                .flat_map(|e| std::iter::repeat(e.timestamp).take(e.trade_instructions.len()));
            for (f, parent) in flat.iter().zip(parents) {
                prop_assert_eq!(f.time, parent);
            }
        }

        #[test]
        fn extract_preserves_length_and_order(mut secs in proptest::collection::vec(0i64..1_000_000, 0..100)) {
            secs.sort_unstable();
            let points: Vec<TimeseriesPoint> = secs
                .iter()
                .map(|&s| TimeseriesPoint {
                    timestamp: ts(s),
                    equity_value: s as f64,
                    daily_return: 0.0,
                    cumulative_return: 0.0,
                    percent_drawdown: 0.0,
                })
                .collect();
            for field in SeriesField::ALL {
                let series = extract_series(&points, field);
                prop_assert_eq!(series.len(), points.len());
                prop_assert!(series.windows(2).all(|w| w[0].time <= w[1].time));
            }
        }

        #[test]
        fn legend_matches_group_iteration(symbols in proptest::collection::vec("[A-H]{1,2}", 0..40)) {
            let prices: Vec<PricePoint> = symbols
                .iter()
                .enumerate()
                .map(|(i, s)| price(i as i64, s, 1.0))
                .collect();
            let groups = group_by_ticker(&prices);
            let legend = legend_for(&groups);
            let tickers: Vec<&str> = groups.tickers().collect();
            let legend_tickers: Vec<&str> = legend.iter().map(|l| l.ticker.as_str()).collect();
            prop_assert_eq!(legend_tickers, tickers);
            for (i, entry) in legend.iter().enumerate() {
                prop_assert_eq!(entry.color, color_for_ticker(i));
            }
        }
    }
}
