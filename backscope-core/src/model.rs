//! Domain types for backtest summaries and full backtest records.
//!
//! Payloads from the remote API are loosely typed: ids arrive as numbers or
//! numeric strings, decimals arrive as strings, timestamps arrive as UNIX
//! seconds or ISO strings. Everything is normalized here, at the I/O boundary,
//! so the chart pipeline and the session cache only ever see typed values.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::MalformedRecord;

/// Server-side identifier of a backtest run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "IdRepr", into = "u64")]
pub struct BacktestId(u64);

impl BacktestId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BacktestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<BacktestId> for u64 {
    fn from(id: BacktestId) -> Self {
        id.0
    }
}

impl FromStr for BacktestId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(BacktestId)
            .map_err(|_| format!("invalid backtest id: {s:?}"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u64),
    Text(String),
}

impl TryFrom<IdRepr> for BacktestId {
    type Error = String;

    fn try_from(repr: IdRepr) -> Result<Self, Self::Error> {
        match repr {
            IdRepr::Number(n) => Ok(BacktestId(n)),
            IdRepr::Text(s) => s.parse(),
        }
    }
}

/// Point in time as UNIX seconds (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub fn secs(self) -> i64 {
        self.0
    }

    /// Chart x-coordinate.
    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }

    /// Parse UNIX seconds, RFC 3339, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(secs) = raw.parse::<i64>() {
            return Some(Self(secs));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(dt.timestamp()));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(Self(dt.and_utc().timestamp()));
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Self(dt.and_utc().timestamp()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::from_timestamp(self.0, 0) {
            Some(dt) if dt.num_seconds_from_midnight() == 0 => {
                write!(f, "{}", dt.format("%Y-%m-%d"))
            }
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, "{}", self.0),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl Visitor<'_> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("UNIX seconds or an ISO-8601 date/time string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Timestamp, E> {
                Ok(Timestamp(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Timestamp, E> {
                i64::try_from(v)
                    .map(Timestamp)
                    .map_err(|_| E::custom(format!("timestamp out of range: {v}")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Timestamp, E> {
                if v.is_finite() {
                    Ok(Timestamp(v.trunc() as i64))
                } else {
                    Err(E::custom("timestamp is not finite"))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
                Timestamp::parse(v).ok_or_else(|| E::custom(format!("unrecognized timestamp: {v:?}")))
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}

/// Numbers that may arrive as JSON numbers or as decimal strings.
mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| D::Error::custom(format!("expected a number, got {s:?}"))),
        }
    }
}

/// Trade or signal action. Unknown actions are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Long,
    Short,
    Cover,
    Sell,
    Other(String),
}

impl Action {
    /// Exact, case-sensitive match on the wire value.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "LONG" => Action::Long,
            "SHORT" => Action::Short,
            "COVER" => Action::Cover,
            "SELL" => Action::Sell,
            other => Action::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::Long => "LONG",
            Action::Short => "SHORT",
            Action::Cover => "COVER",
            Action::Sell => "SELL",
            Action::Other(raw) => raw,
        }
    }
}

impl From<String> for Action {
    fn from(raw: String) -> Self {
        Action::parse(&raw)
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the backtest list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub id: BacktestId,
    pub strategy_name: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub capital: f64,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    /// Raw strategy parameters, usually a JSON document encoded as a string.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

impl BacktestSummary {
    /// Decode and validate the summary list endpoint body.
    pub fn list_from_json(body: &str) -> Result<Vec<Self>, MalformedRecord> {
        let summaries: Vec<Self> = serde_json::from_str(body)?;
        for summary in &summaries {
            summary.validate()?;
        }
        Ok(summaries)
    }

    pub fn validate(&self) -> Result<(), MalformedRecord> {
        if self.strategy_name.trim().is_empty() {
            return Err(MalformedRecord::new(format!(
                "summary {} has no strategy_name",
                self.id
            )));
        }
        Ok(())
    }

    /// Decoded `parameters`, parsing the string form if needed.
    pub fn parsed_parameters(&self) -> Result<Option<serde_json::Value>, MalformedRecord> {
        match &self.parameters {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(raw)) if raw.trim().is_empty() => Ok(None),
            Some(serde_json::Value::String(raw)) => Ok(Some(serde_json::from_str(raw)?)),
            Some(other) => Ok(Some(other.clone())),
        }
    }
}

/// Header parameters of a full backtest record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestParameters {
    pub strategy_name: String,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub capital: f64,
    #[serde(default, alias = "start_date")]
    pub test_start: String,
    #[serde(default, alias = "end_date")]
    pub test_end: String,
}

/// One simulated period of the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    pub timestamp: Timestamp,
    #[serde(deserialize_with = "lenient::number")]
    pub equity_value: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub daily_return: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub cumulative_return: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub percent_drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: Timestamp,
    #[serde(alias = "ticker")]
    pub symbol: String,
    #[serde(deserialize_with = "lenient::number")]
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeInstruction {
    #[serde(alias = "symbol")]
    pub ticker: String,
    #[serde(alias = "direction")]
    pub action: Action,
    pub leg_id: u64,
    #[serde(alias = "weight", deserialize_with = "lenient::number")]
    pub allocation_percent: f64,
}

/// A timestamped set of proposed position changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    #[serde(alias = "time")]
    pub timestamp: Timestamp,
    pub trade_instructions: Vec<TradeInstruction>,
}

/// An executed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: Timestamp,
    pub trade_id: u64,
    pub leg_id: u64,
    #[serde(alias = "symbol")]
    pub ticker: String,
    #[serde(deserialize_with = "lenient::number")]
    pub quantity: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub price: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub cost: f64,
    #[serde(alias = "direction")]
    pub action: Action,
}

/// Statistic name to value, in server order.
pub type OverviewRow = serde_json::Map<String, serde_json::Value>;

/// Full detail of one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRecord {
    #[serde(default)]
    pub id: BacktestId,
    pub parameters: BacktestParameters,
    #[serde(alias = "timeseriesData")]
    pub timeseries_data: Vec<TimeseriesPoint>,
    #[serde(alias = "priceData")]
    pub price_data: Vec<PricePoint>,
    #[serde(alias = "signalData")]
    pub signal_data: Vec<SignalEvent>,
    pub trades: Vec<Trade>,
    pub static_stats: Vec<OverviewRow>,
}

impl BacktestRecord {
    /// Decode and validate the detail endpoint body for `requested`.
    ///
    /// A body without an `id` inherits the requested one; a body carrying a
    /// different id is rejected.
    pub fn from_json(requested: BacktestId, body: &str) -> Result<Self, MalformedRecord> {
        let mut value: serde_json::Value = serde_json::from_str(body)?;
        // `null` or a missing key both mean "no id"; `0` is a real id.
        let raw_id = value.as_object_mut().and_then(|o| o.remove("id"));
        let wire_id: Option<BacktestId> = match raw_id {
            Some(raw) => serde_json::from_value(raw)?,
            None => None,
        };
        if let Some(received) = wire_id.filter(|&id| id != requested) {
            return Err(MalformedRecord::new(format!(
                "requested backtest {requested} but received {received}"
            )));
        }
        let mut record: Self = serde_json::from_value(value)?;
        record.id = requested;
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), MalformedRecord> {
        if self.parameters.strategy_name.trim().is_empty() {
            return Err(MalformedRecord::new(format!(
                "backtest {} has no strategy_name",
                self.id
            )));
        }
        if let Some(pair) = self
            .timeseries_data
            .windows(2)
            .find(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(MalformedRecord::new(format!(
                "backtest {} timeseries out of order at {}",
                self.id, pair[1].timestamp
            )));
        }
        Ok(())
    }

    /// Valid response with zero rows everywhere.
    pub fn is_empty(&self) -> bool {
        self.timeseries_data.is_empty()
            && self.price_data.is_empty()
            && self.signal_data.is_empty()
            && self.trades.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const RECORD_JSON: &str = r#"{
        "parameters": {
            "strategy_name": "ZScoreReversion",
            "tickers": ["HE.n.0", "ZC.n.0"],
            "capital": "100000.00",
            "test_start": "2023-01-01",
            "test_end": "2023-02-01"
        },
        "timeseriesData": [
            {"timestamp": 1672531200, "equity_value": "100000.0", "daily_return": 0, "cumulative_return": 0, "percent_drawdown": 0},
            {"timestamp": "2023-01-02", "equity_value": 100500.0, "daily_return": 0.005, "cumulative_return": 0.005, "percent_drawdown": 0}
        ],
        "priceData": [
            {"timestamp": 1672531200, "symbol": "HE.n.0", "close": "81.25"}
        ],
        "signalData": [
            {"timestamp": 1672531200, "trade_instructions": [
                {"ticker": "HE.n.0", "action": "LONG", "leg_id": 1, "weight": 0.5},
                {"ticker": "ZC.n.0", "action": "HOLD", "leg_id": 2, "allocation_percent": "0.5"}
            ]}
        ],
        "trades": [
            {"timestamp": "2023-01-01T00:00:00Z", "trade_id": 1, "leg_id": 1, "symbol": "HE.n.0",
             "quantity": 10, "price": 81.25, "cost": 812.5, "action": "LONG"}
        ],
        "static_stats": [{"net_profit": 500.0, "total_return": 0.005, "max_drawdown": 0.0}]
    }"#;

    #[test]
    fn decodes_loose_wire_format() {
        let record = BacktestRecord::from_json(BacktestId::new(7), RECORD_JSON).unwrap();
        assert_eq!(record.id, BacktestId::new(7));
        assert_eq!(record.parameters.capital, 100_000.0);
        assert_eq!(record.timeseries_data.len(), 2);
        assert_eq!(record.timeseries_data[1].timestamp, Timestamp::from_secs(1_672_617_600));
        assert_eq!(record.price_data[0].close, 81.25);

        let instructions = &record.signal_data[0].trade_instructions;
        assert_eq!(instructions[0].allocation_percent, 0.5);
        assert_eq!(instructions[1].action, Action::Other("HOLD".into()));

        assert_eq!(record.trades[0].ticker, "HE.n.0");
        assert_eq!(record.trades[0].action, Action::Long);

        let keys: Vec<&String> = record.static_stats[0].keys().collect();
        assert_eq!(keys, ["net_profit", "total_return", "max_drawdown"]);
    }

    #[test]
    fn mismatched_id_is_rejected() {
        let body = RECORD_JSON.replacen('{', r#"{"id": 8,"#, 1);
        let err = BacktestRecord::from_json(BacktestId::new(7), &body).unwrap_err();
        assert!(err.0.contains("received 8"));
    }

    #[test]
    fn explicit_zero_id_is_not_treated_as_absent() {
        let body = RECORD_JSON.replacen('{', r#"{"id": 0,"#, 1);
        let err = BacktestRecord::from_json(BacktestId::new(7), &body).unwrap_err();
        assert!(err.0.contains("received 0"));

        let matching = RECORD_JSON.replacen('{', r#"{"id": "7","#, 1);
        let record = BacktestRecord::from_json(BacktestId::new(7), &matching).unwrap();
        assert_eq!(record.id, BacktestId::new(7));

        let null = RECORD_JSON.replacen('{', r#"{"id": null,"#, 1);
        let record = BacktestRecord::from_json(BacktestId::new(7), &null).unwrap();
        assert_eq!(record.id, BacktestId::new(7));
    }

    #[test]
    fn missing_field_is_malformed() {
        let body = r#"{"parameters": {"strategy_name": "X", "capital": 1}}"#;
        let err = BacktestRecord::from_json(BacktestId::new(1), body).unwrap_err();
        assert!(err.0.contains("timeseries_data"), "{}", err.0);
    }

    #[test]
    fn out_of_order_timeseries_is_malformed() {
        let mut record = fixtures::record(3);
        record.timeseries_data.reverse();
        assert!(record.validate().is_err());
    }

    #[test]
    fn empty_strategy_name_is_malformed() {
        let mut record = fixtures::record(3);
        record.parameters.strategy_name = "  ".into();
        assert!(record.validate().is_err());

        let mut summary = fixtures::summary(1, "");
        assert!(summary.validate().is_err());
        summary.strategy_name = "Momentum".into();
        assert!(summary.validate().is_ok());
    }

    #[test]
    fn empty_dataset_is_not_an_error() {
        let mut record = fixtures::record(3);
        record.timeseries_data.clear();
        record.price_data.clear();
        record.signal_data.clear();
        record.trades.clear();
        assert!(record.validate().is_ok());
        assert!(record.is_empty());
    }

    #[test]
    fn summary_list_accepts_string_ids_and_parameters() {
        let body = r#"[
            {"id": "12", "strategy_name": "Momentum", "created_at": "2024-03-01T10:00:00",
             "tickers": ["AAPL"], "capital": "5000.00", "start_date": "2023-01-01",
             "end_date": "2023-06-30", "parameters": "{\"lookback\": 20}"}
        ]"#;
        let summaries = BacktestSummary::list_from_json(body).unwrap();
        assert_eq!(summaries[0].id, BacktestId::new(12));
        assert_eq!(summaries[0].capital, 5000.0);
        let params = summaries[0].parsed_parameters().unwrap().unwrap();
        assert_eq!(params["lookback"], 20);
    }

    #[test]
    fn summary_list_without_strategy_is_malformed() {
        let body = r#"[{"id": 1, "strategy_name": "", "capital": 1}]"#;
        assert!(BacktestSummary::list_from_json(body).is_err());
    }

    #[test]
    fn timestamp_parsing_and_display() {
        assert_eq!(Timestamp::parse("1672531200"), Some(Timestamp::from_secs(1_672_531_200)));
        assert_eq!(Timestamp::parse("2023-01-01"), Some(Timestamp::from_secs(1_672_531_200)));
        assert_eq!(
            Timestamp::parse("2023-01-01T09:30:00+00:00"),
            Some(Timestamp::from_secs(1_672_565_400))
        );
        assert_eq!(Timestamp::parse("yesterday"), None);

        assert_eq!(Timestamp::from_secs(1_672_531_200).to_string(), "2023-01-01");
        assert_eq!(Timestamp::from_secs(1_672_565_400).to_string(), "2023-01-01 09:30:00");
    }

    #[test]
    fn action_round_trips_raw_label() {
        assert_eq!(Action::parse("COVER"), Action::Cover);
        assert_eq!(Action::parse("long"), Action::Other("long".into()));
        assert_eq!(Action::parse("HOLD").as_str(), "HOLD");
        assert_eq!(String::from(Action::Sell), "SELL");
    }

    #[test]
    fn backtest_id_from_str() {
        assert_eq!(" 42 ".parse::<BacktestId>(), Ok(BacktestId::new(42)));
        assert!("abc".parse::<BacktestId>().is_err());
    }
}
