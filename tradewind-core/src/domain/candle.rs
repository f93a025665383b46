//! Candle — the fundamental market data unit.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle for a single pair at a single timestamp.
///
/// Immutable once produced. Within a (pair, timeframe) stream candles are
/// ordered strictly by timestamp with no duplicates; the stream validators
/// in [`validate_series`] and the indicator engine enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Basic OHLCV sanity check: high bounds the range, prices positive.
    pub fn is_sane(&self) -> bool {
        !self.open.is_nan()
            && !self.high.is_nan()
            && !self.low.is_nan()
            && !self.close.is_nan()
            && !self.volume.is_nan()
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// (high + low + close) / 3, the usual anchor for volatility ratios.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Candle interval. Determines the expected spacing between consecutive
/// timestamps in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
        }
    }

    /// Parse the exchange-style shorthand ("1m", "4h", "1d").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Timeframe::M1),
            "5m" => Some(Timeframe::M5),
            "15m" => Some(Timeframe::M15),
            "1h" => Some(Timeframe::H1),
            "4h" => Some(Timeframe::H4),
            "1d" => Some(Timeframe::D1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

/// A defect found while validating a candle series.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesDefect {
    /// Timestamp at `index` is not strictly after its predecessor.
    OutOfOrder { index: usize },
    /// Candle at `index` fails the OHLCV sanity check.
    Insane { index: usize },
    /// Spacing before `index` exceeds the timeframe (missing candles).
    Gap { index: usize, missing: i64 },
}

/// Validate ordering, sanity, and spacing of a candle series.
///
/// Gaps are reported, never repaired: the decision pipeline treats a gap as
/// a warmup reset, so silently interpolating here would hide exactly the
/// condition downstream code must react to.
pub fn validate_series(candles: &[Candle], timeframe: Timeframe) -> Vec<SeriesDefect> {
    let mut defects = Vec::new();
    let step = timeframe.duration();

    for (i, candle) in candles.iter().enumerate() {
        if !candle.is_sane() {
            defects.push(SeriesDefect::Insane { index: i });
        }
        if i == 0 {
            continue;
        }
        let prev = &candles[i - 1];
        if candle.timestamp <= prev.timestamp {
            defects.push(SeriesDefect::OutOfOrder { index: i });
        } else {
            let delta = candle.timestamp - prev.timestamp;
            if delta > step {
                let missing = delta.num_seconds() / step.num_seconds() - 1;
                defects.push(SeriesDefect::Gap { index: i, missing });
            }
        }
    }

    defects
}
