//! CSV candle ingest.
//!
//! Expected header: `timestamp,open,high,low,close,volume`. Timestamps are
//! RFC 3339 or epoch milliseconds and must be strictly ascending. Loading
//! fails loudly on the first defect, reporting the data row number with the
//! header counted as line 1. Gaps are tolerated (the engine resets across
//! them) but counted so callers can report them.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tradewind_core::domain::{validate_series, Candle, SeriesDefect, Timeframe};

/// Errors raised while reading a candle CSV.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open data file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unrecognized timestamp '{value}' (expected RFC 3339 or epoch milliseconds)")]
    Timestamp { row: usize, value: String },
    #[error("row {row}: timestamp is not after the previous row")]
    OutOfOrder { row: usize },
    #[error("row {row}: duplicate timestamp")]
    Duplicate { row: usize },
    #[error("row {row}: {reason}")]
    Malformed { row: usize, reason: String },
    #[error("data file '{path}' contains no candles")]
    Empty { path: PathBuf },
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// A loaded series plus what the ingest noticed about it.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub candles: Vec<Candle>,
    /// Spacing breaks wider than the timeframe. Informational; the engine
    /// handles them by resetting its state.
    pub gaps: usize,
}

/// Read a candle series from `path` and validate it against `timeframe`.
pub fn load_candles(path: impl AsRef<Path>, timeframe: Timeframe) -> Result<LoadedSeries, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(file);

    let mut candles: Vec<Candle> = Vec::new();
    for (i, record) in reader.deserialize::<CandleRow>().enumerate() {
        // Data rows start at line 2; line 1 is the header.
        let row = i + 2;
        let parsed = record?;
        let timestamp = parse_timestamp(&parsed.timestamp).ok_or_else(|| LoadError::Timestamp {
            row,
            value: parsed.timestamp.clone(),
        })?;

        if let Some(previous) = candles.last() {
            if timestamp == previous.timestamp {
                return Err(LoadError::Duplicate { row });
            }
            if timestamp < previous.timestamp {
                return Err(LoadError::OutOfOrder { row });
            }
        }

        let candle = Candle {
            timestamp,
            open: parsed.open,
            high: parsed.high,
            low: parsed.low,
            close: parsed.close,
            volume: parsed.volume,
        };
        check_values(row, &candle)?;
        candles.push(candle);
    }

    if candles.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    let gaps = validate_series(&candles, timeframe)
        .iter()
        .filter(|defect| matches!(defect, SeriesDefect::Gap { .. }))
        .count();

    Ok(LoadedSeries { candles, gaps })
}

fn check_values(row: usize, candle: &Candle) -> Result<(), LoadError> {
    let values = [
        candle.open,
        candle.high,
        candle.low,
        candle.close,
        candle.volume,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(LoadError::Malformed {
            row,
            reason: "non-finite price or volume".to_string(),
        });
    }
    if candle.volume < 0.0 {
        return Err(LoadError::Malformed {
            row,
            reason: "volume is negative".to_string(),
        });
    }
    if !candle.is_sane() {
        return Err(LoadError::Malformed {
            row,
            reason: "OHLC values are inconsistent (high/low must bound open and close)".to_string(),
        });
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(millis) = raw.parse::<i64>() {
            return Utc.timestamp_millis_opt(millis).single();
        }
    }
    None
}

/// Restrict a series to an inclusive date window.
///
/// `start` clips candles before that day's midnight; `end` keeps the whole
/// end day. Out-of-range bounds leave the corresponding side unclipped.
pub fn clip(candles: &[Candle], start: Option<NaiveDate>, end: Option<NaiveDate>) -> &[Candle] {
    let lower = match start {
        Some(date) => {
            let bound = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
            candles.partition_point(|c| c.timestamp < bound)
        }
        None => 0,
    };
    let upper = match end.and_then(|date| date.succ_opt()) {
        Some(next_day) => {
            let bound = Utc.from_utc_datetime(&next_day.and_time(NaiveTime::MIN));
            candles.partition_point(|c| c.timestamp < bound)
        }
        None => candles.len(),
    };
    &candles[lower..upper.max(lower)]
}
