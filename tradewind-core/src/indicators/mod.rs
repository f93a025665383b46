//! Streaming technical indicators and the engine that feeds them.
//!
//! Every indicator is an incremental state machine: `update` consumes one
//! candle's worth of data in O(1) and yields `None` until its warmup is
//! satisfied. [`IndicatorEngine`] owns one state per configured indicator
//! plus a bounded candle buffer, and emits a full [`IndicatorSnapshot`] per
//! appended candle once all indicators are live.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod wilder;

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::candle::Candle;
use crate::error::EngineError;

pub use adx::Adx;
pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBands};
pub use ema::Ema;
pub use macd::{Macd, MacdOutput};
pub use rsi::Rsi;
pub use sma::Sma;

/// Periods for every indicator the pipeline computes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndicatorConfig {
    pub sma_short: usize,
    pub sma_long: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub adx_period: usize,
    pub bollinger_period: usize,
    pub bollinger_std: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma_short: 20,
            sma_long: 50,
            rsi_period: 14,
            atr_period: 14,
            adx_period: 14,
            bollinger_period: 20,
            bollinger_std: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let periods = [
            ("sma_short", self.sma_short),
            ("sma_long", self.sma_long),
            ("rsi_period", self.rsi_period),
            ("atr_period", self.atr_period),
            ("adx_period", self.adx_period),
            ("bollinger_period", self.bollinger_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
        ];
        for (name, period) in periods {
            if period == 0 {
                return Err(EngineError::Configuration(format!(
                    "indicator period `{name}` must be at least 1"
                )));
            }
        }
        if self.sma_short >= self.sma_long {
            return Err(EngineError::Configuration(format!(
                "sma_short ({}) must be shorter than sma_long ({})",
                self.sma_short, self.sma_long
            )));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(EngineError::Configuration(format!(
                "macd_fast ({}) must be shorter than macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }
        if !self.bollinger_std.is_finite() || self.bollinger_std <= 0.0 {
            return Err(EngineError::Configuration(format!(
                "bollinger_std must be a positive number, got {}",
                self.bollinger_std
            )));
        }
        Ok(())
    }
}

/// One row of indicator values, all computed from the same candle.
///
/// Only produced once every indicator is past warmup, so the fields are
/// plain `f64`s rather than options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub rsi: f64,
    pub atr: f64,
    pub adx: f64,
    pub bollinger: BollingerBands,
    pub macd: MacdOutput,
}

impl IndicatorSnapshot {
    /// ATR as a fraction of price, the realized-volatility proxy used by
    /// regime detection.
    pub fn atr_ratio(&self) -> f64 {
        if self.close == 0.0 {
            0.0
        } else {
            self.atr / self.close
        }
    }

    /// Name-based accessor for reporting and generic parameter sweeps.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "close" => Some(self.close),
            "sma_short" => Some(self.sma_short),
            "sma_long" => Some(self.sma_long),
            "rsi" => Some(self.rsi),
            "atr" => Some(self.atr),
            "atr_ratio" => Some(self.atr_ratio()),
            "adx" => Some(self.adx),
            "bb_upper" => Some(self.bollinger.upper),
            "bb_middle" => Some(self.bollinger.middle),
            "bb_lower" => Some(self.bollinger.lower),
            "bb_width" => Some(self.bollinger.width()),
            "macd" => Some(self.macd.line),
            "macd_signal" => Some(self.macd.signal),
            "macd_histogram" => Some(self.macd.histogram),
            _ => None,
        }
    }
}

/// Incremental indicator pipeline for a single pair and timeframe.
///
/// Candles must arrive in strictly increasing timestamp order; a violation
/// leaves the engine untouched and surfaces as [`EngineError::ExecutionFailure`].
/// A data gap is handled by [`IndicatorEngine::reset`], which drops all state
/// and re-enters warmup.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    buffer: VecDeque<Candle>,
    capacity: usize,
    required: usize,
    seen: usize,
    last_timestamp: Option<DateTime<Utc>>,
    sma_short: Sma,
    sma_long: Sma,
    rsi: Rsi,
    atr: Atr,
    adx: Adx,
    bollinger: Bollinger,
    macd: Macd,
}

impl IndicatorEngine {
    pub fn new(config: &IndicatorConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let sma_short = Sma::new(config.sma_short);
        let sma_long = Sma::new(config.sma_long);
        let rsi = Rsi::new(config.rsi_period);
        let atr = Atr::new(config.atr_period);
        let adx = Adx::new(config.adx_period);
        let bollinger = Bollinger::new(config.bollinger_period, config.bollinger_std);
        let macd = Macd::new(config.macd_fast, config.macd_slow, config.macd_signal);
        let required = [
            sma_short.warmup(),
            sma_long.warmup(),
            rsi.warmup(),
            atr.warmup(),
            adx.warmup(),
            bollinger.warmup(),
            macd.warmup(),
        ]
        .into_iter()
        .max()
        .unwrap_or(1);
        Ok(Self {
            buffer: VecDeque::with_capacity(required + 1),
            capacity: required,
            required,
            seen: 0,
            last_timestamp: None,
            sma_short,
            sma_long,
            rsi,
            atr,
            adx,
            bollinger,
            macd,
        })
    }

    /// Candles needed before the first snapshot, the longest warmup across
    /// all configured indicators.
    pub fn required_history(&self) -> usize {
        self.required
    }

    /// Candles observed since construction or the last reset.
    pub fn observed(&self) -> usize {
        self.seen
    }

    pub fn is_warm(&self) -> bool {
        self.seen >= self.required
    }

    /// Rolling candle window, oldest first, at most `required_history` long.
    ///
    /// Contiguous: `apply` re-packs the deque after every eviction.
    pub fn window(&self) -> &[Candle] {
        self.buffer.as_slices().0
    }

    /// Closes of the most recent `n` candles, oldest first.
    pub fn recent_closes(&self, n: usize) -> Vec<f64> {
        let skip = self.buffer.len().saturating_sub(n);
        self.buffer.iter().skip(skip).map(|c| c.close).collect()
    }

    /// Append one candle and compute the snapshot for it.
    ///
    /// Returns `InsufficientHistory` while warming up; the caller holds and
    /// feeds the next candle. The candle is still consumed in that case.
    pub fn apply(&mut self, candle: &Candle) -> Result<IndicatorSnapshot, EngineError> {
        if let Some(last) = self.last_timestamp {
            if candle.timestamp <= last {
                return Err(EngineError::ExecutionFailure(format!(
                    "candle out of order: {} follows {}",
                    candle.timestamp, last
                )));
            }
        }
        if !candle.is_sane() {
            return Err(EngineError::ExecutionFailure(format!(
                "malformed candle at {}",
                candle.timestamp
            )));
        }

        self.buffer.push_back(candle.clone());
        if self.buffer.len() > self.capacity {
            self.buffer.pop_front();
            self.buffer.make_contiguous();
        }
        self.seen += 1;
        self.last_timestamp = Some(candle.timestamp);

        let sma_short = self.sma_short.update(candle.close);
        let sma_long = self.sma_long.update(candle.close);
        let rsi = self.rsi.update(candle.close);
        let atr = self.atr.update(candle.high, candle.low, candle.close);
        let adx = self.adx.update(candle.high, candle.low, candle.close);
        let bollinger = self.bollinger.update(candle.close);
        let macd = self.macd.update(candle.close);

        match (sma_short, sma_long, rsi, atr, adx, bollinger, macd) {
            (Some(ss), Some(sl), Some(r), Some(a), Some(dx), Some(bb), Some(m)) => {
                Ok(IndicatorSnapshot {
                    timestamp: candle.timestamp,
                    close: candle.close,
                    sma_short: ss,
                    sma_long: sl,
                    rsi: r,
                    atr: a,
                    adx: dx,
                    bollinger: bb,
                    macd: m,
                })
            }
            _ => Err(EngineError::InsufficientHistory {
                have: self.seen,
                need: self.required,
            }),
        }
    }

    /// Drop every indicator state and the candle buffer, re-entering warmup.
    /// Used when the feed reports a gap.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.seen = 0;
        self.last_timestamp = None;
        self.sma_short.reset();
        self.sma_long.reset();
        self.rsi.reset();
        self.atr.reset();
        self.adx.reset();
        self.bollinger.reset();
        self.macd.reset();
    }
}
