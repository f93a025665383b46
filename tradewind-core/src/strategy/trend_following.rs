//! Trend-following rules: ride an established directional move.
//!
//! Two entry rules per side, checked in order:
//! 1. fresh moving-average crossover confirmed by MACD (confidence 0.8),
//! 2. established trend (fast MA on the right side, price beyond it) with
//!    MACD confirmation and ADX above `adx_confirmation` (confidence 0.7).
//!
//! Both MACD confirmation and crossover detection need the previous
//! snapshot; with empty memory the strategy holds.

use serde::{Deserialize, Serialize};

use crate::domain::signal::{Direction, Signal};
use crate::error::EngineError;
use crate::indicators::IndicatorSnapshot;

use super::memory::StrategyMemory;
use super::{StrategyContext, StrategyKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrendFollowing {
    /// ADX required for the trend-continuation rule.
    pub adx_confirmation: f64,
}

impl Default for TrendFollowing {
    fn default() -> Self {
        Self {
            adx_confirmation: 25.0,
        }
    }
}

impl TrendFollowing {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.adx_confirmation.is_finite() || !(0.0..=100.0).contains(&self.adx_confirmation) {
            return Err(EngineError::Configuration(format!(
                "adx_confirmation must be within [0, 100], got {}",
                self.adx_confirmation
            )));
        }
        Ok(())
    }

    pub fn evaluate(&self, ctx: &StrategyContext<'_>, memory: &StrategyMemory) -> Signal {
        let now = ctx.snapshot;
        let prev = match &memory.last_snapshot {
            Some(p) => p,
            None => return Signal::hold(ctx.pair, StrategyKind::TrendFollowing, now.timestamp),
        };

        let (direction, confidence) = match directional_call(now, prev, self.adx_confirmation) {
            Some(call) => call,
            None => (Direction::Hold, 0.0),
        };
        Signal::new(
            ctx.pair,
            direction,
            confidence,
            StrategyKind::TrendFollowing,
            now.timestamp,
        )
    }
}

fn macd_bullish(now: &IndicatorSnapshot, prev: &IndicatorSnapshot) -> bool {
    now.macd.line > now.macd.signal
        && now.macd.histogram > 0.0
        && now.macd.histogram > prev.macd.histogram
}

fn macd_bearish(now: &IndicatorSnapshot, prev: &IndicatorSnapshot) -> bool {
    now.macd.line < now.macd.signal
        && now.macd.histogram < 0.0
        && now.macd.histogram < prev.macd.histogram
}

pub(super) fn directional_call(
    now: &IndicatorSnapshot,
    prev: &IndicatorSnapshot,
    adx_confirmation: f64,
) -> Option<(Direction, f64)> {
    let bullish_cross = prev.sma_short <= prev.sma_long && now.sma_short > now.sma_long;
    let bearish_cross = prev.sma_short >= prev.sma_long && now.sma_short < now.sma_long;
    let bullish_trend = now.sma_short > now.sma_long && now.close > now.sma_short;
    let bearish_trend = now.sma_short < now.sma_long && now.close < now.sma_short;

    if bullish_cross && macd_bullish(now, prev) {
        return Some((Direction::Buy, 0.8));
    }
    if bullish_trend && macd_bullish(now, prev) && now.adx > adx_confirmation {
        return Some((Direction::Buy, 0.7));
    }
    if bearish_cross && macd_bearish(now, prev) {
        return Some((Direction::Sell, 0.8));
    }
    if bearish_trend && macd_bearish(now, prev) && now.adx > adx_confirmation {
        return Some((Direction::Sell, 0.7));
    }
    None
}
