//! Mean-reversion rules: fade extremes inside a range.
//!
//! Buys when price sits at the lower Bollinger band with RSI oversold,
//! sells at the upper band with RSI overbought. Confidence starts at 0.6
//! and grows with how far RSI has pushed past its threshold, capped at 0.9.
//! The band test wins only together with the RSI test; either alone holds.

use serde::{Deserialize, Serialize};

use crate::domain::signal::{Direction, Signal};
use crate::error::EngineError;

use super::memory::StrategyMemory;
use super::{StrategyContext, StrategyKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeanReversion {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// How close to a band counts as "at" it, as a fraction of the band
    /// price. 0.02 means within 2%.
    pub band_tolerance: f64,
}

impl Default for MeanReversion {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            band_tolerance: 0.02,
        }
    }
}

impl MeanReversion {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..=100.0).contains(&self.rsi_oversold)
            || !(0.0..=100.0).contains(&self.rsi_overbought)
            || self.rsi_oversold >= self.rsi_overbought
        {
            return Err(EngineError::Configuration(format!(
                "RSI thresholds must satisfy 0 <= oversold < overbought <= 100, got {} / {}",
                self.rsi_oversold, self.rsi_overbought
            )));
        }
        if !self.band_tolerance.is_finite() || self.band_tolerance < 0.0 {
            return Err(EngineError::Configuration(format!(
                "band_tolerance must be non-negative, got {}",
                self.band_tolerance
            )));
        }
        Ok(())
    }

    pub fn evaluate(&self, ctx: &StrategyContext<'_>, _memory: &StrategyMemory) -> Signal {
        let now = ctx.snapshot;
        match self.reversion_call(now) {
            Some((direction, confidence)) => Signal::new(
                ctx.pair,
                direction,
                confidence,
                StrategyKind::MeanReversion,
                now.timestamp,
            ),
            None => Signal::hold(ctx.pair, StrategyKind::MeanReversion, now.timestamp),
        }
    }

    pub(super) fn reversion_call(
        &self,
        now: &crate::indicators::IndicatorSnapshot,
    ) -> Option<(Direction, f64)> {
        let near_lower = now.close < now.bollinger.lower * (1.0 + self.band_tolerance);
        let near_upper = now.close > now.bollinger.upper * (1.0 - self.band_tolerance);

        if near_lower && now.rsi < self.rsi_oversold {
            let depth = threshold_depth(self.rsi_oversold - now.rsi, self.rsi_oversold);
            return Some((Direction::Buy, 0.6 + 0.3 * depth));
        }
        if near_upper && now.rsi > self.rsi_overbought {
            let depth = threshold_depth(now.rsi - self.rsi_overbought, 100.0 - self.rsi_overbought);
            return Some((Direction::Sell, 0.6 + 0.3 * depth));
        }
        None
    }
}

/// Normalized overshoot past an RSI threshold, in [0, 1].
fn threshold_depth(past: f64, span: f64) -> f64 {
    if span <= 0.0 {
        return 0.0;
    }
    (past / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{BollingerBands, IndicatorSnapshot, MacdOutput};
    use crate::regime::MarketRegime;
    use chrono::{TimeZone, Utc};

    fn snapshot(close: f64, rsi: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
            close,
            sma_short: 100.0,
            sma_long: 100.0,
            rsi,
            atr: 1.0,
            adx: 15.0,
            bollinger: BollingerBands {
                upper: 104.0,
                middle: 100.0,
                lower: 96.0,
            },
            macd: MacdOutput { line: 0.0, signal: 0.0, histogram: 0.0 },
        }
    }

    fn ctx<'a>(snapshot: &'a IndicatorSnapshot) -> StrategyContext<'a> {
        StrategyContext {
            pair: "ETH/USDT",
            regime: MarketRegime::Ranging,
            snapshot,
            candles: &[],
        }
    }

    #[test]
    fn oversold_at_lower_band_buys() {
        let s = snapshot(96.5, 22.0);
        let signal = MeanReversion::default().evaluate(&ctx(&s), &StrategyMemory::new());
        assert_eq!(signal.direction, Direction::Buy);
        // depth (30 - 22) / 30, confidence 0.6 + 0.3 * depth
        let expected = 0.6 + 0.3 * (8.0 / 30.0);
        assert!((signal.confidence - expected).abs() < 1e-12);
    }

    #[test]
    fn overbought_at_upper_band_sells() {
        let s = snapshot(103.5, 82.0);
        let signal = MeanReversion::default().evaluate(&ctx(&s), &StrategyMemory::new());
        assert_eq!(signal.direction, Direction::Sell);
        let expected = 0.6 + 0.3 * (12.0 / 30.0);
        assert!((signal.confidence - expected).abs() < 1e-12);
    }

    #[test]
    fn oversold_away_from_band_holds() {
        // RSI deeply oversold but price in the middle of the range
        let s = snapshot(100.0, 20.0);
        let signal = MeanReversion::default().evaluate(&ctx(&s), &StrategyMemory::new());
        assert!(signal.direction.is_hold());
    }

    #[test]
    fn band_touch_with_neutral_rsi_holds() {
        let s = snapshot(96.0, 45.0);
        let signal = MeanReversion::default().evaluate(&ctx(&s), &StrategyMemory::new());
        assert!(signal.direction.is_hold());
    }

    #[test]
    fn deeper_oversold_raises_confidence() {
        let mild = MeanReversion::default().evaluate(&ctx(&snapshot(96.0, 28.0)), &StrategyMemory::new());
        let deep = MeanReversion::default().evaluate(&ctx(&snapshot(96.0, 5.0)), &StrategyMemory::new());
        assert!(deep.confidence > mild.confidence);
        assert!(deep.confidence <= 0.9 + 1e-12);
    }

    #[test]
    fn validation_rejects_crossed_thresholds() {
        let params = MeanReversion {
            rsi_oversold: 70.0,
            rsi_overbought: 30.0,
            band_tolerance: 0.02,
        };
        assert!(params.validate().is_err());
        assert!(MeanReversion::default().validate().is_ok());
    }
}
