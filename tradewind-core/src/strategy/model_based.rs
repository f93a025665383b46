//! Model-based strategy: a deterministic linear scoring model.
//!
//! Four bounded features are blended into one score in [-1, 1]:
//! MA spread (scaled by `trend_scale`), RSI displacement from 50, MACD
//! histogram relative to ATR, and position inside the Bollinger bands.
//! The score's sign picks the direction once its magnitude clears
//! `entry_threshold`; the magnitude itself is the confidence, so this
//! variant always exposes a graded conviction rather than fixed steps.

use serde::{Deserialize, Serialize};

use crate::domain::signal::{Direction, Signal};
use crate::error::EngineError;
use crate::indicators::IndicatorSnapshot;

use super::memory::StrategyMemory;
use super::{StrategyContext, StrategyKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureWeights {
    pub trend: f64,
    pub momentum: f64,
    pub macd: f64,
    pub band_position: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            trend: 0.35,
            momentum: 0.25,
            macd: 0.25,
            band_position: 0.15,
        }
    }
}

impl FeatureWeights {
    fn total(&self) -> f64 {
        self.trend + self.momentum + self.macd + self.band_position
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelBased {
    pub weights: FeatureWeights,
    /// Score magnitude required before a directional call.
    pub entry_threshold: f64,
    /// MA spread (as a fraction of the slow MA) that saturates the trend
    /// feature. 20.0 means a 5% spread scores 1.0.
    pub trend_scale: f64,
}

impl Default for ModelBased {
    fn default() -> Self {
        Self {
            weights: FeatureWeights::default(),
            entry_threshold: 0.3,
            trend_scale: 20.0,
        }
    }
}

impl ModelBased {
    pub fn validate(&self) -> Result<(), EngineError> {
        let w = &self.weights;
        for (name, value) in [
            ("trend", w.trend),
            ("momentum", w.momentum),
            ("macd", w.macd),
            ("band_position", w.band_position),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::Configuration(format!(
                    "model weight `{name}` must be non-negative, got {value}"
                )));
            }
        }
        if w.total() <= 0.0 {
            return Err(EngineError::Configuration(
                "model weights must not all be zero".to_string(),
            ));
        }
        if !self.entry_threshold.is_finite() || !(0.0..1.0).contains(&self.entry_threshold) {
            return Err(EngineError::Configuration(format!(
                "entry_threshold must be within [0, 1), got {}",
                self.entry_threshold
            )));
        }
        if !self.trend_scale.is_finite() || self.trend_scale <= 0.0 {
            return Err(EngineError::Configuration(format!(
                "trend_scale must be positive, got {}",
                self.trend_scale
            )));
        }
        Ok(())
    }

    /// Blended feature score in [-1, 1]. Positive is bullish.
    pub fn score(&self, snapshot: &IndicatorSnapshot) -> f64 {
        let w = &self.weights;
        let total = w.total();
        if total <= 0.0 {
            return 0.0;
        }
        let weighted = w.trend * trend_feature(snapshot, self.trend_scale)
            + w.momentum * momentum_feature(snapshot)
            + w.macd * macd_feature(snapshot)
            + w.band_position * band_feature(snapshot);
        (weighted / total).clamp(-1.0, 1.0)
    }

    pub fn evaluate(&self, ctx: &StrategyContext<'_>, _memory: &StrategyMemory) -> Signal {
        let now = ctx.snapshot;
        let score = self.score(now);
        let direction = if score >= self.entry_threshold {
            Direction::Buy
        } else if score <= -self.entry_threshold {
            Direction::Sell
        } else {
            Direction::Hold
        };
        let confidence = if direction.is_hold() { 0.0 } else { score.abs() };
        Signal::new(ctx.pair, direction, confidence, StrategyKind::ModelBased, now.timestamp)
    }
}

fn trend_feature(s: &IndicatorSnapshot, scale: f64) -> f64 {
    if s.sma_long == 0.0 {
        return 0.0;
    }
    let spread = (s.sma_short - s.sma_long) / s.sma_long;
    (spread * scale).clamp(-1.0, 1.0)
}

fn momentum_feature(s: &IndicatorSnapshot) -> f64 {
    ((s.rsi - 50.0) / 50.0).clamp(-1.0, 1.0)
}

fn macd_feature(s: &IndicatorSnapshot) -> f64 {
    if s.atr <= 0.0 {
        return 0.0;
    }
    (s.macd.histogram / s.atr).clamp(-1.0, 1.0)
}

fn band_feature(s: &IndicatorSnapshot) -> f64 {
    (2.0 * (s.bollinger.percent_b(s.close) - 0.5)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{BollingerBands, MacdOutput};
    use crate::regime::MarketRegime;
    use chrono::{TimeZone, Utc};

    fn snapshot(sma_short: f64, sma_long: f64, rsi: f64, histogram: f64, close: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 4, 0, 0, 0).unwrap(),
            close,
            sma_short,
            sma_long,
            rsi,
            atr: 2.0,
            adx: 25.0,
            bollinger: BollingerBands {
                upper: 104.0,
                middle: 100.0,
                lower: 96.0,
            },
            macd: MacdOutput { line: histogram, signal: 0.0, histogram },
        }
    }

    fn ctx<'a>(snapshot: &'a IndicatorSnapshot) -> StrategyContext<'a> {
        StrategyContext {
            pair: "BTC/USDT",
            regime: MarketRegime::Unknown,
            snapshot,
            candles: &[],
        }
    }

    #[test]
    fn aligned_bullish_features_buy_with_high_confidence() {
        // wide bullish MA spread, hot RSI, positive histogram, upper band
        let s = snapshot(105.0, 100.0, 75.0, 1.5, 103.5);
        let signal = ModelBased::default().evaluate(&ctx(&s), &StrategyMemory::new());
        assert_eq!(signal.direction, Direction::Buy);
        assert!(signal.confidence > 0.5, "got {}", signal.confidence);
    }

    #[test]
    fn aligned_bearish_features_sell() {
        let s = snapshot(95.0, 100.0, 25.0, -1.5, 96.5);
        let signal = ModelBased::default().evaluate(&ctx(&s), &StrategyMemory::new());
        assert_eq!(signal.direction, Direction::Sell);
        assert!(signal.confidence > 0.5, "got {}", signal.confidence);
    }

    #[test]
    fn neutral_features_hold_with_zero_confidence() {
        let s = snapshot(100.0, 100.0, 50.0, 0.0, 100.0);
        let signal = ModelBased::default().evaluate(&ctx(&s), &StrategyMemory::new());
        assert!(signal.direction.is_hold());
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn score_is_symmetric() {
        let bull = snapshot(102.0, 100.0, 65.0, 0.8, 102.0);
        let bear = snapshot(98.0, 100.0, 35.0, -0.8, 98.0);
        let model = ModelBased::default();
        let up = model.score(&bull);
        let down = model.score(&bear);
        assert!(up > 0.0 && down < 0.0);
        assert!((up + down).abs() < 0.05, "near-mirror inputs should score near-mirror: {up} vs {down}");
    }

    #[test]
    fn score_is_idempotent() {
        let s = snapshot(103.0, 100.0, 60.0, 0.5, 101.0);
        let model = ModelBased::default();
        assert_eq!(model.score(&s), model.score(&s));
    }

    #[test]
    fn validation_rejects_all_zero_weights() {
        let mut model = ModelBased::default();
        model.weights = FeatureWeights {
            trend: 0.0,
            momentum: 0.0,
            macd: 0.0,
            band_position: 0.0,
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn validation_rejects_threshold_of_one() {
        let mut model = ModelBased::default();
        model.entry_threshold = 1.0;
        assert!(model.validate().is_err());
    }
}
