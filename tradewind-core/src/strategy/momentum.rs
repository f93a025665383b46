//! Adaptive momentum: switches its rule set with the market regime.
//!
//! Trending and unknown regimes use the trend-following rules, ranging
//! uses mean reversion, and volatile uses a Bollinger breakout filtered by
//! volume surge and trend strength. Whatever inner rule fires, the signal
//! is attributed to this strategy.
//!
//! Breakout precedence: a band escape only counts when the previous close
//! was still inside the band, volume runs `volume_surge_factor` above its
//! recent mean and ADX clears `adx_floor`; otherwise hold. Breakout entries
//! carry a fixed 0.6 confidence, volatile conditions cap conviction.

use serde::{Deserialize, Serialize};

use crate::domain::signal::{Direction, Signal};
use crate::error::EngineError;
use crate::regime::MarketRegime;

use super::mean_reversion::MeanReversion;
use super::memory::StrategyMemory;
use super::trend_following::{self, TrendFollowing};
use super::{StrategyContext, StrategyKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakoutRules {
    /// Latest volume must exceed the rolling mean by this factor.
    pub volume_surge_factor: f64,
    /// Candles in the rolling volume mean, newest included.
    pub volume_lookback: usize,
    /// Minimum ADX for a breakout to count as directional.
    pub adx_floor: f64,
}

impl Default for BreakoutRules {
    fn default() -> Self {
        Self {
            volume_surge_factor: 1.5,
            volume_lookback: 10,
            adx_floor: 30.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdaptiveMomentum {
    pub trend: TrendFollowing,
    pub reversion: MeanReversion,
    pub breakout: BreakoutRules,
}

impl AdaptiveMomentum {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.trend.validate()?;
        self.reversion.validate()?;
        if self.breakout.volume_lookback == 0 {
            return Err(EngineError::Configuration(
                "breakout volume_lookback must be at least 1".to_string(),
            ));
        }
        if !self.breakout.volume_surge_factor.is_finite() || self.breakout.volume_surge_factor <= 0.0
        {
            return Err(EngineError::Configuration(format!(
                "breakout volume_surge_factor must be positive, got {}",
                self.breakout.volume_surge_factor
            )));
        }
        Ok(())
    }

    pub fn evaluate(&self, ctx: &StrategyContext<'_>, memory: &StrategyMemory) -> Signal {
        let now = ctx.snapshot;
        let call = match ctx.regime {
            MarketRegime::Trending | MarketRegime::Unknown => match &memory.last_snapshot {
                Some(prev) => {
                    trend_following::directional_call(now, prev, self.trend.adx_confirmation)
                }
                None => None,
            },
            MarketRegime::Ranging => self.reversion.reversion_call(now),
            MarketRegime::Volatile => self.breakout_call(ctx, memory),
        };
        match call {
            Some((direction, confidence)) => Signal::new(
                ctx.pair,
                direction,
                confidence,
                StrategyKind::AdaptiveMomentum,
                now.timestamp,
            ),
            None => Signal::hold(ctx.pair, StrategyKind::AdaptiveMomentum, now.timestamp),
        }
    }

    fn breakout_call(
        &self,
        ctx: &StrategyContext<'_>,
        memory: &StrategyMemory,
    ) -> Option<(Direction, f64)> {
        let now = ctx.snapshot;
        let prev = memory.last_snapshot.as_ref()?;
        if now.adx <= self.breakout.adx_floor || !self.volume_surge(ctx) {
            return None;
        }
        let upper_break = now.close > now.bollinger.upper && prev.close <= prev.bollinger.upper;
        let lower_break = now.close < now.bollinger.lower && prev.close >= prev.bollinger.lower;
        if upper_break {
            Some((Direction::Buy, 0.6))
        } else if lower_break {
            Some((Direction::Sell, 0.6))
        } else {
            None
        }
    }

    fn volume_surge(&self, ctx: &StrategyContext<'_>) -> bool {
        let candles = ctx.candles;
        if candles.is_empty() {
            return false;
        }
        let take = self.breakout.volume_lookback.min(candles.len());
        let tail = &candles[candles.len() - take..];
        let mean = tail.iter().map(|c| c.volume).sum::<f64>() / take as f64;
        if mean <= 0.0 {
            return false;
        }
        let latest = candles[candles.len() - 1].volume;
        latest > mean * self.breakout.volume_surge_factor
    }
}
