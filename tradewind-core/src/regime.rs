//! Market regime classification.
//!
//! A pure function from one [`IndicatorSnapshot`] to a [`MarketRegime`].
//! Nothing is persisted between calls, so identical snapshots always
//! classify identically.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::indicators::IndicatorSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    Trending,
    Ranging,
    Volatile,
    Unknown,
}

impl MarketRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::Trending => "trending",
            MarketRegime::Ranging => "ranging",
            MarketRegime::Volatile => "volatile",
            MarketRegime::Unknown => "unknown",
        }
    }
}

/// Thresholds for regime classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegimeConfig {
    /// ADX at or above this reads as a directional trend.
    pub adx_threshold: f64,
    /// Bollinger band width (relative to the middle band) below this reads
    /// as a quiet, range-bound market.
    pub band_width_floor: f64,
    /// ATR as a fraction of price above this reads as volatile and
    /// overrides the trend/range classification.
    pub volatility_ceiling: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            adx_threshold: 25.0,
            band_width_floor: 0.04,
            volatility_ceiling: 0.025,
        }
    }
}

impl RegimeConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.adx_threshold.is_finite() || !(0.0..=100.0).contains(&self.adx_threshold) {
            return Err(EngineError::Configuration(format!(
                "adx_threshold must be within [0, 100], got {}",
                self.adx_threshold
            )));
        }
        if !self.band_width_floor.is_finite() || self.band_width_floor < 0.0 {
            return Err(EngineError::Configuration(format!(
                "band_width_floor must be non-negative, got {}",
                self.band_width_floor
            )));
        }
        if !self.volatility_ceiling.is_finite() || self.volatility_ceiling <= 0.0 {
            return Err(EngineError::Configuration(format!(
                "volatility_ceiling must be positive, got {}",
                self.volatility_ceiling
            )));
        }
        Ok(())
    }
}

/// Classify the market state for one snapshot.
///
/// Volatility wins over everything else. A strong ADX then reads as
/// trending, tight bands as ranging, and anything left over is unknown.
pub fn classify(snapshot: &IndicatorSnapshot, config: &RegimeConfig) -> MarketRegime {
    if snapshot.atr_ratio() > config.volatility_ceiling {
        return MarketRegime::Volatile;
    }
    if snapshot.adx >= config.adx_threshold {
        return MarketRegime::Trending;
    }
    if snapshot.bollinger.width() < config.band_width_floor {
        return MarketRegime::Ranging;
    }
    MarketRegime::Unknown
}
