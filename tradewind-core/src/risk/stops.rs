//! Stop-loss placement and trailing updates.

use serde::{Deserialize, Serialize};

use crate::domain::position::PositionSide;
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopLossPolicy {
    /// Stop a fixed fraction away from entry.
    FixedPct { percentage: f64 },
    /// Stop `multiplier` ATRs away from entry.
    AtrMultiple { multiplier: f64 },
    /// Starts like a fixed-percentage stop, then follows price at the same
    /// distance. Only ever tightens.
    Trailing { percentage: f64 },
}

impl Default for StopLossPolicy {
    fn default() -> Self {
        StopLossPolicy::FixedPct { percentage: 0.05 }
    }
}

impl StopLossPolicy {
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            StopLossPolicy::FixedPct { percentage } | StopLossPolicy::Trailing { percentage } => {
                if !percentage.is_finite() || *percentage <= 0.0 || *percentage >= 1.0 {
                    return Err(EngineError::Configuration(format!(
                        "stop-loss percentage must be within (0, 1), got {percentage}"
                    )));
                }
                Ok(())
            }
            StopLossPolicy::AtrMultiple { multiplier } => {
                if !multiplier.is_finite() || *multiplier <= 0.0 {
                    return Err(EngineError::Configuration(format!(
                        "stop-loss ATR multiplier must be positive, got {multiplier}"
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn is_trailing(&self) -> bool {
        matches!(self, StopLossPolicy::Trailing { .. })
    }

    /// Stop price protecting `side` for an entry at `price`.
    pub fn initial_stop(&self, side: PositionSide, price: f64, atr: f64) -> f64 {
        let distance = self.distance(price, atr);
        price - side.sign() * distance
    }

    /// Stop candidate as price moves. `None` for static policies; the
    /// position's ratchet decides whether a candidate actually tightens.
    pub fn trailing_candidate(&self, side: PositionSide, price: f64) -> Option<f64> {
        match self {
            StopLossPolicy::Trailing { percentage } => {
                Some(price - side.sign() * price * percentage)
            }
            _ => None,
        }
    }

    fn distance(&self, price: f64, atr: f64) -> f64 {
        match self {
            StopLossPolicy::FixedPct { percentage } | StopLossPolicy::Trailing { percentage } => {
                price * percentage
            }
            StopLossPolicy::AtrMultiple { multiplier } => atr * multiplier,
        }
    }
}
