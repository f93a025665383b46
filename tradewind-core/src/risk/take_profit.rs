//! Take-profit placement, single target or scaled ladder.

use serde::{Deserialize, Serialize};

use crate::domain::decision::FRACTION_TOLERANCE;
use crate::domain::position::{PositionSide, TakeProfitLevel};
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TakeProfitPolicy {
    /// One target a fixed fraction past entry, closing the whole position.
    FixedPct { percentage: f64 },
    /// One target `multiplier` ATRs past entry.
    AtrMultiple { multiplier: f64 },
    /// Ladder of targets: `levels[i]` is the fractional move past entry,
    /// `amounts[i]` the fraction of the position closed there. Amounts must
    /// sum to 1.0 within tolerance.
    Scaled { levels: Vec<f64>, amounts: Vec<f64> },
}

impl Default for TakeProfitPolicy {
    fn default() -> Self {
        TakeProfitPolicy::FixedPct { percentage: 0.10 }
    }
}

impl TakeProfitPolicy {
    /// Standard three-step ladder: 30% at +5%, 30% at +10%, 40% at +20%.
    pub fn default_scaled() -> Self {
        TakeProfitPolicy::Scaled {
            levels: vec![0.05, 0.10, 0.20],
            amounts: vec![0.3, 0.3, 0.4],
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            TakeProfitPolicy::FixedPct { percentage } => {
                if !percentage.is_finite() || *percentage <= 0.0 {
                    return Err(EngineError::Configuration(format!(
                        "take-profit percentage must be positive, got {percentage}"
                    )));
                }
                Ok(())
            }
            TakeProfitPolicy::AtrMultiple { multiplier } => {
                if !multiplier.is_finite() || *multiplier <= 0.0 {
                    return Err(EngineError::Configuration(format!(
                        "take-profit ATR multiplier must be positive, got {multiplier}"
                    )));
                }
                Ok(())
            }
            TakeProfitPolicy::Scaled { levels, amounts } => {
                if levels.is_empty() {
                    return Err(EngineError::Configuration(
                        "scaled take-profit needs at least one level".to_string(),
                    ));
                }
                if levels.len() != amounts.len() {
                    return Err(EngineError::Configuration(format!(
                        "scaled take-profit has {} levels but {} amounts",
                        levels.len(),
                        amounts.len()
                    )));
                }
                let mut prev = 0.0;
                for level in levels {
                    if !level.is_finite() || *level <= prev {
                        return Err(EngineError::Configuration(format!(
                            "scaled levels must be positive and strictly increasing, got {level} after {prev}"
                        )));
                    }
                    prev = *level;
                }
                for amount in amounts {
                    if !amount.is_finite() || *amount <= 0.0 {
                        return Err(EngineError::Configuration(format!(
                            "scaled amounts must be positive, got {amount}"
                        )));
                    }
                }
                let sum: f64 = amounts.iter().sum();
                if (sum - 1.0).abs() > FRACTION_TOLERANCE {
                    return Err(EngineError::Configuration(format!(
                        "scaled take-profit amounts sum to {sum}, expected 1.0"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Target ladder for an entry at `price` on `side`, ordered away from
    /// entry. Single-target policies produce one level with fraction 1.0.
    pub fn levels(&self, side: PositionSide, price: f64, atr: f64) -> Vec<TakeProfitLevel> {
        match self {
            TakeProfitPolicy::FixedPct { percentage } => {
                vec![TakeProfitLevel::new(
                    price * (1.0 + side.sign() * percentage),
                    1.0,
                )]
            }
            TakeProfitPolicy::AtrMultiple { multiplier } => {
                vec![TakeProfitLevel::new(
                    price + side.sign() * atr * multiplier,
                    1.0,
                )]
            }
            TakeProfitPolicy::Scaled { levels, amounts } => levels
                .iter()
                .zip(amounts.iter())
                .map(|(level, amount)| {
                    TakeProfitLevel::new(price * (1.0 + side.sign() * level), *amount)
                })
                .collect(),
        }
    }
}
