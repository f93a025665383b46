//! RiskDecision — a sized, exit-bracketed order intent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::{PositionSide, TakeProfitLevel};
use crate::error::EngineError;
use crate::strategy::StrategyKind;

/// Tolerance for scaled take-profit fractions summing to 1.0.
pub const FRACTION_TOLERANCE: f64 = 1e-6;

/// The risk manager's output: everything the execution collaborator needs
/// to open one position.
///
/// Applied all-or-nothing: a decision that fails [`validate`](Self::validate)
/// or account admission is discarded whole, never trimmed to fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub pair: String,
    pub side: PositionSide,
    /// Position size in base units.
    pub size: f64,
    /// Price the sizing and exits were computed against (latest close).
    /// The actual fill lands at the next candle's open.
    pub reference_price: f64,
    pub stop_loss: f64,
    pub take_profit_levels: Vec<TakeProfitLevel>,
    /// Capital at risk: |reference_price - stop_loss| * size.
    pub risk_amount: f64,
    pub strategy: StrategyKind,
    pub decided_at: DateTime<Utc>,
}

impl RiskDecision {
    /// Structural checks that do not need account state.
    ///
    /// Rejects non-positive size/prices, a stop on the wrong side of the
    /// reference price, unordered take-profit levels, and level fractions
    /// that do not sum to 1.0 within [`FRACTION_TOLERANCE`].
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.size > 0.0) {
            return Err(EngineError::InvalidRiskDecision(format!(
                "non-positive size {}",
                self.size
            )));
        }
        if !(self.reference_price > 0.0) || !(self.stop_loss > 0.0) {
            return Err(EngineError::InvalidRiskDecision(format!(
                "non-positive price (reference {}, stop {})",
                self.reference_price, self.stop_loss
            )));
        }
        let stop_protects = match self.side {
            PositionSide::Long => self.stop_loss < self.reference_price,
            PositionSide::Short => self.stop_loss > self.reference_price,
        };
        if !stop_protects {
            return Err(EngineError::InvalidRiskDecision(format!(
                "stop {} does not protect a {:?} entered near {}",
                self.stop_loss, self.side, self.reference_price
            )));
        }
        if !(self.risk_amount > 0.0) {
            return Err(EngineError::InvalidRiskDecision(format!(
                "non-positive risk amount {}",
                self.risk_amount
            )));
        }
        if self.take_profit_levels.is_empty() {
            return Err(EngineError::InvalidRiskDecision(
                "no take-profit levels".into(),
            ));
        }
        let sum: f64 = self.take_profit_levels.iter().map(|l| l.fraction).sum();
        if (sum - 1.0).abs() > FRACTION_TOLERANCE {
            return Err(EngineError::InvalidRiskDecision(format!(
                "take-profit fractions sum to {sum}, expected 1.0"
            )));
        }
        for level in &self.take_profit_levels {
            if !(level.fraction > 0.0) || !(level.price > 0.0) {
                return Err(EngineError::InvalidRiskDecision(format!(
                    "take-profit level ({}, {}) is not positive",
                    level.price, level.fraction
                )));
            }
            let profitable = match self.side {
                PositionSide::Long => level.price > self.reference_price,
                PositionSide::Short => level.price < self.reference_price,
            };
            if !profitable {
                return Err(EngineError::InvalidRiskDecision(format!(
                    "take-profit at {} is not profitable for a {:?} near {}",
                    level.price, self.side, self.reference_price
                )));
            }
        }
        for pair in self.take_profit_levels.windows(2) {
            let ascending_toward_profit = match self.side {
                PositionSide::Long => pair[1].price > pair[0].price,
                PositionSide::Short => pair[1].price < pair[0].price,
            };
            if !ascending_toward_profit {
                return Err(EngineError::InvalidRiskDecision(
                    "take-profit levels are not ordered away from entry".into(),
                ));
            }
        }
        Ok(())
    }

    /// Notional value at the reference price.
    pub fn notional(&self) -> f64 {
        self.size * self.reference_price
    }
}
