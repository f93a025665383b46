//! Position — an open exposure with its exit levels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::strategy::StrategyKind;

/// Long or short exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short. PnL arithmetic uses this.
    pub fn sign(&self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    PartiallyClosed,
    Closed,
}

/// One take-profit target: close `fraction` of the original size at `price`.
///
/// Fractions across a position's levels sum to 1.0; the risk manager
/// validates this before the position can exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitLevel {
    pub price: f64,
    pub fraction: f64,
    /// Set once this level has filled. A level fills at most once.
    pub filled: bool,
}

impl TakeProfitLevel {
    pub fn new(price: f64, fraction: f64) -> Self {
        Self {
            price,
            fraction,
            filled: false,
        }
    }
}

/// An open (or retained closed) position for one pair.
///
/// Mutated only on fill events; closed positions stay in the performance
/// history and are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub pair: String,
    pub side: PositionSide,
    pub entry_price: f64,
    /// Size at entry, in base units. Never changes after open.
    pub size: f64,
    /// Units still held. Decreases as take-profit levels fill.
    pub remaining: f64,
    pub stop_loss: f64,
    pub take_profit_levels: Vec<TakeProfitLevel>,
    /// Capital at risk when the position opened: |entry - stop| * size.
    pub risk_amount: f64,
    pub opened_at: DateTime<Utc>,
    pub status: PositionStatus,
    pub strategy: StrategyKind,
}

impl Position {
    /// Unrealized PnL of the remaining units at `price`.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * self.remaining
    }

    /// Market value of the remaining units at `price`.
    pub fn market_value(&self, price: f64) -> f64 {
        self.remaining * price
    }

    /// Tighten the stop to `candidate` if it is strictly more protective.
    ///
    /// For a long that means a higher stop, for a short a lower one. A
    /// candidate that would loosen the stop is ignored and `false` is
    /// returned. This is the only way a stop moves after entry.
    pub fn ratchet_stop(&mut self, candidate: f64) -> bool {
        let tighter = match self.side {
            PositionSide::Long => candidate > self.stop_loss,
            PositionSide::Short => candidate < self.stop_loss,
        };
        if tighter {
            self.stop_loss = candidate;
        }
        tighter
    }

    /// Fraction of the original size still held.
    pub fn remaining_fraction(&self) -> f64 {
        if self.size <= 0.0 {
            return 0.0;
        }
        self.remaining / self.size
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.status, PositionStatus::Closed)
    }
}
