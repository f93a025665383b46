//! AccountState — equity, allocated risk, and the open-position book.
//!
//! All admission and fill bookkeeping lives here so the backtest (which owns
//! an account directly) and the account actor (which serializes access for
//! concurrent pair workers) share one implementation of the rules.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::RiskDecision;
use super::position::{Position, PositionStatus};
use super::trade::{ClosedTrade, ExitReason};
use crate::error::EngineError;

/// Portfolio-wide ceilings checked at proposal admission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioLimits {
    /// Ceiling on allocated risk as a fraction of equity.
    pub max_total_risk: f64,
    pub max_open_positions: usize,
}

impl Default for PortfolioLimits {
    fn default() -> Self {
        Self {
            max_total_risk: 0.10,
            max_open_positions: 5,
        }
    }
}

/// The single source of truth for equity and open exposure.
///
/// Invariant: `allocated_risk <= max_total_risk * total_equity` at all
/// times. [`admit`](Self::admit) rejects any proposal that would break it,
/// before sizing side effects happen, so the invariant can only tighten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    /// Realized equity: initial capital plus net PnL of closed trades,
    /// minus fees already paid. Unrealized PnL is marked separately.
    pub total_equity: f64,
    /// Sum of open positions' entry-time risked capital, scaled by the
    /// fraction of each position still held. Frozen at entry rather than
    /// recomputed as stops ratchet, so the ceiling check never relaxes
    /// mid-trade.
    pub allocated_risk: f64,
    pub open_positions: BTreeMap<String, Position>,
}

impl AccountState {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            total_equity: initial_equity,
            allocated_risk: 0.0,
            open_positions: BTreeMap::new(),
        }
    }

    /// Check a proposal against the account without mutating anything.
    ///
    /// Rejection order: structural validity, duplicate pair, position-count
    /// ceiling, risk ceiling.
    pub fn admit(
        &self,
        decision: &RiskDecision,
        limits: &PortfolioLimits,
    ) -> Result<(), EngineError> {
        decision.validate()?;

        if self.open_positions.contains_key(&decision.pair) {
            return Err(EngineError::InvalidRiskDecision(format!(
                "position already open for {}",
                decision.pair
            )));
        }
        if self.open_positions.len() >= limits.max_open_positions {
            return Err(EngineError::RiskLimitExceeded(format!(
                "{} positions already open, limit is {}",
                self.open_positions.len(),
                limits.max_open_positions
            )));
        }
        let ceiling = limits.max_total_risk * self.total_equity;
        if self.allocated_risk + decision.risk_amount > ceiling {
            return Err(EngineError::RiskLimitExceeded(format!(
                "proposal risks {:.2} with {:.2} already allocated against a ceiling of {:.2}",
                decision.risk_amount, self.allocated_risk, ceiling
            )));
        }
        Ok(())
    }

    /// Open a position from an admitted decision at the actual fill price.
    ///
    /// The risk amount is recomputed from the fill; if the fill gapped
    /// through the stop the decision is rejected whole and the account is
    /// untouched.
    pub fn open_position(
        &mut self,
        decision: &RiskDecision,
        limits: &PortfolioLimits,
        fill_price: f64,
        fee: f64,
        filled_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.admit(decision, limits)?;

        let stop_distance = decision.side.sign() * (fill_price - decision.stop_loss);
        if stop_distance <= 0.0 {
            return Err(EngineError::InvalidRiskDecision(format!(
                "fill at {} gapped through stop {}",
                fill_price, decision.stop_loss
            )));
        }
        let risk_amount = stop_distance * decision.size;
        let ceiling = limits.max_total_risk * self.total_equity;
        if self.allocated_risk + risk_amount > ceiling {
            return Err(EngineError::RiskLimitExceeded(format!(
                "fill at {:.4} raises risk to {:.2}, over ceiling {:.2}",
                fill_price,
                self.allocated_risk + risk_amount,
                ceiling
            )));
        }

        self.total_equity -= fee;
        self.allocated_risk += risk_amount;
        self.open_positions.insert(
            decision.pair.clone(),
            Position {
                pair: decision.pair.clone(),
                side: decision.side,
                entry_price: fill_price,
                size: decision.size,
                remaining: decision.size,
                stop_loss: decision.stop_loss,
                take_profit_levels: decision.take_profit_levels.clone(),
                risk_amount,
                opened_at: filled_at,
                status: PositionStatus::Open,
                strategy: decision.strategy,
            },
        );
        Ok(())
    }

    /// Fill one take-profit level: close its fraction of the original size.
    pub fn fill_take_profit(
        &mut self,
        pair: &str,
        level_index: usize,
        fill_price: f64,
        fee: f64,
        filled_at: DateTime<Utc>,
    ) -> Result<ClosedTrade, EngineError> {
        let position = self.open_positions.get_mut(pair).ok_or_else(|| {
            EngineError::ExecutionFailure(format!("no open position for {pair}"))
        })?;
        let level = *position.take_profit_levels.get(level_index).ok_or_else(|| {
            EngineError::ExecutionFailure(format!(
                "take-profit level {level_index} does not exist for {pair}"
            ))
        })?;
        if level.filled {
            return Err(EngineError::ExecutionFailure(format!(
                "take-profit level {level_index} already filled for {pair}"
            )));
        }

        let quantity = (position.size * level.fraction).min(position.remaining);
        let gross = position.side.sign() * (fill_price - position.entry_price) * quantity;
        let net = gross - fee;

        position.take_profit_levels[level_index].filled = true;
        position.remaining -= quantity;
        self.allocated_risk = (self.allocated_risk - position.risk_amount * level.fraction).max(0.0);
        self.total_equity += net;

        let fully_closed = position.remaining <= position.size * 1e-9;
        position.status = if fully_closed {
            PositionStatus::Closed
        } else {
            PositionStatus::PartiallyClosed
        };

        let trade = ClosedTrade {
            pair: position.pair.clone(),
            side: position.side,
            strategy: position.strategy,
            entry_time: position.opened_at,
            entry_price: position.entry_price,
            exit_time: filled_at,
            exit_price: fill_price,
            quantity,
            gross_pnl: gross,
            fee,
            net_pnl: net,
            exit_reason: ExitReason::TakeProfit(level_index),
        };
        if fully_closed {
            self.open_positions.remove(pair);
        }
        Ok(trade)
    }

    /// Close whatever remains of a position at `fill_price`.
    pub fn close_position(
        &mut self,
        pair: &str,
        fill_price: f64,
        fee: f64,
        closed_at: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<ClosedTrade, EngineError> {
        let position = self.open_positions.get(pair).ok_or_else(|| {
            EngineError::ExecutionFailure(format!("no open position for {pair}"))
        })?;

        let quantity = position.remaining;
        let gross = position.side.sign() * (fill_price - position.entry_price) * quantity;
        let net = gross - fee;
        let released = position.risk_amount * position.remaining_fraction();

        let trade = ClosedTrade {
            pair: position.pair.clone(),
            side: position.side,
            strategy: position.strategy,
            entry_time: position.opened_at,
            entry_price: position.entry_price,
            exit_time: closed_at,
            exit_price: fill_price,
            quantity,
            gross_pnl: gross,
            fee,
            net_pnl: net,
            exit_reason: reason,
        };

        self.allocated_risk = (self.allocated_risk - released).max(0.0);
        self.total_equity += net;
        self.open_positions.remove(pair);
        Ok(trade)
    }

    /// Realized equity plus unrealized PnL of open positions marked at the
    /// given last prices. Pairs without a price mark at entry (no move).
    pub fn marked_equity(&self, last_prices: &BTreeMap<String, f64>) -> f64 {
        let unrealized: f64 = self
            .open_positions
            .values()
            .map(|p| {
                last_prices
                    .get(&p.pair)
                    .map(|price| p.unrealized_pnl(*price))
                    .unwrap_or(0.0)
            })
            .sum();
        self.total_equity + unrealized
    }

    /// Check the risk-ceiling invariant against the given limits.
    pub fn risk_within_limits(&self, limits: &PortfolioLimits) -> bool {
        // Small slack for float accumulation across many partial closes.
        self.allocated_risk <= limits.max_total_risk * self.total_equity + 1e-9
    }
}
