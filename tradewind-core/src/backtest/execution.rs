//! Simulated execution collaborator for backtests and paper sessions.
//!
//! Orders submitted during candle `i` fill at candle `i + 1`'s open,
//! adjusted by the slippage model, with a proportional fee. Events are
//! reported back asynchronously through the [`ExecutionPort`] contract,
//! never as a synchronous return from submit.

use serde::{Deserialize, Serialize};

use crate::domain::candle::Candle;
use crate::domain::position::PositionSide;
use crate::error::EngineError;
use crate::ports::{ExecutionEvent, ExecutionPort, OrderRequest};

/// Price adjustment applied to simulated fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlippageModel {
    /// Fills at the raw price.
    None,
    /// Fixed slippage in basis points (1 bp = 0.01%), always adverse.
    FixedBps { bps: f64 },
}

impl Default for SlippageModel {
    fn default() -> Self {
        SlippageModel::None
    }
}

impl SlippageModel {
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            SlippageModel::None => Ok(()),
            SlippageModel::FixedBps { bps } => {
                if !bps.is_finite() || *bps < 0.0 {
                    return Err(EngineError::Configuration(format!(
                        "slippage bps must be non-negative, got {bps}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Adverse-adjusted price for buying (entering long / covering short).
    fn buy_price(&self, raw: f64) -> f64 {
        match self {
            SlippageModel::None => raw,
            SlippageModel::FixedBps { bps } => raw * (1.0 + bps / 10_000.0),
        }
    }

    /// Adverse-adjusted price for selling.
    fn sell_price(&self, raw: f64) -> f64 {
        match self {
            SlippageModel::None => raw,
            SlippageModel::FixedBps { bps } => raw * (1.0 - bps / 10_000.0),
        }
    }
}

/// Fees and slippage for the simulated venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Fee as a fraction of fill notional, charged on every fill.
    pub fee_rate: f64,
    pub slippage: SlippageModel,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.001,
            slippage: SlippageModel::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.fee_rate.is_finite() || self.fee_rate < 0.0 || self.fee_rate >= 1.0 {
            return Err(EngineError::Configuration(format!(
                "fee_rate must be within [0, 1), got {}",
                self.fee_rate
            )));
        }
        self.slippage.validate()
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    config: ExecutionConfig,
    pending: Vec<OrderRequest>,
    events: Vec<ExecutionEvent>,
}

impl SimulatedExecutor {
    pub fn new(config: ExecutionConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            pending: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Resolve every pending order against a freshly opened candle.
    pub fn on_candle_open(&mut self, candle: &Candle) {
        for order in self.pending.drain(..) {
            let raw = candle.open;
            let price = match order.side {
                PositionSide::Long => self.config.slippage.buy_price(raw),
                PositionSide::Short => self.config.slippage.sell_price(raw),
            };
            let fee = self.config.fee_rate * price * order.size;
            self.events.push(ExecutionEvent::Filled {
                pair: order.pair,
                side: order.side,
                price,
                size: order.size,
                fee,
                at: candle.timestamp,
            });
        }
    }

    /// Drop orders that never got a next candle to fill on.
    pub fn cancel_pending(&mut self) -> usize {
        let stale = self.pending.len();
        self.pending.clear();
        stale
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Fill price for closing part of a position at `raw` (stop, target or
    /// market close). Closing a long sells, closing a short buys.
    pub fn exit_price(&self, side: PositionSide, raw: f64) -> f64 {
        match side {
            PositionSide::Long => self.config.slippage.sell_price(raw),
            PositionSide::Short => self.config.slippage.buy_price(raw),
        }
    }

    pub fn fee_for(&self, price: f64, quantity: f64) -> f64 {
        self.config.fee_rate * price * quantity
    }
}

impl ExecutionPort for SimulatedExecutor {
    fn submit(&mut self, order: OrderRequest) -> Result<(), EngineError> {
        if order.size <= 0.0 {
            return Err(EngineError::ExecutionFailure(format!(
                "order for {} has non-positive size {}",
                order.pair, order.size
            )));
        }
        self.pending.push(order);
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<ExecutionEvent> {
        std::mem::take(&mut self.events)
    }
}
