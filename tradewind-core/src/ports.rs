//! Collaborator seams: orders out, events sideways.
//!
//! The decision core never talks to a venue or a delivery channel
//! directly. Backtests and paper sessions plug simulated implementations
//! into these traits; a live deployment would plug in real ones without
//! touching the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::decision::RiskDecision;
use crate::domain::position::{PositionSide, TakeProfitLevel};
use crate::domain::signal::Signal;
use crate::domain::trade::ClosedTrade;
use crate::error::EngineError;

/// What the execution collaborator is asked to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub pair: String,
    pub side: PositionSide,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit_levels: Vec<TakeProfitLevel>,
    /// Price the decision was made against, for slippage accounting.
    pub reference_price: f64,
    pub submitted_at: DateTime<Utc>,
}

impl OrderRequest {
    pub fn from_decision(decision: &RiskDecision) -> Self {
        Self {
            pair: decision.pair.clone(),
            side: decision.side,
            size: decision.size,
            stop_loss: decision.stop_loss,
            take_profit_levels: decision.take_profit_levels.clone(),
            reference_price: decision.reference_price,
            submitted_at: decision.decided_at,
        }
    }
}

/// Fill or rejection reported back by the execution collaborator.
///
/// Delivery is asynchronous: a submit never implies the fill happened yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
    Filled {
        pair: String,
        side: PositionSide,
        price: f64,
        size: f64,
        fee: f64,
        at: DateTime<Utc>,
    },
    Rejected {
        pair: String,
        reason: String,
        at: DateTime<Utc>,
    },
}

/// Accepts order requests and reports events when they resolve.
pub trait ExecutionPort {
    /// Queue an order. Acceptance is not a fill.
    fn submit(&mut self, order: OrderRequest) -> Result<(), EngineError>;
    /// Events resolved since the last drain, oldest first.
    fn drain_events(&mut self) -> Vec<ExecutionEvent>;
}

/// Structured events for outbound delivery (console, webhook, chat).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    SignalGenerated {
        signal: Signal,
    },
    PositionOpened {
        pair: String,
        side: PositionSide,
        size: f64,
        entry_price: f64,
        at: DateTime<Utc>,
    },
    PositionClosed {
        trade: ClosedTrade,
    },
    RiskLimitBreached {
        pair: String,
        reason: String,
        at: DateTime<Utc>,
    },
}

/// Fire-and-forget event delivery. Implementations must not block the
/// decision cycle; failures stay inside the sink.
pub trait NotificationSink: Send {
    fn notify(&mut self, event: NotificationEvent);
}

/// Swallows everything. The default for backtests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&mut self, _event: NotificationEvent) {}
}

/// Buffers events in memory, for tests and post-run inspection.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    events: Vec<NotificationEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[NotificationEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<NotificationEvent> {
        std::mem::take(&mut self.events)
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&mut self, event: NotificationEvent) {
        self.events.push(event);
    }
}
