//! Explicit strategy memory threaded through signal evaluation.
//!
//! Strategies are pure functions of (context, memory); anything they need
//! to remember between cycles lives here and is advanced by the caller
//! after each evaluation. Nothing in this module is global.

use serde::{Deserialize, Serialize};

use crate::domain::signal::Signal;
use crate::indicators::IndicatorSnapshot;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyMemory {
    /// Snapshot from the previous cycle, for crossover and slope rules.
    pub last_snapshot: Option<IndicatorSnapshot>,
    /// Signal emitted on the previous cycle.
    pub last_signal: Option<Signal>,
}

impl StrategyMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory for the next cycle after observing `snapshot` and emitting
    /// `signal` this cycle.
    pub fn advanced(&self, snapshot: &IndicatorSnapshot, signal: &Signal) -> Self {
        Self {
            last_snapshot: Some(*snapshot),
            last_signal: Some(signal.clone()),
        }
    }
}
