//! Closed-trade outcomes and the append-only performance record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::PositionSide;
use crate::strategy::StrategyKind;

/// Why a position (or part of one) left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    /// Index of the take-profit level that filled.
    TakeProfit(usize),
    /// Strategy emitted an opposing signal.
    SignalReversal,
    /// Backtest or session ended with the position still open.
    EndOfData,
}

/// A completed (possibly partial) round trip: entry to exit of `quantity`
/// units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub pair: String,
    pub side: PositionSide,
    pub strategy: StrategyKind,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    /// Units closed by this exit, not the position's original size.
    pub quantity: f64,
    pub gross_pnl: f64,
    pub fee: f64,
    pub net_pnl: f64,
    pub exit_reason: ExitReason,
}

impl ClosedTrade {
    /// Return on the closed units as a fraction of their entry cost.
    pub fn return_pct(&self) -> f64 {
        let basis = self.entry_price * self.quantity;
        if basis == 0.0 {
            return 0.0;
        }
        self.net_pnl / basis
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}

/// Ordered, append-only sequence of closed-trade outcomes.
///
/// Entries are never mutated or removed; every metric is a pure reduction
/// over the full list, so a record interrupted mid-run is still a valid
/// record for everything appended so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    trades: Vec<ClosedTrade>,
}

impl PerformanceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, trade: ClosedTrade) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Sum of net PnL across every recorded trade.
    pub fn total_net_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.net_pnl).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_trade(net_pnl: f64) -> ClosedTrade {
        let entry = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        ClosedTrade {
            pair: "BTC/USDT".into(),
            side: PositionSide::Long,
            strategy: StrategyKind::AdaptiveMomentum,
            entry_time: entry,
            entry_price: 100.0,
            exit_time: entry + chrono::Duration::hours(6),
            exit_price: 100.0 + net_pnl / 50.0,
            quantity: 50.0,
            gross_pnl: net_pnl,
            fee: 0.0,
            net_pnl,
            exit_reason: ExitReason::SignalReversal,
        }
    }

    #[test]
    fn return_pct_calculation() {
        let trade = sample_trade(485.0);
        let expected = 485.0 / (100.0 * 50.0);
        assert!((trade.return_pct() - expected).abs() < 1e-10);
    }

    #[test]
    fn record_is_append_only_in_order() {
        let mut record = PerformanceRecord::new();
        record.append(sample_trade(100.0));
        record.append(sample_trade(-40.0));
        record.append(sample_trade(25.0));
        assert_eq!(record.len(), 3);
        let pnls: Vec<f64> = record.trades().iter().map(|t| t.net_pnl).collect();
        assert_eq!(pnls, vec![100.0, -40.0, 25.0]);
        assert!((record.total_net_pnl() - 85.0).abs() < 1e-10);
    }

    #[test]
    fn record_serialization_roundtrip() {
        let mut record = PerformanceRecord::new();
        record.append(sample_trade(100.0));
        let json = serde_json::to_string(&record).unwrap();
        let deser: PerformanceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, deser);
    }
}
