//! Tradewind Core — the trading decision engine.
//!
//! Everything needed to turn a candle stream into risk-checked decisions:
//! - Domain types (candles, signals, positions, decisions, account ledger)
//! - Incremental indicator engine with a bounded rolling window
//! - Regime classification and regime-conditioned strategy selection
//! - Risk manager: sizing, stops, scaled take-profits, portfolio ceilings
//! - Account-owner actor serializing all ledger mutations
//! - Backtest engine replaying the identical pipeline over history
//! - Pure performance reductions over the closed-trade record
//!
//! No venue connectivity lives here. Execution is a port; backtests plug in
//! the simulator, a paper session plugs in its own collaborator.

pub mod actor;
pub mod backtest;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod indicators;
pub mod performance;
pub mod ports;
pub mod regime;
pub mod risk;
pub mod strategy;
pub mod synthetic;
