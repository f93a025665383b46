//! Tradewind Runner — everything around the decision engine.
//!
//! This crate builds on `tradewind-core` to provide:
//! - TOML configuration with fail-fast startup validation
//! - CSV candle ingest with strict ordering checks
//! - Single-run orchestration producing persisted, fingerprinted results
//! - Parameter sweeps with deterministic ranking (rayon)
//! - Paper sessions: pair workers, account actor, notification delivery
//! - Session-state persistence for resume without replay

pub mod config;
pub mod data_loader;
pub mod objective;
pub mod persistence;
pub mod report;
pub mod runner;
pub mod session;
pub mod sweep;

pub use config::{AppConfig, ConfigError};
pub use data_loader::{load_candles, LoadError, LoadedSeries};
pub use objective::Objective;
pub use persistence::{load_state, save_result, save_state, PersistError, SessionState};
pub use runner::{run_backtest, run_backtest_resumed, RunError, RunResult, SCHEMA_VERSION};
pub use session::{run_paper_session, PairFeed, PairStats, SessionSummary};
pub use sweep::{expand_grid, run_sweep, SweepConfig, SweepEntry, SweepReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<AppConfig>();
        assert_sync::<AppConfig>();
        assert_send::<SweepConfig>();
        assert_sync::<SweepConfig>();
        assert_send::<Objective>();
        assert_sync::<Objective>();
    }

    #[test]
    fn result_types_are_send_sync() {
        assert_send::<RunResult>();
        assert_sync::<RunResult>();
        assert_send::<SweepReport>();
        assert_sync::<SweepReport>();
        assert_send::<SessionState>();
        assert_sync::<SessionState>();
    }

    #[test]
    fn error_types_are_send_sync() {
        assert_send::<ConfigError>();
        assert_sync::<ConfigError>();
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<PersistError>();
        assert_sync::<PersistError>();
    }
}
