//! Single-run orchestration: configuration and candles in, a fingerprinted
//! result out.
//!
//! The run id binds the full configuration fingerprint to the dataset
//! fingerprint of the exact window replayed, so persisted results can be
//! traced back to both inputs.

use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradewind_core::backtest::{Backtest, EquityPoint};
use tradewind_core::domain::{AccountState, Candle, ClosedTrade};
use tradewind_core::error::EngineError;
use tradewind_core::fingerprint::{dataset_fingerprint, run_id};
use tradewind_core::performance::MetricsSummary;

use crate::config::{AppConfig, ConfigError};
use crate::data_loader::{clip, LoadError};
use crate::persistence::{PersistError, SessionState};

/// Bump when the persisted result layout changes shape.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Errors raised while orchestrating a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    State(#[from] PersistError),
    #[error("session state was saved by config {saved}, current config is {current}; refusing to resume")]
    StateMismatch { saved: String, current: String },
}

/// Persisted outcome of one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Joint fingerprint of configuration and dataset.
    pub run_id: String,
    pub pair: String,
    pub timeframe: String,
    pub config_hash: String,
    pub dataset_hash: String,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub candles: usize,
    pub warmup_candles: usize,
    pub gaps: usize,
    pub signals: usize,
    pub orders_submitted: usize,
    pub fills: usize,
    pub risk_rejections: usize,
    pub interrupted: bool,
    pub metrics: MetricsSummary,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Ledger at the end of the replay, the snapshot a resumed run starts
    /// from.
    pub account: AccountState,
}

/// Replay `candles` under `config` from a fresh account.
pub fn run_backtest(
    config: &AppConfig,
    candles: &[Candle],
    cancel: Option<&AtomicBool>,
) -> Result<RunResult, RunError> {
    run_backtest_resumed(config, candles, None, cancel)
}

/// Replay `candles` under `config`, optionally continuing from persisted
/// session state.
///
/// Resume requires the saved config hash to match the current one: the same
/// parameters may continue over new data, a different strategy may not pick
/// up someone else's ledger. The equity baseline of a resumed run is the
/// snapshot's equity, so returns measure the continuation only.
pub fn run_backtest_resumed(
    config: &AppConfig,
    candles: &[Candle],
    state: Option<&SessionState>,
    cancel: Option<&AtomicBool>,
) -> Result<RunResult, RunError> {
    config.validate()?;
    let timeframe = config.timeframe()?;
    let (start, end) = config.backtest.range()?;
    let window = clip(candles, start, end);
    if window.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "backtest window selects no candles (series has {})",
            candles.len()
        ))
        .into());
    }

    let config_hex = config.fingerprint()?;
    let dataset_hex = dataset_fingerprint(&config.data.pair, window);
    let id = run_id(&config_hex, &dataset_hex);
    let config_hash = config_hex[..16].to_string();
    let dataset_hash = dataset_hex[..16].to_string();

    let pipeline = config.pipeline();
    let backtest = match state {
        None => Backtest::new(
            config.data.pair.clone(),
            timeframe,
            &pipeline,
            config.simulation(),
        )?,
        Some(saved) => {
            if saved.config_hash != config_hash {
                return Err(RunError::StateMismatch {
                    saved: saved.config_hash.clone(),
                    current: config_hash,
                });
            }
            Backtest::with_state(
                config.data.pair.clone(),
                timeframe,
                &pipeline,
                config.simulation(),
                saved.account.clone(),
                saved.record.clone(),
            )?
        }
    };

    let report = backtest.run(window, cancel)?;
    let equity: Vec<f64> = report.equity_curve.iter().map(|point| point.equity).collect();
    let metrics = MetricsSummary::compute(&equity, &report.record);

    Ok(RunResult {
        schema_version: SCHEMA_VERSION,
        run_id: id,
        pair: report.pair,
        timeframe: timeframe.as_str().to_string(),
        config_hash,
        dataset_hash,
        initial_equity: report.initial_equity,
        final_equity: report.final_equity,
        candles: report.candles_processed,
        warmup_candles: report.warmup_candles,
        gaps: report.gaps,
        signals: report.signals,
        orders_submitted: report.orders_submitted,
        fills: report.fills,
        risk_rejections: report.risk_rejections,
        interrupted: report.interrupted,
        metrics,
        trades: report.record.trades().to_vec(),
        equity_curve: report.equity_curve,
        account: report.account,
    })
}
