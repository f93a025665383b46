//! Application configuration loaded from TOML.
//!
//! A config file groups the data source, execution assumptions, the full
//! decision pipeline, an optional backtest window, and the sweep grid. Every
//! section has defaults, so an empty file is a valid (if not very
//! interesting) configuration. Validation is fail-fast: the first violated
//! constraint aborts the run before any candle is read.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradewind_core::backtest::{BacktestConfig, ExecutionConfig, SlippageModel};
use tradewind_core::domain::Timeframe;
use tradewind_core::engine::PipelineConfig;
use tradewind_core::error::EngineError;
use tradewind_core::fingerprint::config_fingerprint;
use tradewind_core::indicators::IndicatorConfig;
use tradewind_core::regime::RegimeConfig;
use tradewind_core::risk::RiskConfig;
use tradewind_core::strategy::StrategyConfig;

use crate::sweep::SweepConfig;

/// Errors raised while loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<EngineError> for ConfigError {
    fn from(err: EngineError) -> Self {
        // Core validation already says "configuration error: ..."; keep the
        // bare message so the two prefixes do not stack.
        match err {
            EngineError::Configuration(msg) => ConfigError::Invalid(msg),
            other => ConfigError::Invalid(other.to_string()),
        }
    }
}

/// Where the candle series comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Instrument identifier, e.g. `BTC/USDT`.
    pub pair: String,
    /// Candle timeframe, one of `1m`, `5m`, `15m`, `1h`, `4h`, `1d`.
    pub timeframe: String,
    /// CSV file with the series; a CLI flag may override this.
    pub csv: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            pair: "BTC/USDT".to_string(),
            timeframe: "1h".to_string(),
            csv: None,
        }
    }
}

/// Execution assumptions for simulated fills.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub initial_equity: f64,
    /// Fee as a fraction of notional, charged per fill.
    pub fee_rate: f64,
    /// Slippage in basis points; zero disables the slippage model.
    pub slippage_bps: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            fee_rate: 0.001,
            slippage_bps: 5.0,
        }
    }
}

/// Optional date window the loaded series is clipped to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestWindow {
    /// Inclusive start date, `YYYY-MM-DD`.
    pub start: Option<String>,
    /// Inclusive end date, `YYYY-MM-DD`.
    pub end: Option<String>,
}

impl BacktestWindow {
    /// Parsed window bounds. An inverted window is rejected here rather than
    /// producing an empty series later; `start == end` is a one-day window
    /// because the end day is inclusive.
    pub fn range(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>), ConfigError> {
        let start = parse_date("backtest.start", self.start.as_deref())?;
        let end = parse_date("backtest.end", self.end.as_deref())?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(ConfigError::Invalid(format!(
                    "backtest window is inverted: start {start} is after end {end}"
                )));
            }
        }
        Ok((start, end))
    }
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ConfigError> {
    match value {
        None => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                ConfigError::Invalid(format!("{field} '{text}' is not a YYYY-MM-DD date"))
            }),
    }
}

/// Top-level application configuration.
///
/// The pipeline sections reuse the core config types directly, so a TOML
/// file can tune any indicator period, regime threshold, strategy weight, or
/// risk limit the engine understands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub data: DataConfig,
    pub engine: EngineConfig,
    pub indicators: IndicatorConfig,
    pub regime: RegimeConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub backtest: BacktestWindow,
    pub sweep: SweepConfig,
}

impl AppConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every constraint the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.pair.trim().is_empty() {
            return Err(ConfigError::Invalid("data.pair must not be empty".into()));
        }
        self.timeframe()?;
        self.simulation().validate()?;
        self.pipeline().validate()?;
        self.backtest.range()?;
        self.sweep.validate()?;
        Ok(())
    }

    /// Parsed candle timeframe.
    pub fn timeframe(&self) -> Result<Timeframe, ConfigError> {
        Timeframe::parse(&self.data.timeframe).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "unknown timeframe '{}', expected one of 1m, 5m, 15m, 1h, 4h, 1d",
                self.data.timeframe
            ))
        })
    }

    /// Decision pipeline configuration assembled from the TOML sections.
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            indicators: self.indicators.clone(),
            regime: self.regime.clone(),
            strategy: self.strategy.clone(),
            risk: self.risk.clone(),
        }
    }

    /// Simulation settings for the backtest executor.
    pub fn simulation(&self) -> BacktestConfig {
        let slippage = if self.engine.slippage_bps == 0.0 {
            SlippageModel::None
        } else {
            SlippageModel::FixedBps {
                bps: self.engine.slippage_bps,
            }
        };
        BacktestConfig {
            initial_equity: self.engine.initial_equity,
            execution: ExecutionConfig {
                fee_rate: self.engine.fee_rate,
                slippage,
            },
        }
    }

    /// Content hash over every field of the configuration.
    ///
    /// Two configs that differ anywhere get different fingerprints, and the
    /// same config always gets the same one. The runner folds this into the
    /// run id and persists a short prefix for display.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        Ok(config_fingerprint(self)?)
    }
}
