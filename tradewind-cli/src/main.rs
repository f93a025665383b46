//! Tradewind CLI — backtest, sweep, paper session, and validation commands.
//!
//! Commands:
//! - `backtest` — replay a candle CSV through the decision pipeline
//! - `sweep` — rank a parameter grid by the configured objective
//! - `paper` — drive the live decision path (pair workers, account actor,
//!   notifications) over candle files
//! - `validate` — run configuration validation only

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tradewind_core::domain::PerformanceRecord;
use tradewind_core::ports::{NotificationEvent, NotificationSink};
use tradewind_runner::{
    load_candles, load_state, report, run_backtest_resumed, run_paper_session, run_sweep,
    save_result, save_state, AppConfig, LoadedSeries, PairFeed, RunResult, SessionState,
    SessionSummary, SCHEMA_VERSION,
};

#[derive(Parser)]
#[command(
    name = "tradewind",
    about = "Tradewind CLI — indicator-driven trading decision engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a candle CSV through the decision pipeline and report the run.
    Backtest {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Candle CSV. Falls back to `data.csv` from the config.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Output directory for the result JSON.
        #[arg(long, default_value = "results")]
        output: PathBuf,

        /// Session state file: loaded before the run if present, rewritten
        /// with the post-run snapshot.
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Run every grid candidate and rank them by the configured objective.
    Sweep {
        /// Path to a TOML config file (the `[sweep]` section spans the grid).
        #[arg(long)]
        config: PathBuf,

        /// Candle CSV. Falls back to `data.csv` from the config.
        #[arg(long)]
        data: Option<PathBuf>,

        /// How many ranked candidates to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Drive the live decision path over candle files, printing each
    /// notification as it happens.
    Paper {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Candle CSV for the configured pair. Repeat for more pairs as
        /// PAIR=PATH.
        #[arg(long, required = true)]
        data: Vec<String>,

        /// Session state file: loaded before the run if present, rewritten
        /// with the post-run snapshot.
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Parse and validate a config file, exiting non-zero on any error.
    Validate {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            config,
            data,
            output,
            state,
        } => run_backtest_cmd(&config, data.as_deref(), &output, state.as_deref()),
        Commands::Sweep { config, data, top } => run_sweep_cmd(&config, data.as_deref(), top),
        Commands::Paper {
            config,
            data,
            state,
        } => run_paper_cmd(&config, &data, state.as_deref()),
        Commands::Validate { config } => run_validate_cmd(&config),
    }
}

fn run_backtest_cmd(
    config_path: &Path,
    data: Option<&Path>,
    output: &Path,
    state_path: Option<&Path>,
) -> Result<()> {
    let config = AppConfig::from_file(config_path)?;
    let series = load_series(&config, data)?;
    let resume = load_resume(state_path)?;

    let result = run_backtest_resumed(&config, &series.candles, resume.as_ref(), None)?;
    print!("{}", report::run_summary(&result));

    let artifact = save_result(output, &result)?;
    println!("Result saved to: {}", artifact.display());
    if let Some(path) = state_path {
        save_state(path, &state_from_result(&result))?;
        println!("Session state saved to: {}", path.display());
    }
    Ok(())
}

fn run_sweep_cmd(config_path: &Path, data: Option<&Path>, top: usize) -> Result<()> {
    let config = AppConfig::from_file(config_path)?;
    let series = load_series(&config, data)?;

    println!(
        "Sweeping {} candidate(s) over {} candles...",
        config.sweep.grid_size(),
        series.candles.len()
    );
    let sweep = run_sweep(&config, &series.candles, None)?;
    print!("{}", report::sweep_table(&sweep, top));
    Ok(())
}

fn run_paper_cmd(config_path: &Path, data: &[String], state_path: Option<&Path>) -> Result<()> {
    let config = AppConfig::from_file(config_path)?;
    let timeframe = config.timeframe()?;

    let mut feeds = Vec::with_capacity(data.len());
    for entry in data {
        let (pair, path) = match entry.split_once('=') {
            Some((pair, path)) => (pair.to_string(), PathBuf::from(path)),
            None => (config.data.pair.clone(), PathBuf::from(entry.as_str())),
        };
        let series = load_candles(&path, timeframe)?;
        println!(
            "Loaded {} candles for {pair} from {} ({} gaps)",
            series.candles.len(),
            path.display(),
            series.gaps
        );
        feeds.push(PairFeed {
            pair,
            candles: series.candles,
        });
    }

    let resume = load_resume(state_path)?;
    let mut sink = StdoutSink;
    let summary = run_paper_session(&config, feeds, resume.as_ref(), &mut sink, None)?;
    print!("{}", report::session_summary(&summary));

    if let Some(path) = state_path {
        save_state(path, &state_from_session(&config, &summary)?)?;
        println!("Session state saved to: {}", path.display());
    }
    Ok(())
}

fn run_validate_cmd(config_path: &Path) -> Result<()> {
    let config = AppConfig::from_file(config_path)?;

    println!("Configuration is valid.");
    println!("Pair:        {}", config.data.pair);
    println!("Timeframe:   {}", config.timeframe()?.as_str());
    println!("Fingerprint: {}", &config.fingerprint()?[..16]);
    println!("Sweep grid:  {} candidate(s)", config.sweep.grid_size());
    Ok(())
}

fn load_series(config: &AppConfig, data: Option<&Path>) -> Result<LoadedSeries> {
    let path = match data {
        Some(path) => path.to_path_buf(),
        None => match &config.data.csv {
            Some(path) => path.clone(),
            None => bail!("no candle data: pass --data or set `data.csv` in the config"),
        },
    };
    let series = load_candles(&path, config.timeframe()?)?;
    println!(
        "Loaded {} candles from {} ({} gaps)",
        series.candles.len(),
        path.display(),
        series.gaps
    );
    Ok(series)
}

fn load_resume(state_path: Option<&Path>) -> Result<Option<SessionState>> {
    let Some(path) = state_path else {
        return Ok(None);
    };
    let resume = load_state(path)?;
    match &resume {
        Some(saved) => println!("Resuming from state saved at {}", saved.saved_at),
        None => println!("No saved state at {}, starting fresh", path.display()),
    }
    Ok(resume)
}

fn state_from_result(result: &RunResult) -> SessionState {
    let mut record = PerformanceRecord::new();
    for trade in &result.trades {
        record.append(trade.clone());
    }
    SessionState {
        schema_version: SCHEMA_VERSION,
        run_id: result.run_id.clone(),
        config_hash: result.config_hash.clone(),
        account: result.account.clone(),
        record,
        saved_at: Utc::now(),
    }
}

fn state_from_session(config: &AppConfig, summary: &SessionSummary) -> Result<SessionState> {
    Ok(SessionState {
        schema_version: SCHEMA_VERSION,
        run_id: summary.session_id.clone(),
        config_hash: config.fingerprint()?[..16].to_string(),
        account: summary.account.clone(),
        record: summary.record.clone(),
        saved_at: Utc::now(),
    })
}

/// Prints one line per notification. The paper command's sink.
struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn notify(&mut self, event: NotificationEvent) {
        match event {
            NotificationEvent::SignalGenerated { signal } => {
                println!(
                    "[signal] {} {:?} confidence {:.2} ({:?})",
                    signal.pair, signal.direction, signal.confidence, signal.strategy
                );
            }
            NotificationEvent::PositionOpened {
                pair,
                side,
                size,
                entry_price,
                at,
            } => {
                println!("[open]   {pair} {side:?} {size:.6} @ {entry_price:.2} ({at})");
            }
            NotificationEvent::PositionClosed { trade } => {
                println!(
                    "[close]  {} {:?} net {:+.2} ({:?})",
                    trade.pair, trade.side, trade.net_pnl, trade.exit_reason
                );
            }
            NotificationEvent::RiskLimitBreached { pair, reason, at } => {
                println!("[risk]   {pair}: {reason} ({at})");
            }
        }
    }
}
