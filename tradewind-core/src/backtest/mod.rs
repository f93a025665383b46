//! Historical replay of the decision pipeline over a candle series.
//!
//! The replay honors the same information boundary as a live session: the
//! pipeline sees candles strictly in order, entry orders fill at the NEXT
//! candle's open, and nothing downstream ever reads past the candle being
//! processed. Stops and targets are resolved against each candle's range
//! before the decision cycle runs, stop first when both sit inside one
//! candle.

pub mod execution;

pub use execution::{ExecutionConfig, SimulatedExecutor, SlippageModel};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::account::{AccountState, PortfolioLimits};
use crate::domain::candle::{validate_series, Candle, SeriesDefect, Timeframe};
use crate::domain::decision::RiskDecision;
use crate::domain::position::PositionSide;
use crate::domain::trade::{ExitReason, PerformanceRecord};
use crate::domain::signal::Direction;
use crate::engine::{DecisionPipeline, PipelineConfig};
use crate::error::EngineError;
use crate::ports::{ExecutionEvent, ExecutionPort, OrderRequest};

/// Replay-only knobs. Pipeline behavior lives in [`PipelineConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestConfig {
    pub initial_equity: f64,
    pub execution: ExecutionConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_equity: 10_000.0,
            execution: ExecutionConfig::default(),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.initial_equity.is_finite() || self.initial_equity <= 0.0 {
            return Err(EngineError::Configuration(format!(
                "initial_equity must be positive, got {}",
                self.initial_equity
            )));
        }
        self.execution.validate()
    }
}

/// Marked equity after one processed candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Everything one replay produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub pair: String,
    pub timeframe: Timeframe,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub candles_processed: usize,
    /// Candles consumed by warmup, including re-warmups after gaps.
    pub warmup_candles: usize,
    /// Gaps encountered in the series (each one resets the pipeline).
    pub gaps: usize,
    /// Directional (non-hold) signals.
    pub signals: usize,
    pub orders_submitted: usize,
    pub fills: usize,
    /// Signals and fills vetoed by risk checks.
    pub risk_rejections: usize,
    pub equity_curve: Vec<EquityPoint>,
    pub record: PerformanceRecord,
    pub account: AccountState,
    /// True when the run was cancelled before consuming every candle.
    pub interrupted: bool,
}

/// Drives one pair's pipeline over one candle series.
pub struct Backtest {
    pair: String,
    timeframe: Timeframe,
    config: BacktestConfig,
    pipeline: DecisionPipeline,
    executor: SimulatedExecutor,
    account: AccountState,
    limits: PortfolioLimits,
    record: PerformanceRecord,
    equity_curve: Vec<EquityPoint>,
    /// Decision backing the order currently resting with the executor.
    pending_decision: Option<RiskDecision>,
    warmup_candles: usize,
    gaps: usize,
    signals: usize,
    orders_submitted: usize,
    fills: usize,
    risk_rejections: usize,
}

impl Backtest {
    pub fn new(
        pair: impl Into<String>,
        timeframe: Timeframe,
        pipeline_config: &PipelineConfig,
        config: BacktestConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let pair = pair.into();
        let pipeline = DecisionPipeline::new(pair.clone(), pipeline_config)?;
        let executor = SimulatedExecutor::new(config.execution.clone())?;
        let account = AccountState::new(config.initial_equity);
        let limits = pipeline_config.limits();
        Ok(Self {
            pair,
            timeframe,
            config,
            pipeline,
            executor,
            account,
            limits,
            record: PerformanceRecord::new(),
            equity_curve: Vec::new(),
            pending_decision: None,
            warmup_candles: 0,
            gaps: 0,
            signals: 0,
            orders_submitted: 0,
            fills: 0,
            risk_rejections: 0,
        })
    }

    /// Continue from a persisted ledger instead of a fresh one.
    ///
    /// The equity baseline becomes the resumed account's cash equity, so
    /// returns are measured from the resume point rather than the original
    /// deposit. Open positions in the snapshot are managed from the first
    /// candle on.
    pub fn with_state(
        pair: impl Into<String>,
        timeframe: Timeframe,
        pipeline_config: &PipelineConfig,
        mut config: BacktestConfig,
        account: AccountState,
        record: PerformanceRecord,
    ) -> Result<Self, EngineError> {
        config.initial_equity = account.total_equity;
        let mut backtest = Self::new(pair, timeframe, pipeline_config, config)?;
        backtest.account = account;
        backtest.record = record;
        Ok(backtest)
    }

    pub fn required_history(&self) -> usize {
        self.pipeline.required_history()
    }

    /// Replay the series to completion, or until `cancel` is raised.
    ///
    /// Out-of-order or malformed candles fail the whole run up front; a
    /// replay over bad data is not worth finishing. Gaps are fine, they
    /// reset warmup mid-run. A cancelled run returns the partial report,
    /// valid up to the last processed candle.
    pub fn run(
        mut self,
        candles: &[Candle],
        cancel: Option<&AtomicBool>,
    ) -> Result<BacktestReport, EngineError> {
        for defect in validate_series(candles, self.timeframe) {
            match defect {
                SeriesDefect::OutOfOrder { index } => {
                    return Err(EngineError::Configuration(format!(
                        "candle {index} is out of order"
                    )));
                }
                SeriesDefect::Insane { index } => {
                    return Err(EngineError::Configuration(format!(
                        "candle {index} fails the OHLCV sanity check"
                    )));
                }
                SeriesDefect::Gap { .. } => {}
            }
        }

        let step = self.timeframe.duration();
        let mut last_seen: Option<DateTime<Utc>> = None;
        let mut processed = 0;
        let mut interrupted = false;

        for candle in candles {
            if cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false) {
                interrupted = true;
                break;
            }

            if let Some(last) = last_seen {
                if candle.timestamp - last > step {
                    self.pipeline.reset();
                    self.executor.cancel_pending();
                    self.pending_decision = None;
                    self.gaps += 1;
                }
            }

            // 1. fills for orders submitted on the previous candle
            self.executor.on_candle_open(candle);
            for event in self.executor.drain_events() {
                self.apply_fill(event)?;
            }

            // 2. stops, targets, and the trailing ratchet against this range
            self.manage_position(candle)?;

            // 3. the decision cycle at the close
            self.run_cycle(candle)?;

            // 4. mark equity at the close
            let mut marks = BTreeMap::new();
            marks.insert(self.pair.clone(), candle.close);
            self.equity_curve.push(EquityPoint {
                timestamp: candle.timestamp,
                equity: self.account.marked_equity(&marks),
            });

            last_seen = Some(candle.timestamp);
            processed += 1;
        }

        // wind down: drop the resting order, close what is still open
        self.executor.cancel_pending();
        self.pending_decision = None;
        if !interrupted {
            if let Some(last) = candles.last() {
                self.close_remaining(last, ExitReason::EndOfData)?;
            }
        }

        Ok(BacktestReport {
            pair: self.pair,
            timeframe: self.timeframe,
            initial_equity: self.config.initial_equity,
            final_equity: self.account.total_equity,
            candles_processed: processed,
            warmup_candles: self.warmup_candles,
            gaps: self.gaps,
            signals: self.signals,
            orders_submitted: self.orders_submitted,
            fills: self.fills,
            risk_rejections: self.risk_rejections,
            equity_curve: self.equity_curve,
            record: self.record,
            account: self.account,
            interrupted,
        })
    }

    fn apply_fill(&mut self, event: ExecutionEvent) -> Result<(), EngineError> {
        match event {
            ExecutionEvent::Filled { price, fee, at, .. } => {
                let decision = self.pending_decision.take().ok_or_else(|| {
                    EngineError::ExecutionFailure(format!(
                        "fill for {} without a pending decision",
                        self.pair
                    ))
                })?;
                match self.account.open_position(&decision, &self.limits, price, fee, at) {
                    Ok(()) => self.fills += 1,
                    // a fill that gapped through its stop or no longer fits
                    // the ceilings is dropped whole
                    Err(err) if err.is_recoverable() => self.risk_rejections += 1,
                    Err(err) => return Err(err),
                }
            }
            ExecutionEvent::Rejected { .. } => {
                self.pending_decision = None;
                self.risk_rejections += 1;
            }
        }
        Ok(())
    }

    /// Resolve exits against one candle: stop first, then take-profit
    /// levels in ladder order, then the trailing ratchet at the close.
    fn manage_position(&mut self, candle: &Candle) -> Result<(), EngineError> {
        let Some((side, stop)) = self
            .account
            .open_positions
            .get(&self.pair)
            .map(|p| (p.side, p.stop_loss))
        else {
            return Ok(());
        };

        let stop_hit = match side {
            PositionSide::Long => candle.low <= stop,
            PositionSide::Short => candle.high >= stop,
        };
        if stop_hit {
            let price = self.executor.exit_price(side, stop);
            let quantity = self.remaining_quantity();
            let fee = self.executor.fee_for(price, quantity);
            let trade = self.account.close_position(
                &self.pair,
                price,
                fee,
                candle.timestamp,
                ExitReason::StopLoss,
            )?;
            self.record.append(trade);
            return Ok(());
        }

        loop {
            let next = self.account.open_positions.get(&self.pair).and_then(|p| {
                p.take_profit_levels
                    .iter()
                    .enumerate()
                    .find(|(_, level)| {
                        !level.filled
                            && match side {
                                PositionSide::Long => candle.high >= level.price,
                                PositionSide::Short => candle.low <= level.price,
                            }
                    })
                    .map(|(index, level)| {
                        (index, level.price, (p.size * level.fraction).min(p.remaining))
                    })
            });
            let Some((index, trigger, quantity)) = next else {
                break;
            };
            let price = self.executor.exit_price(side, trigger);
            let fee = self.executor.fee_for(price, quantity);
            let trade = self
                .account
                .fill_take_profit(&self.pair, index, price, fee, candle.timestamp)?;
            self.record.append(trade);
        }

        if let Some(candidate) = self.pipeline.trailing_candidate(side, candle.close) {
            if let Some(position) = self.account.open_positions.get_mut(&self.pair) {
                position.ratchet_stop(candidate);
            }
        }
        Ok(())
    }

    /// One decision cycle. A directional signal against an open position
    /// closes it at the candle's close; a fresh signal with no position and
    /// no resting order becomes the next entry order.
    fn run_cycle(&mut self, candle: &Candle) -> Result<(), EngineError> {
        let outcome = match self.pipeline.observe(candle, &self.account) {
            Ok(outcome) => outcome,
            Err(EngineError::InsufficientHistory { .. }) => {
                self.warmup_candles += 1;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if outcome.signal.direction.is_hold() {
            return Ok(());
        }
        self.signals += 1;

        let open_side = self.account.open_positions.get(&self.pair).map(|p| p.side);
        if let Some(side) = open_side {
            let opposes = match side {
                PositionSide::Long => outcome.signal.direction == Direction::Sell,
                PositionSide::Short => outcome.signal.direction == Direction::Buy,
            };
            if opposes {
                self.close_remaining(candle, ExitReason::SignalReversal)?;
            }
            // aligned signal with a position already on: nothing to add
            return Ok(());
        }

        if self.pending_decision.is_some() {
            // one resting order at a time
            return Ok(());
        }
        if outcome.rejection.is_some() {
            self.risk_rejections += 1;
            return Ok(());
        }
        if let Some(decision) = outcome.decision {
            self.executor.submit(OrderRequest::from_decision(&decision))?;
            self.pending_decision = Some(decision);
            self.orders_submitted += 1;
        }
        Ok(())
    }

    /// Market-close whatever is still open at this candle's close.
    fn close_remaining(&mut self, candle: &Candle, reason: ExitReason) -> Result<(), EngineError> {
        let Some(side) = self.account.open_positions.get(&self.pair).map(|p| p.side) else {
            return Ok(());
        };
        let price = self.executor.exit_price(side, candle.close);
        let quantity = self.remaining_quantity();
        let fee = self.executor.fee_for(price, quantity);
        let trade =
            self.account
                .close_position(&self.pair, price, fee, candle.timestamp, reason)?;
        self.record.append(trade);
        Ok(())
    }

    fn remaining_quantity(&self) -> f64 {
        self.account
            .open_positions
            .get(&self.pair)
            .map(|p| p.remaining)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{Position, PositionStatus, TakeProfitLevel};
    use crate::risk::{StopLossPolicy, TakeProfitPolicy};
    use crate::strategy::{ModelBased, StrategyKind};
    use chrono::{Duration, TimeZone, Utc};

    fn small_pipeline_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.indicators.sma_short = 2;
        config.indicators.sma_long = 4;
        config.indicators.rsi_period = 3;
        config.indicators.atr_period = 3;
        config.indicators.adx_period = 3;
        config.indicators.bollinger_period = 4;
        config.indicators.macd_fast = 3;
        config.indicators.macd_slow = 5;
        config.indicators.macd_signal = 2;
        config
    }

    fn eager_entry_config() -> PipelineConfig {
        let mut config = small_pipeline_config();
        config.strategy.pinned = Some(StrategyKind::ModelBased);
        config.strategy.model_based = ModelBased {
            entry_threshold: 0.05,
            ..ModelBased::default()
        };
        // wide exits keep a gentle ramp from triggering them
        config.risk.stop_loss = StopLossPolicy::FixedPct { percentage: 0.20 };
        config.risk.take_profit = TakeProfitPolicy::FixedPct { percentage: 0.50 };
        config
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    // Rising tape where no close ever equals an open, so fill provenance
    // is distinguishable in assertions.
    fn ramp(count: usize, start: f64, step: f64) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let open = start + step * i as f64;
                let close = open + step * 0.6;
                Candle {
                    timestamp: base_time() + Duration::hours(i as i64),
                    open,
                    high: close + step.abs() * 0.2,
                    low: open - step.abs() * 0.2,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    fn flat(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| Candle {
                timestamp: base_time() + Duration::hours(i as i64),
                open: 100.0,
                high: 100.1,
                low: 99.9,
                close: 100.0,
                volume: 1_000.0,
            })
            .collect()
    }

    fn frictionless() -> BacktestConfig {
        BacktestConfig {
            initial_equity: 10_000.0,
            execution: ExecutionConfig {
                fee_rate: 0.0,
                slippage: SlippageModel::None,
            },
        }
    }

    #[test]
    fn flat_tape_produces_no_trades() {
        let backtest = Backtest::new(
            "BTC/USDT",
            Timeframe::H1,
            &small_pipeline_config(),
            frictionless(),
        )
        .unwrap();
        let candles = flat(backtest.required_history() + 5);
        let report = backtest.run(&candles, None).unwrap();

        assert_eq!(report.candles_processed, candles.len());
        assert_eq!(report.signals, 0);
        assert_eq!(report.fills, 0);
        assert!(report.record.is_empty());
        assert!((report.final_equity - 10_000.0).abs() < 1e-9);
        assert_eq!(report.equity_curve.len(), candles.len());
    }

    #[test]
    fn uptrend_opens_long_and_closes_at_end_of_data() {
        let backtest = Backtest::new(
            "BTC/USDT",
            Timeframe::H1,
            &eager_entry_config(),
            frictionless(),
        )
        .unwrap();
        let candles = ramp(backtest.required_history() + 10, 100.0, 0.3);
        let report = backtest.run(&candles, None).unwrap();

        assert!(report.signals > 0);
        assert_eq!(report.orders_submitted, 1, "one position at a time");
        assert_eq!(report.fills, 1);
        assert_eq!(report.record.len(), 1);
        let trade = &report.record.trades()[0];
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert!(trade.net_pnl > 0.0, "a ramp should pay a long");
        assert!(report.account.open_positions.is_empty());
        assert!((report.final_equity - (10_000.0 + trade.net_pnl)).abs() < 1e-6);
    }

    #[test]
    fn entry_fills_at_next_open_not_signal_close() {
        let backtest = Backtest::new(
            "BTC/USDT",
            Timeframe::H1,
            &eager_entry_config(),
            frictionless(),
        )
        .unwrap();
        let candles = ramp(backtest.required_history() + 10, 100.0, 0.3);
        let opens: Vec<f64> = candles.iter().map(|c| c.open).collect();
        let report = backtest.run(&candles, None).unwrap();

        let entry = report.record.trades()[0].entry_price;
        assert!(
            opens.iter().any(|open| (open - entry).abs() < 1e-9),
            "entry price {entry} should be one of the candle opens"
        );
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        assert!(
            closes.iter().all(|close| (close - entry).abs() > 1e-9),
            "entry price {entry} must not equal any close on this strictly increasing tape"
        );
    }

    #[test]
    fn stop_fires_before_target_inside_one_candle() {
        let mut backtest = Backtest::new(
            "BTC/USDT",
            Timeframe::H1,
            &small_pipeline_config(),
            frictionless(),
        )
        .unwrap();

        // long from 100, stop 95, target 105
        backtest.account.open_positions.insert(
            "BTC/USDT".to_string(),
            Position {
                pair: "BTC/USDT".to_string(),
                side: PositionSide::Long,
                entry_price: 100.0,
                size: 10.0,
                remaining: 10.0,
                stop_loss: 95.0,
                take_profit_levels: vec![TakeProfitLevel::new(105.0, 1.0)],
                risk_amount: 50.0,
                opened_at: base_time(),
                status: PositionStatus::Open,
                strategy: StrategyKind::AdaptiveMomentum,
            },
        );
        backtest.account.allocated_risk = 50.0;

        // one candle whose range covers both exits
        let wide = Candle {
            timestamp: base_time() + Duration::hours(1),
            open: 100.0,
            high: 106.0,
            low: 94.0,
            close: 100.0,
            volume: 5_000.0,
        };
        backtest.manage_position(&wide).unwrap();

        assert_eq!(backtest.record.len(), 1);
        let trade = &backtest.record.trades()[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!((trade.exit_price - 95.0).abs() < 1e-9);
        assert!(backtest.account.open_positions.is_empty());
    }

    #[test]
    fn ladder_levels_fill_in_order_within_reach() {
        let mut backtest = Backtest::new(
            "BTC/USDT",
            Timeframe::H1,
            &small_pipeline_config(),
            frictionless(),
        )
        .unwrap();

        backtest.account.open_positions.insert(
            "BTC/USDT".to_string(),
            Position {
                pair: "BTC/USDT".to_string(),
                side: PositionSide::Long,
                entry_price: 100.0,
                size: 10.0,
                remaining: 10.0,
                stop_loss: 90.0,
                take_profit_levels: vec![
                    TakeProfitLevel::new(105.0, 0.3),
                    TakeProfitLevel::new(110.0, 0.3),
                    TakeProfitLevel::new(120.0, 0.4),
                ],
                risk_amount: 100.0,
                opened_at: base_time(),
                status: PositionStatus::Open,
                strategy: StrategyKind::AdaptiveMomentum,
            },
        );
        backtest.account.allocated_risk = 100.0;

        // reaches the first two rungs, not the third
        let surge = Candle {
            timestamp: base_time() + Duration::hours(1),
            open: 102.0,
            high: 111.0,
            low: 101.0,
            close: 110.5,
            volume: 5_000.0,
        };
        backtest.manage_position(&surge).unwrap();

        let trades = backtest.record.trades();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].exit_reason, ExitReason::TakeProfit(0));
        assert_eq!(trades[1].exit_reason, ExitReason::TakeProfit(1));
        let position = &backtest.account.open_positions["BTC/USDT"];
        assert!((position.remaining - 4.0).abs() < 1e-9);
        assert_eq!(position.status, PositionStatus::PartiallyClosed);
    }

    #[test]
    fn gap_resets_warmup_mid_run() {
        let config = small_pipeline_config();
        let backtest =
            Backtest::new("BTC/USDT", Timeframe::H1, &config, frictionless()).unwrap();
        let required = backtest.required_history();

        let mut candles = flat(required + 2);
        let resume = base_time() + Duration::hours((required + 2 + 6) as i64);
        for i in 0..required {
            candles.push(Candle {
                timestamp: resume + Duration::hours(i as i64),
                open: 100.0,
                high: 100.1,
                low: 99.9,
                close: 100.0,
                volume: 1_000.0,
            });
        }

        let report = backtest.run(&candles, None).unwrap();
        assert_eq!(report.gaps, 1);
        // warmup runs twice: full series start plus the restart at the gap
        assert_eq!(report.warmup_candles, 2 * (required - 1));
    }

    #[test]
    fn cancellation_returns_partial_report() {
        let backtest = Backtest::new(
            "BTC/USDT",
            Timeframe::H1,
            &small_pipeline_config(),
            frictionless(),
        )
        .unwrap();
        let candles = flat(backtest.required_history() + 5);
        let cancel = AtomicBool::new(true);
        let report = backtest.run(&candles, Some(&cancel)).unwrap();

        assert!(report.interrupted);
        assert_eq!(report.candles_processed, 0);
        assert!(report.equity_curve.is_empty());
    }

    #[test]
    fn out_of_order_series_fails_the_run() {
        let backtest = Backtest::new(
            "BTC/USDT",
            Timeframe::H1,
            &small_pipeline_config(),
            frictionless(),
        )
        .unwrap();
        let mut candles = flat(10);
        candles.swap(4, 5);
        let err = backtest.run(&candles, None).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn reversal_signal_closes_the_open_position() {
        let mut backtest = Backtest::new(
            "BTC/USDT",
            Timeframe::H1,
            &eager_entry_config(),
            frictionless(),
        )
        .unwrap();
        let required = backtest.required_history();

        // hold a short through a rising tape: the model flips long and the
        // short is closed on the reversal rather than riding the ramp
        backtest.account.open_positions.insert(
            "BTC/USDT".to_string(),
            Position {
                pair: "BTC/USDT".to_string(),
                side: PositionSide::Short,
                entry_price: 100.0,
                size: 5.0,
                remaining: 5.0,
                stop_loss: 1_000.0,
                take_profit_levels: vec![TakeProfitLevel::new(1.0, 1.0)],
                risk_amount: 10.0,
                opened_at: base_time() - Duration::hours(1),
                status: PositionStatus::Open,
                strategy: StrategyKind::AdaptiveMomentum,
            },
        );
        backtest.account.allocated_risk = 10.0;

        let candles = ramp(required + 6, 100.0, 0.3);
        let report = backtest.run(&candles, None).unwrap();

        let reversal = report
            .record
            .trades()
            .iter()
            .find(|t| t.exit_reason == ExitReason::SignalReversal);
        assert!(reversal.is_some(), "rising tape should close the short");
        assert_eq!(reversal.map(|t| t.side), Some(PositionSide::Short));
    }
}
