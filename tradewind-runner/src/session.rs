//! Paper sessions: the concurrent assembly the backtest replays serially.
//!
//! One worker thread per pair drives that pair's decision pipeline and
//! simulated executor over its feed. All ledger mutations go through the
//! account-owner actor, so portfolio ceilings hold across pairs without
//! locks. Workers emit notification events over a channel; the caller's
//! sink sees them on the session thread, in arrival order.
//!
//! A session ends with positions still open. Unlike a backtest there is no
//! end-of-data close: the ledger is meant to be persisted and resumed when
//! the next batch of candles arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tradewind_core::actor::{spawn_account_owner, AccountHandle};
use tradewind_core::backtest::SimulatedExecutor;
use tradewind_core::domain::{
    validate_series, AccountState, Candle, ClosedTrade, Direction, ExitReason, PerformanceRecord,
    PositionSide, RiskDecision, SeriesDefect, Timeframe,
};
use tradewind_core::engine::DecisionPipeline;
use tradewind_core::error::EngineError;
use tradewind_core::fingerprint::{dataset_fingerprint, run_id};
use tradewind_core::ports::{
    ExecutionEvent, ExecutionPort, NotificationEvent, NotificationSink, OrderRequest,
};

use crate::config::{AppConfig, ConfigError};
use crate::persistence::SessionState;
use crate::runner::RunError;

/// One pair's candle series for a session.
#[derive(Debug, Clone)]
pub struct PairFeed {
    pub pair: String,
    pub candles: Vec<Candle>,
}

/// Per-pair counters, mirroring the backtest report's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairStats {
    pub pair: String,
    pub candles: usize,
    pub warmup_candles: usize,
    pub gaps: usize,
    pub signals: usize,
    pub orders_submitted: usize,
    pub fills: usize,
    pub risk_rejections: usize,
    pub trades_closed: usize,
}

impl PairStats {
    fn new(pair: &str) -> Self {
        Self {
            pair: pair.to_string(),
            candles: 0,
            warmup_candles: 0,
            gaps: 0,
            signals: 0,
            orders_submitted: 0,
            fills: 0,
            risk_rejections: 0,
            trades_closed: 0,
        }
    }
}

/// What a finished session hands back.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Fingerprint chain over the config and every feed, stable across
    /// re-runs of the same inputs.
    pub session_id: String,
    pub account: AccountState,
    pub record: PerformanceRecord,
    /// One entry per feed, sorted by pair.
    pub stats: Vec<PairStats>,
    pub interrupted: bool,
}

/// Forwards events from a worker thread to the session's delivery loop.
/// Send failures mean the session is tearing down; they are dropped, not
/// propagated, so delivery can never stall a decision cycle.
struct ChannelSink {
    tx: Sender<NotificationEvent>,
}

impl NotificationSink for ChannelSink {
    fn notify(&mut self, event: NotificationEvent) {
        let _ = self.tx.send(event);
    }
}

/// Drive one worker per feed until the feeds are exhausted or `cancel` is
/// raised, delivering notifications into `sink` along the way.
///
/// Resume requires the saved config hash to match the current config, the
/// same contract as a resumed backtest.
pub fn run_paper_session(
    config: &AppConfig,
    feeds: Vec<PairFeed>,
    resume: Option<&SessionState>,
    sink: &mut dyn NotificationSink,
    cancel: Option<&AtomicBool>,
) -> Result<SessionSummary, RunError> {
    config.validate()?;
    let timeframe = config.timeframe()?;
    if feeds.is_empty() {
        return Err(ConfigError::Invalid("paper session needs at least one data feed".into()).into());
    }
    let mut sorted_pairs: Vec<&str> = feeds.iter().map(|f| f.pair.as_str()).collect();
    sorted_pairs.sort_unstable();
    if let Some(duplicate) = sorted_pairs.windows(2).find(|w| w[0] == w[1]) {
        return Err(ConfigError::Invalid(format!(
            "duplicate feed for pair '{}'",
            duplicate[0]
        ))
        .into());
    }

    for feed in &feeds {
        if feed.candles.is_empty() {
            return Err(
                ConfigError::Invalid(format!("feed for '{}' has no candles", feed.pair)).into(),
            );
        }
        for defect in validate_series(&feed.candles, timeframe) {
            match defect {
                SeriesDefect::OutOfOrder { index } => {
                    return Err(EngineError::Configuration(format!(
                        "{}: candle {index} is out of order",
                        feed.pair
                    ))
                    .into());
                }
                SeriesDefect::Insane { index } => {
                    return Err(EngineError::Configuration(format!(
                        "{}: candle {index} fails the OHLCV sanity check",
                        feed.pair
                    ))
                    .into());
                }
                SeriesDefect::Gap { .. } => {}
            }
        }
    }

    let config_hex = config.fingerprint()?;
    let config_hash = config_hex[..16].to_string();
    let session_id = {
        let mut sorted: Vec<&PairFeed> = feeds.iter().collect();
        sorted.sort_by(|a, b| a.pair.cmp(&b.pair));
        sorted.iter().fold(config_hex.clone(), |id, feed| {
            run_id(&id, &dataset_fingerprint(&feed.pair, &feed.candles))
        })
    };

    let (account, mut record) = match resume {
        Some(saved) => {
            if saved.config_hash != config_hash {
                return Err(RunError::StateMismatch {
                    saved: saved.config_hash.clone(),
                    current: config_hash,
                });
            }
            (saved.account.clone(), saved.record.clone())
        }
        None => (
            AccountState::new(config.engine.initial_equity),
            PerformanceRecord::new(),
        ),
    };

    // Build the per-pair machinery up front so configuration errors surface
    // before any thread exists.
    let pipeline_config = config.pipeline();
    let mut workers = Vec::with_capacity(feeds.len());
    for feed in feeds {
        let pipeline = DecisionPipeline::new(feed.pair.clone(), &pipeline_config)?;
        let executor = SimulatedExecutor::new(config.simulation().execution)?;
        workers.push((feed, pipeline, executor));
    }

    let (handle, owner_join) = spawn_account_owner(account, pipeline_config.limits());
    let (event_tx, event_rx) = mpsc::channel::<NotificationEvent>();
    let (trade_tx, trade_rx) = mpsc::channel::<ClosedTrade>();

    let mut outcomes: Vec<(String, Result<PairStats, EngineError>)> = Vec::new();
    thread::scope(|scope| {
        let mut joins = Vec::with_capacity(workers.len());
        for (feed, pipeline, executor) in workers.drain(..) {
            let pair = feed.pair.clone();
            let handle = handle.clone();
            let events = ChannelSink {
                tx: event_tx.clone(),
            };
            let trades = trade_tx.clone();
            let join = thread::Builder::new()
                .name(format!("tradewind-{pair}"))
                .spawn_scoped(scope, move || {
                    drive_pair(feed, timeframe, pipeline, executor, handle, events, trades, cancel)
                })
                .expect("failed to spawn pair worker thread");
            joins.push((pair, join));
        }
        drop(event_tx);
        drop(trade_tx);

        // Deliver while workers run. The loop ends when the last worker
        // drops its sender.
        for event in event_rx.iter() {
            sink.notify(event);
        }

        for (pair, join) in joins {
            let outcome = join.join().unwrap_or_else(|_| {
                Err(EngineError::ExecutionFailure(format!(
                    "worker for {pair} panicked"
                )))
            });
            outcomes.push((pair, outcome));
        }
    });

    let mut trades: Vec<ClosedTrade> = trade_rx.iter().collect();
    trades.sort_by(|a, b| a.exit_time.cmp(&b.exit_time).then_with(|| a.pair.cmp(&b.pair)));
    for trade in trades {
        record.append(trade);
    }

    let final_account = handle.state();
    handle.shutdown();
    let _ = owner_join.join();
    let account = final_account?;

    outcomes.sort_by(|a, b| a.0.cmp(&b.0));
    let mut stats = Vec::with_capacity(outcomes.len());
    for (_, outcome) in outcomes {
        stats.push(outcome?);
    }

    Ok(SessionSummary {
        session_id,
        account,
        record,
        stats,
        interrupted: cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)),
    })
}

/// One pair's session loop: the backtest cycle, with every ledger mutation
/// routed through the account owner.
#[allow(clippy::too_many_arguments)]
fn drive_pair(
    feed: PairFeed,
    timeframe: Timeframe,
    mut pipeline: DecisionPipeline,
    mut executor: SimulatedExecutor,
    handle: AccountHandle,
    mut events: ChannelSink,
    trades: Sender<ClosedTrade>,
    cancel: Option<&AtomicBool>,
) -> Result<PairStats, EngineError> {
    let pair = feed.pair.as_str();
    let mut stats = PairStats::new(pair);
    let mut pending: Option<RiskDecision> = None;
    let step = timeframe.duration();
    let mut last_seen: Option<DateTime<Utc>> = None;

    for candle in &feed.candles {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            break;
        }

        if let Some(last) = last_seen {
            if candle.timestamp - last > step {
                pipeline.reset();
                executor.cancel_pending();
                pending = None;
                stats.gaps += 1;
            }
        }

        executor.on_candle_open(candle);
        for event in executor.drain_events() {
            apply_fill(
                pair, event, &mut pending, &handle, &mut events, &mut stats,
            )?;
        }

        manage_position(
            pair, candle, &pipeline, &executor, &handle, &mut events, &trades, &mut stats,
        )?;

        run_cycle(
            pair, candle, &mut pipeline, &mut executor, &handle, &mut pending, &mut events,
            &trades, &mut stats,
        )?;

        last_seen = Some(candle.timestamp);
        stats.candles += 1;
    }

    // Drop the resting order; open positions stay for the next session.
    executor.cancel_pending();
    Ok(stats)
}

fn apply_fill(
    pair: &str,
    event: ExecutionEvent,
    pending: &mut Option<RiskDecision>,
    handle: &AccountHandle,
    events: &mut ChannelSink,
    stats: &mut PairStats,
) -> Result<(), EngineError> {
    match event {
        ExecutionEvent::Filled {
            price, size, fee, at, side, ..
        } => {
            let decision = pending.take().ok_or_else(|| {
                EngineError::ExecutionFailure(format!("fill for {pair} without a pending decision"))
            })?;
            match handle.open(decision, price, fee, at) {
                Ok(()) => {
                    stats.fills += 1;
                    events.notify(NotificationEvent::PositionOpened {
                        pair: pair.to_string(),
                        side,
                        size,
                        entry_price: price,
                        at,
                    });
                }
                // gapped through its stop, or the ceilings moved under it
                Err(err) if err.is_recoverable() => {
                    stats.risk_rejections += 1;
                    events.notify(NotificationEvent::RiskLimitBreached {
                        pair: pair.to_string(),
                        reason: err.to_string(),
                        at,
                    });
                }
                Err(err) => return Err(err),
            }
        }
        ExecutionEvent::Rejected { .. } => {
            *pending = None;
            stats.risk_rejections += 1;
        }
    }
    Ok(())
}

/// Stop first, then take-profit levels in ladder order, then the trailing
/// ratchet at the close. State is re-fetched between fills because the
/// owner applies each one.
#[allow(clippy::too_many_arguments)]
fn manage_position(
    pair: &str,
    candle: &Candle,
    pipeline: &DecisionPipeline,
    executor: &SimulatedExecutor,
    handle: &AccountHandle,
    events: &mut ChannelSink,
    trades: &Sender<ClosedTrade>,
    stats: &mut PairStats,
) -> Result<(), EngineError> {
    let state = handle.state()?;
    let Some(position) = state.open_positions.get(pair) else {
        return Ok(());
    };
    let side = position.side;

    let stop = position.stop_loss;
    let stop_hit = match side {
        PositionSide::Long => candle.low <= stop,
        PositionSide::Short => candle.high >= stop,
    };
    if stop_hit {
        let price = executor.exit_price(side, stop);
        let fee = executor.fee_for(price, position.remaining);
        let trade = handle.close(pair, price, fee, candle.timestamp, ExitReason::StopLoss)?;
        record_exit(trade, events, trades, stats);
        return Ok(());
    }

    loop {
        let state = handle.state()?;
        let Some(position) = state.open_positions.get(pair) else {
            return Ok(());
        };
        let next = position
            .take_profit_levels
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
                (
                    index,
                    level.price,
                    (position.size * level.fraction).min(position.remaining),
                )
            });
        let Some((index, trigger, quantity)) = next else {
            break;
        };
        let price = executor.exit_price(side, trigger);
        let fee = executor.fee_for(price, quantity);
        let trade = handle.take_profit(pair, index, price, fee, candle.timestamp)?;
        record_exit(trade, events, trades, stats);
    }

    if let Some(candidate) = pipeline.trailing_candidate(side, candle.close) {
        handle.ratchet(pair, candidate)?;
    }
    Ok(())
}

/// The decision cycle at the close. The pipeline admits against a state
/// snapshot; the submit re-admits through the owner because another pair
/// may have taken the headroom since the snapshot.
#[allow(clippy::too_many_arguments)]
fn run_cycle(
    pair: &str,
    candle: &Candle,
    pipeline: &mut DecisionPipeline,
    executor: &mut SimulatedExecutor,
    handle: &AccountHandle,
    pending: &mut Option<RiskDecision>,
    events: &mut ChannelSink,
    trades: &Sender<ClosedTrade>,
    stats: &mut PairStats,
) -> Result<(), EngineError> {
    let state = handle.state()?;
    let outcome = match pipeline.observe(candle, &state) {
        Ok(outcome) => outcome,
        Err(EngineError::InsufficientHistory { .. }) => {
            stats.warmup_candles += 1;
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    if outcome.signal.direction.is_hold() {
        return Ok(());
    }
    stats.signals += 1;
    events.notify(NotificationEvent::SignalGenerated {
        signal: outcome.signal.clone(),
    });

    if let Some(position) = state.open_positions.get(pair) {
        let opposes = match position.side {
            PositionSide::Long => outcome.signal.direction == Direction::Sell,
            PositionSide::Short => outcome.signal.direction == Direction::Buy,
        };
        if opposes {
            let price = executor.exit_price(position.side, candle.close);
            let fee = executor.fee_for(price, position.remaining);
            let trade = handle.close(
                pair,
                price,
                fee,
                candle.timestamp,
                ExitReason::SignalReversal,
            )?;
            record_exit(trade, events, trades, stats);
        }
        // aligned signal with a position already on: nothing to add
        return Ok(());
    }

    if pending.is_some() {
        // one resting order at a time
        return Ok(());
    }
    if let Some(rejection) = outcome.rejection {
        stats.risk_rejections += 1;
        events.notify(NotificationEvent::RiskLimitBreached {
            pair: pair.to_string(),
            reason: rejection.to_string(),
            at: candle.timestamp,
        });
        return Ok(());
    }
    if let Some(decision) = outcome.decision {
        match handle.admit(decision.clone()) {
            Ok(()) => {
                executor.submit(OrderRequest::from_decision(&decision))?;
                *pending = Some(decision);
                stats.orders_submitted += 1;
            }
            Err(err) if err.is_recoverable() => {
                stats.risk_rejections += 1;
                events.notify(NotificationEvent::RiskLimitBreached {
                    pair: pair.to_string(),
                    reason: err.to_string(),
                    at: candle.timestamp,
                });
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn record_exit(
    trade: ClosedTrade,
    events: &mut ChannelSink,
    trades: &Sender<ClosedTrade>,
    stats: &mut PairStats,
) {
    events.notify(NotificationEvent::PositionClosed {
        trade: trade.clone(),
    });
    let _ = trades.send(trade);
    stats.trades_closed += 1;
}
