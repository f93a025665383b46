//! Criterion benchmarks for decision-engine hot paths.
//!
//! Benchmarks:
//! 1. Indicator engine (full snapshot stack, per-candle streaming update)
//! 2. Decision pipeline (classify + strategy + risk per candle)
//! 3. Backtest replay (whole loop including simulated fills)
//! 4. Simulated executor (submit, next-open fill, drain)
//! 5. Performance metrics over a finished run

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tradewind_core::backtest::{Backtest, BacktestConfig};
use tradewind_core::domain::account::AccountState;
use tradewind_core::domain::candle::{Candle, Timeframe};
use tradewind_core::engine::{DecisionPipeline, PipelineConfig};
use tradewind_core::indicators::IndicatorEngine;
use tradewind_core::performance::MetricsSummary;
use tradewind_core::ports::{ExecutionPort, OrderRequest};
use tradewind_core::strategy::{ModelBased, StrategyKind};
use tradewind_core::synthetic::{random_walk, WalkConfig};

fn make_candles(count: usize) -> Vec<Candle> {
    random_walk(
        "bench-fixture",
        Timeframe::H1,
        Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
        count,
        &WalkConfig::default(),
    )
}

fn trading_pipeline() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.strategy.pinned = Some(StrategyKind::ModelBased);
    config.strategy.model_based = ModelBased {
        entry_threshold: 0.1,
        ..ModelBased::default()
    };
    config
}

fn bench_indicator_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_engine");

    for &candle_count in &[500, 2_000, 8_760] {
        let candles = make_candles(candle_count);
        group.bench_with_input(
            BenchmarkId::new("full_stack", candle_count),
            &candle_count,
            |b, _| {
                b.iter(|| {
                    let mut engine = IndicatorEngine::new(&Default::default()).unwrap();
                    let mut snapshots = 0usize;
                    for candle in &candles {
                        if engine.apply(black_box(candle)).is_ok() {
                            snapshots += 1;
                        }
                    }
                    black_box(snapshots)
                });
            },
        );
    }

    group.finish();
}

fn bench_decision_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("decision_pipeline");

    let config = trading_pipeline();
    let candles = make_candles(2_000);
    let account = AccountState::new(10_000.0);

    group.bench_function("observe_2000_candles", |b| {
        b.iter(|| {
            let mut pipeline = DecisionPipeline::new("BTC/USDT", &config).unwrap();
            let mut signals = 0usize;
            for candle in &candles {
                if let Ok(outcome) = pipeline.observe(black_box(candle), &account) {
                    if !outcome.signal.direction.is_hold() {
                        signals += 1;
                    }
                }
            }
            black_box(signals)
        });
    });

    group.finish();
}

fn bench_backtest_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest_replay");
    group.sample_size(20);

    let config = trading_pipeline();
    for &candle_count in &[500, 2_000, 8_760] {
        let candles = make_candles(candle_count);
        group.bench_with_input(
            BenchmarkId::new("model_based", candle_count),
            &candle_count,
            |b, _| {
                b.iter(|| {
                    let backtest = Backtest::new(
                        "BTC/USDT",
                        Timeframe::H1,
                        &config,
                        BacktestConfig::default(),
                    )
                    .unwrap();
                    backtest.run(black_box(&candles), None).unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_executor(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulated_executor");

    let candles = make_candles(60);
    let at = candles[0].timestamp;
    let order = OrderRequest {
        pair: "BTC/USDT".to_string(),
        side: tradewind_core::domain::position::PositionSide::Long,
        size: 1.0,
        stop_loss: 95.0,
        take_profit_levels: Vec::new(),
        reference_price: 100.0,
        submitted_at: at,
    };

    group.bench_function("submit_fill_drain_50", |b| {
        b.iter(|| {
            let mut executor = tradewind_core::backtest::SimulatedExecutor::new(
                tradewind_core::backtest::ExecutionConfig::default(),
            )
            .unwrap();
            let mut fills = 0usize;
            for candle in candles.iter().take(50) {
                executor.submit(order.clone()).unwrap();
                executor.on_candle_open(candle);
                fills += executor.drain_events().len();
            }
            black_box(fills)
        });
    });

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("performance_metrics");

    let config = trading_pipeline();
    let candles = make_candles(4_000);
    let report = Backtest::new("BTC/USDT", Timeframe::H1, &config, BacktestConfig::default())
        .unwrap()
        .run(&candles, None)
        .unwrap();
    let equities: Vec<f64> = report.equity_curve.iter().map(|p| p.equity).collect();

    group.bench_function("summary_4000_points", |b| {
        b.iter(|| MetricsSummary::compute(black_box(&equities), black_box(&report.record)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_indicator_engine,
    bench_decision_pipeline,
    bench_backtest_replay,
    bench_executor,
    bench_metrics,
);
criterion_main!(benches);
