//! Performance statistics over a closed-trade record and an equity curve.
//!
//! Every metric is a pure reduction: curve and/or trades in, scalar out.
//! Nothing here holds state, so the numbers are recomputable at any point
//! of a run. Short records never divide by zero or produce NaN; they come
//! back zeroed with [`MetricsSummary::insufficient_data`] set instead.

use serde::{Deserialize, Serialize};

use crate::domain::trade::{ClosedTrade, PerformanceRecord};

/// Periods per year used for annualization.
const PERIODS_PER_YEAR: f64 = 252.0;

/// Aggregate statistics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub trade_count: usize,
    /// Fewer than two closed trades: ratio metrics are reported as zero
    /// and should not be compared across runs.
    pub insufficient_data: bool,
    pub total_return: f64,
    /// Largest peak-to-trough decline, as a negative fraction.
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
}

impl MetricsSummary {
    pub fn compute(equity_curve: &[f64], record: &PerformanceRecord) -> Self {
        let trades = record.trades();
        let periods = equity_curve.len();
        Self {
            trade_count: trades.len(),
            insufficient_data: trades.len() < 2,
            total_return: total_return(equity_curve),
            max_drawdown: max_drawdown(equity_curve),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            expectancy: expectancy(trades),
            sharpe: sharpe_ratio(equity_curve, 0.0),
            sortino: sortino_ratio(equity_curve, 0.0),
            calmar: calmar_ratio(equity_curve, periods),
        }
    }
}

/// (final - initial) / initial. Zero for curves shorter than two points.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let initial = equity_curve[0];
    if initial <= 0.0 {
        return 0.0;
    }
    (equity_curve[equity_curve.len() - 1] - initial) / initial
}

/// Compound annual growth rate at 252 periods per year.
pub fn cagr(equity_curve: &[f64], periods: usize) -> f64 {
    if equity_curve.len() < 2 || periods < 2 {
        return 0.0;
    }
    let initial = equity_curve[0];
    let last = equity_curve[equity_curve.len() - 1];
    if initial <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    let years = periods as f64 / PERIODS_PER_YEAR;
    (last / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe: mean excess period return over its sample standard
/// deviation, scaled by sqrt(252). Zero when variance vanishes or the
/// curve is too short.
pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let period_rf = risk_free_rate / PERIODS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - period_rf).collect();
    let std = sample_std(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean(&excess) / std) * PERIODS_PER_YEAR.sqrt()
}

/// Annualized Sortino: like Sharpe but deviation is computed from negative
/// excess returns only. Zero when there is no downside at all.
pub fn sortino_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let period_rf = risk_free_rate / PERIODS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - period_rf).collect();

    let downside_sq: Vec<f64> = excess.iter().filter(|r| **r < 0.0).map(|r| r * r).collect();
    if downside_sq.is_empty() {
        return 0.0;
    }
    let downside_std = (downside_sq.iter().sum::<f64>() / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean(&excess) / downside_std) * PERIODS_PER_YEAR.sqrt()
}

/// CAGR over the magnitude of max drawdown. Zero without a drawdown or
/// without growth.
pub fn calmar_ratio(equity_curve: &[f64], periods: usize) -> f64 {
    let growth = cagr(equity_curve, periods);
    let dd = max_drawdown(equity_curve);
    if dd >= 0.0 || growth <= 0.0 {
        return 0.0;
    }
    growth / dd.abs()
}

/// Deepest peak-to-trough decline as a negative fraction. A curve that
/// never declines scores 0.0.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut worst = 0.0_f64;
    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            let dd = (equity - peak) / peak;
            if dd < worst {
                worst = dd;
            }
        }
    }
    worst
}

/// Fraction of trades with positive net PnL.
pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Gross profit over gross loss, capped at 100 when losses are absent.
pub fn profit_factor(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.net_pnl > 0.0).map(|t| t.net_pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.net_pnl < 0.0)
        .map(|t| t.net_pnl.abs())
        .sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Per-trade edge: win_rate * (avg_win / avg_loss) - (1 - win_rate).
///
/// Positive means the reward-to-risk profile pays for the loss rate. With
/// no losing trades the ratio is undefined; the win rate alone is returned
/// as the (optimistic) edge.
pub fn expectancy(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let wins: Vec<f64> = trades.iter().filter(|t| t.net_pnl > 0.0).map(|t| t.net_pnl).collect();
    let losses: Vec<f64> = trades
        .iter()
        .filter(|t| t.net_pnl < 0.0)
        .map(|t| t.net_pnl.abs())
        .collect();

    let win_rate = wins.len() as f64 / trades.len() as f64;
    if losses.is_empty() {
        return win_rate;
    }
    if wins.is_empty() {
        return -1.0 * (losses.len() as f64 / trades.len() as f64);
    }
    let avg_win = mean(&wins);
    let avg_loss = mean(&losses);
    if avg_loss < 1e-10 {
        return win_rate;
    }
    win_rate * (avg_win / avg_loss) - (1.0 - win_rate)
}

/// Simple per-period returns of the curve, `(next - prev) / prev`.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    if equity_curve.len() < 2 {
        return Vec::new();
    }
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (N - 1 denominator).
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
