//! Markdown report generators.

use std::cmp::Ordering;

use crate::runner::RunResult;
use crate::session::SessionSummary;
use crate::sweep::SweepReport;

/// Render one run as a markdown report.
pub fn run_summary(result: &RunResult) -> String {
    let metrics = &result.metrics;
    let mut report = format!(
        "# Tradewind Run Report\n\n\
Run ID: `{}`\n\
Pair: {} ({})\n\
Config: `{}`  Dataset: `{}`\n\n\
## Summary\n\
- Initial Equity: ${:.2}\n\
- Final Equity: ${:.2}\n\
- Total Return: {:+.2}%\n\
- Max Drawdown: {:+.2}%\n\
- Sharpe: {:.2}\n\
- Sortino: {:.2}\n\
- Calmar: {:.2}\n\
- Win Rate: {:.1}%\n\
- Profit Factor: {:.2}\n\
- Expectancy: {:+.2}R\n\
- Trades: {}\n",
        result.run_id,
        result.pair,
        result.timeframe,
        result.config_hash,
        result.dataset_hash,
        result.initial_equity,
        result.final_equity,
        metrics.total_return * 100.0,
        metrics.max_drawdown * 100.0,
        metrics.sharpe,
        metrics.sortino,
        metrics.calmar,
        metrics.win_rate * 100.0,
        metrics.profit_factor,
        metrics.expectancy,
        metrics.trade_count,
    );
    if metrics.insufficient_data {
        report.push_str("- Note: fewer than two trades, ratio metrics reported as zero\n");
    }

    report.push_str(&format!(
        "\n## Replay\n\
- Candles: {} ({} warmup, {} gaps)\n\
- Signals: {}\n\
- Orders: {} submitted, {} filled\n\
- Risk Rejections: {}\n",
        result.candles,
        result.warmup_candles,
        result.gaps,
        result.signals,
        result.orders_submitted,
        result.fills,
        result.risk_rejections,
    ));
    if result.interrupted {
        report.push_str("- Interrupted before end of data\n");
    }

    if !result.trades.is_empty() {
        let mut sorted: Vec<_> = result.trades.iter().collect();
        sorted.sort_by(|a, b| b.net_pnl.partial_cmp(&a.net_pnl).unwrap_or(Ordering::Equal));

        report.push_str("\n## Trade Tape\n\n### Top Winners\n");
        report.push_str("| Pair | Side | Strategy | Exit | Net PnL | Return |\n");
        report.push_str("|------|------|----------|------|---------|--------|\n");
        for trade in sorted.iter().take(5).filter(|t| t.net_pnl > 0.0) {
            report.push_str(&format!(
                "| {} | {:?} | {:?} | {:?} | {:+.2} | {:+.2}% |\n",
                trade.pair,
                trade.side,
                trade.strategy,
                trade.exit_reason,
                trade.net_pnl,
                trade.return_pct() * 100.0,
            ));
        }

        report.push_str("\n### Top Losers\n");
        report.push_str("| Pair | Side | Strategy | Exit | Net PnL | Return |\n");
        report.push_str("|------|------|----------|------|---------|--------|\n");
        for trade in sorted.iter().rev().take(5).filter(|t| t.net_pnl <= 0.0) {
            report.push_str(&format!(
                "| {} | {:?} | {:?} | {:?} | {:+.2} | {:+.2}% |\n",
                trade.pair,
                trade.side,
                trade.strategy,
                trade.exit_reason,
                trade.net_pnl,
                trade.return_pct() * 100.0,
            ));
        }
    }

    report
}

/// Render a ranked sweep as a markdown table, best candidates first.
pub fn sweep_table(report: &SweepReport, top: usize) -> String {
    let mut out = format!(
        "# Tradewind Sweep Report\n\n\
Objective: {:?}\n\
Evaluated: {}  Skipped: {}\n",
        report.objective, report.evaluated, report.skipped
    );
    if report.interrupted {
        out.push_str("Interrupted before the full grid was evaluated\n");
    }

    out.push_str("\n| Rank | Run ID | Threshold | Risk | ATR Stop | Objective | Final Equity | Trades |\n");
    out.push_str("|------|--------|-----------|------|----------|-----------|--------------|--------|\n");
    for (rank, entry) in report.top(top).iter().enumerate() {
        let stop = entry
            .stop_multiplier
            .map(|m| format!("{m:.1}"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "| {} | `{}` | {:.3} | {:.3} | {} | {:+.4} | {:.2} | {} |\n",
            rank + 1,
            entry.run_id,
            entry.entry_threshold,
            entry.risk_fraction,
            stop,
            entry.objective_value,
            entry.final_equity,
            entry.metrics.trade_count,
        ));
    }
    out
}

/// Render a finished paper session as a markdown report.
pub fn session_summary(summary: &SessionSummary) -> String {
    let mut out = format!(
        "# Tradewind Paper Session\n\n\
Session ID: `{}`\n\n\
## Account\n\
- Equity: ${:.2}\n\
- Allocated Risk: ${:.2}\n\
- Open Positions: {}\n\
- Closed Trades: {}\n",
        summary.session_id,
        summary.account.total_equity,
        summary.account.allocated_risk,
        summary.account.open_positions.len(),
        summary.record.len(),
    );
    if summary.interrupted {
        out.push_str("- Interrupted before the feeds were exhausted\n");
    }

    out.push_str("\n## Pairs\n\n");
    out.push_str("| Pair | Candles | Warmup | Gaps | Signals | Orders | Fills | Rejections | Trades |\n");
    out.push_str("|------|---------|--------|------|---------|--------|-------|------------|--------|\n");
    for stats in &summary.stats {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
            stats.pair,
            stats.candles,
            stats.warmup_candles,
            stats.gaps,
            stats.signals,
            stats.orders_submitted,
            stats.fills,
            stats.risk_rejections,
            stats.trades_closed,
        ));
    }

    if !summary.account.open_positions.is_empty() {
        out.push_str("\n## Open Positions\n\n");
        out.push_str("| Pair | Side | Entry | Remaining | Stop |\n");
        out.push_str("|------|------|-------|-----------|------|\n");
        for (pair, position) in &summary.account.open_positions {
            out.push_str(&format!(
                "| {} | {:?} | {:.2} | {:.6} | {:.2} |\n",
                pair, position.side, position.entry_price, position.remaining, position.stop_loss,
            ));
        }
    }

    out
}
