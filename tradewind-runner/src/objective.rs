//! Ranking objectives for parameter sweeps.

use serde::{Deserialize, Serialize};
use tradewind_core::performance::MetricsSummary;

/// Metric a sweep optimizes for.
///
/// Every variant maps onto one field of [`MetricsSummary`]. Drawdown is
/// stored as a negative fraction, so greater means better across every
/// objective and sweeps always rank descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    Sharpe,
    Sortino,
    Calmar,
    TotalReturn,
    WinRate,
    ProfitFactor,
    Expectancy,
    MaxDrawdown,
}

impl Objective {
    /// Pull this objective's value out of a metrics summary.
    pub fn extract(&self, metrics: &MetricsSummary) -> f64 {
        match self {
            Objective::Sharpe => metrics.sharpe,
            Objective::Sortino => metrics.sortino,
            Objective::Calmar => metrics.calmar,
            Objective::TotalReturn => metrics.total_return,
            Objective::WinRate => metrics.win_rate,
            Objective::ProfitFactor => metrics.profit_factor,
            Objective::Expectancy => metrics.expectancy,
            Objective::MaxDrawdown => metrics.max_drawdown,
        }
    }

    /// True when `a` beats `b` under this objective.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a > b
    }
}
