//! Parameter sweeps over the strategy and risk grid.
//!
//! A sweep expands a small grid (entry thresholds, risk fractions, stop
//! multipliers), evaluates every candidate over the same series in parallel,
//! and ranks the results by the configured objective. Candidates never share
//! state, so the ranking is deterministic for a given config and dataset.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tradewind_core::domain::Candle;
use tradewind_core::performance::MetricsSummary;
use tradewind_core::risk::StopLossPolicy;

use crate::config::{AppConfig, ConfigError};
use crate::objective::Objective;
use crate::runner::{run_backtest, RunError};

/// Grid of candidate parameters. An empty axis keeps the base config's
/// value for that parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub objective: Objective,
    /// Candidate `strategy.model_based.entry_threshold` values.
    pub entry_thresholds: Vec<f64>,
    /// Candidate `risk.max_risk_per_trade` values.
    pub risk_fractions: Vec<f64>,
    /// Candidate ATR stop multipliers; a candidate swaps the stop policy to
    /// `AtrMultiple`.
    pub stop_multipliers: Vec<f64>,
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for &value in &self.entry_thresholds {
            if !value.is_finite() || value <= 0.0 || value >= 1.0 {
                return Err(ConfigError::Invalid(format!(
                    "sweep entry_threshold {value} must lie in (0, 1)"
                )));
            }
        }
        for &value in &self.risk_fractions {
            if !value.is_finite() || value <= 0.0 || value >= 1.0 {
                return Err(ConfigError::Invalid(format!(
                    "sweep risk_fraction {value} must lie in (0, 1)"
                )));
            }
        }
        for &value in &self.stop_multipliers {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "sweep stop_multiplier {value} must be positive"
                )));
            }
        }
        Ok(())
    }

    /// Grid cells before infeasible combinations are dropped.
    pub fn grid_size(&self) -> usize {
        let axis = |len: usize| len.max(1);
        axis(self.entry_thresholds.len())
            * axis(self.risk_fractions.len())
            * axis(self.stop_multipliers.len())
    }
}

/// One ranked candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepEntry {
    pub run_id: String,
    pub entry_threshold: f64,
    pub risk_fraction: f64,
    /// Present when this candidate swapped in an ATR stop.
    pub stop_multiplier: Option<f64>,
    pub objective_value: f64,
    pub final_equity: f64,
    pub metrics: MetricsSummary,
}

/// Ranked sweep outcome, best candidate first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub objective: Objective,
    pub evaluated: usize,
    /// Candidates not ranked because the sweep was cancelled under them.
    pub skipped: usize,
    pub interrupted: bool,
    pub results: Vec<SweepEntry>,
}

impl SweepReport {
    pub fn best(&self) -> Option<&SweepEntry> {
        self.results.first()
    }

    pub fn top(&self, n: usize) -> &[SweepEntry] {
        &self.results[..n.min(self.results.len())]
    }
}

/// Expand the base config into one candidate per feasible grid cell.
///
/// A candidate is a plain single-run config: its own sweep section is
/// cleared, so the candidate's fingerprint does not depend on the grid that
/// produced it and the best run can be reproduced standalone. Risk fractions
/// above the portfolio ceiling would never validate and are dropped here.
pub fn expand_grid(base: &AppConfig) -> Vec<AppConfig> {
    let sweep = &base.sweep;
    let thresholds = if sweep.entry_thresholds.is_empty() {
        vec![base.strategy.model_based.entry_threshold]
    } else {
        sweep.entry_thresholds.clone()
    };
    let fractions = if sweep.risk_fractions.is_empty() {
        vec![base.risk.max_risk_per_trade]
    } else {
        sweep.risk_fractions.clone()
    };
    let multipliers: Vec<Option<f64>> = if sweep.stop_multipliers.is_empty() {
        vec![None]
    } else {
        sweep.stop_multipliers.iter().copied().map(Some).collect()
    };

    let mut configs = Vec::new();
    for &threshold in &thresholds {
        for &fraction in &fractions {
            if fraction > base.risk.limits.max_total_risk {
                continue;
            }
            for &multiplier in &multipliers {
                let mut candidate = base.clone();
                candidate.sweep = SweepConfig::default();
                candidate.strategy.model_based.entry_threshold = threshold;
                candidate.risk.max_risk_per_trade = fraction;
                if let Some(multiplier) = multiplier {
                    candidate.risk.stop_loss = StopLossPolicy::AtrMultiple { multiplier };
                }
                configs.push(candidate);
            }
        }
    }
    configs
}

/// Evaluate every feasible candidate over `candles` and rank the outcomes.
///
/// Cancellation is cooperative at two levels: unstarted candidates are
/// skipped, and a candidate already running finishes as interrupted and is
/// not ranked. Ties on the objective fall back to run id so the ordering is
/// total.
pub fn run_sweep(
    base: &AppConfig,
    candles: &[Candle],
    cancel: Option<&AtomicBool>,
) -> Result<SweepReport, RunError> {
    base.validate()?;
    let objective = base.sweep.objective;
    let grid = expand_grid(base);
    if grid.is_empty() {
        return Err(ConfigError::Invalid(
            "sweep grid is empty: every risk fraction exceeds risk.limits.max_total_risk"
                .to_string(),
        )
        .into());
    }

    let outcomes = grid
        .par_iter()
        .map(|candidate| -> Result<Option<SweepEntry>, RunError> {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Ok(None);
            }
            let result = run_backtest(candidate, candles, cancel)?;
            if result.interrupted {
                return Ok(None);
            }
            let stop_multiplier = match candidate.risk.stop_loss {
                StopLossPolicy::AtrMultiple { multiplier } => Some(multiplier),
                _ => None,
            };
            Ok(Some(SweepEntry {
                run_id: result.run_id,
                entry_threshold: candidate.strategy.model_based.entry_threshold,
                risk_fraction: candidate.risk.max_risk_per_trade,
                stop_multiplier,
                objective_value: objective.extract(&result.metrics),
                final_equity: result.final_equity,
                metrics: result.metrics,
            }))
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    let skipped = outcomes.iter().filter(|entry| entry.is_none()).count();
    let mut results: Vec<SweepEntry> = outcomes.into_iter().flatten().collect();
    results.sort_by(|a, b| {
        b.objective_value
            .partial_cmp(&a.objective_value)
            .unwrap_or(CmpOrdering::Equal)
            .then_with(|| a.run_id.cmp(&b.run_id))
    });

    Ok(SweepReport {
        objective,
        evaluated: results.len(),
        skipped,
        interrupted: cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)),
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_with_grid() -> AppConfig {
        let mut config = AppConfig::default();
        config.sweep.entry_thresholds = vec![0.1, 0.2];
        config.sweep.risk_fractions = vec![0.01, 0.02];
        config
    }

    #[test]
    fn empty_axes_keep_the_base_values() {
        let base = AppConfig::default();
        let grid = expand_grid(&base);
        assert_eq!(grid.len(), 1);
        assert_eq!(
            grid[0].strategy.model_based.entry_threshold,
            base.strategy.model_based.entry_threshold
        );
        assert_eq!(grid[0].risk.max_risk_per_trade, base.risk.max_risk_per_trade);
    }

    #[test]
    fn grid_is_the_cartesian_product() {
        let mut base = base_with_grid();
        base.sweep.stop_multipliers = vec![1.5, 2.0, 3.0];
        assert_eq!(base.sweep.grid_size(), 12);
        assert_eq!(expand_grid(&base).len(), 12);
    }

    #[test]
    fn infeasible_risk_fractions_are_dropped() {
        let mut base = base_with_grid();
        // Above the default portfolio ceiling; would never validate.
        base.sweep
            .risk_fractions
            .push(base.risk.limits.max_total_risk + 0.01);
        let grid = expand_grid(&base);
        assert_eq!(grid.len(), 4);
        assert!(grid
            .iter()
            .all(|c| c.risk.max_risk_per_trade <= c.risk.limits.max_total_risk));
    }

    #[test]
    fn candidates_validate_and_fingerprint_standalone() {
        let base = base_with_grid();
        for candidate in expand_grid(&base) {
            candidate.validate().unwrap();

            // Rebuilding the same single-run config by hand gives the same
            // fingerprint: the grid leaves no trace in the candidate.
            let mut standalone = AppConfig::default();
            standalone.strategy.model_based.entry_threshold =
                candidate.strategy.model_based.entry_threshold;
            standalone.risk.max_risk_per_trade = candidate.risk.max_risk_per_trade;
            assert_eq!(
                standalone.fingerprint().unwrap(),
                candidate.fingerprint().unwrap()
            );
        }
    }

    #[test]
    fn stop_axis_swaps_the_policy() {
        let mut base = AppConfig::default();
        base.sweep.stop_multipliers = vec![2.5];
        let grid = expand_grid(&base);
        assert_eq!(grid.len(), 1);
        assert!(matches!(
            grid[0].risk.stop_loss,
            StopLossPolicy::AtrMultiple { multiplier } if multiplier == 2.5
        ));
    }

    #[test]
    fn bad_grid_values_fail_validation() {
        let mut config = SweepConfig::default();
        config.entry_thresholds = vec![0.0];
        assert!(config.validate().is_err());

        let mut config = SweepConfig::default();
        config.risk_fractions = vec![1.0];
        assert!(config.validate().is_err());

        let mut config = SweepConfig::default();
        config.stop_multipliers = vec![f64::NAN];
        assert!(config.validate().is_err());
    }
}
