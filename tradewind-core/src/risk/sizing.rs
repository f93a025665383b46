//! Position sizing methods.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// How a signal turns into a position size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingPolicy {
    /// Risk a fixed fraction of equity per trade, sized by stop distance:
    /// size = (equity * max_risk_per_trade) / stop_distance.
    RiskBased,
    /// Spend a fixed fraction of equity as notional.
    PercentBased { fraction: f64 },
    /// Spend a constant notional regardless of equity.
    FixedNotional { notional: f64 },
}

impl Default for SizingPolicy {
    fn default() -> Self {
        SizingPolicy::RiskBased
    }
}

impl SizingPolicy {
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            SizingPolicy::RiskBased => Ok(()),
            SizingPolicy::PercentBased { fraction } => {
                if !fraction.is_finite() || *fraction <= 0.0 || *fraction > 1.0 {
                    return Err(EngineError::Configuration(format!(
                        "percent_based fraction must be within (0, 1], got {fraction}"
                    )));
                }
                Ok(())
            }
            SizingPolicy::FixedNotional { notional } => {
                if !notional.is_finite() || *notional <= 0.0 {
                    return Err(EngineError::Configuration(format!(
                        "fixed notional must be positive, got {notional}"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Units to buy or sell before any portfolio-level cap.
///
/// `stop_distance` is the per-unit loss if the stop fires and must be
/// positive for risk-based sizing.
pub fn position_size(
    policy: &SizingPolicy,
    equity: f64,
    max_risk_per_trade: f64,
    price: f64,
    stop_distance: f64,
) -> Result<f64, EngineError> {
    if price <= 0.0 {
        return Err(EngineError::InvalidRiskDecision(format!(
            "cannot size against non-positive price {price}"
        )));
    }
    let size = match policy {
        SizingPolicy::RiskBased => {
            if stop_distance <= 0.0 {
                return Err(EngineError::InvalidRiskDecision(format!(
                    "risk-based sizing needs a positive stop distance, got {stop_distance}"
                )));
            }
            equity * max_risk_per_trade / stop_distance
        }
        SizingPolicy::PercentBased { fraction } => equity * fraction / price,
        SizingPolicy::FixedNotional { notional } => notional / price,
    };
    if !size.is_finite() || size <= 0.0 {
        return Err(EngineError::InvalidRiskDecision(format!(
            "computed size {size} is not positive"
        )));
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_based_worked_example() {
        // equity 10_000, 2% risk, stop 2% below entry 100 -> 100 units
        let size = position_size(&SizingPolicy::RiskBased, 10_000.0, 0.02, 100.0, 2.0).unwrap();
        assert!((size - 100.0).abs() < 1e-10);
    }

    #[test]
    fn percent_based_spends_equity_fraction() {
        let policy = SizingPolicy::PercentBased { fraction: 0.1 };
        let size = position_size(&policy, 10_000.0, 0.02, 50.0, 1.0).unwrap();
        // 1_000 notional at price 50
        assert!((size - 20.0).abs() < 1e-10);
    }

    #[test]
    fn fixed_notional_ignores_equity() {
        let policy = SizingPolicy::FixedNotional { notional: 500.0 };
        let small = position_size(&policy, 1_000.0, 0.02, 25.0, 1.0).unwrap();
        let large = position_size(&policy, 1_000_000.0, 0.02, 25.0, 1.0).unwrap();
        assert_eq!(small, large);
        assert!((small - 20.0).abs() < 1e-10);
    }

    #[test]
    fn risk_based_rejects_zero_stop_distance() {
        let err = position_size(&SizingPolicy::RiskBased, 10_000.0, 0.02, 100.0, 0.0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRiskDecision(_)));
    }

    #[test]
    fn zero_equity_is_rejected() {
        let err = position_size(&SizingPolicy::RiskBased, 0.0, 0.02, 100.0, 2.0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRiskDecision(_)));
    }

    #[test]
    fn policy_validation() {
        assert!(SizingPolicy::RiskBased.validate().is_ok());
        assert!(SizingPolicy::PercentBased { fraction: 1.5 }.validate().is_err());
        assert!(SizingPolicy::PercentBased { fraction: 0.0 }.validate().is_err());
        assert!(SizingPolicy::FixedNotional { notional: -5.0 }.validate().is_err());
    }
}
