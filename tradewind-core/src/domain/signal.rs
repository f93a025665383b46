//! Signal — the directional output of one decision cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::strategy::StrategyKind;

/// Trade direction carried by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    pub fn is_hold(&self) -> bool {
        matches!(self, Direction::Hold)
    }
}

/// One strategy decision for one pair at one candle.
///
/// Produced once per cycle per pair and immutable afterwards. A `Hold`
/// direction never reaches the risk manager as a sizing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub pair: String,
    pub direction: Direction,
    /// Strategy conviction in [0, 1]. Clamped at construction.
    pub confidence: f64,
    pub strategy: StrategyKind,
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(
        pair: impl Into<String>,
        direction: Direction,
        confidence: f64,
        strategy: StrategyKind,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pair: pair.into(),
            direction,
            confidence: confidence.clamp(0.0, 1.0),
            strategy,
            generated_at,
        }
    }

    /// A no-action signal with zero conviction.
    pub fn hold(pair: impl Into<String>, strategy: StrategyKind, at: DateTime<Utc>) -> Self {
        Self::new(pair, Direction::Hold, 0.0, strategy, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn confidence_is_clamped() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let s = Signal::new("BTC/USDT", Direction::Buy, 1.7, StrategyKind::AdaptiveMomentum, at);
        assert_eq!(s.confidence, 1.0);
        let s = Signal::new("BTC/USDT", Direction::Sell, -0.3, StrategyKind::MeanReversion, at);
        assert_eq!(s.confidence, 0.0);
    }

    #[test]
    fn hold_has_zero_confidence() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let s = Signal::hold("ETH/USDT", StrategyKind::TrendFollowing, at);
        assert!(s.direction.is_hold());
        assert_eq!(s.confidence, 0.0);
    }
}
