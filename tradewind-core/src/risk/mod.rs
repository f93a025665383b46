//! Risk management: signal in, sized and protected decision out.
//!
//! The manager is stateless; every call sees the live [`AccountState`] and
//! either produces a complete [`RiskDecision`] or rejects the signal. A
//! decision is never partially applied: any non-positive or inconsistent
//! computed value rejects the whole thing.

pub mod sizing;
pub mod stops;
pub mod take_profit;

use serde::{Deserialize, Serialize};

use crate::domain::account::{AccountState, PortfolioLimits};
use crate::domain::decision::RiskDecision;
use crate::domain::position::PositionSide;
use crate::domain::signal::{Direction, Signal};
use crate::error::EngineError;
use crate::indicators::IndicatorSnapshot;

pub use sizing::{position_size, SizingPolicy};
pub use stops::StopLossPolicy;
pub use take_profit::TakeProfitPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskConfig {
    /// Fraction of equity risked by one trade.
    pub max_risk_per_trade: f64,
    /// Cap on a single position's notional as a fraction of equity.
    pub max_position_pct: f64,
    pub limits: PortfolioLimits,
    pub sizing: SizingPolicy,
    pub stop_loss: StopLossPolicy,
    pub take_profit: TakeProfitPolicy,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_risk_per_trade: 0.02,
            max_position_pct: 0.20,
            limits: PortfolioLimits::default(),
            sizing: SizingPolicy::default(),
            stop_loss: StopLossPolicy::default(),
            take_profit: TakeProfitPolicy::default(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.max_risk_per_trade.is_finite()
            || self.max_risk_per_trade <= 0.0
            || self.max_risk_per_trade >= 1.0
        {
            return Err(EngineError::Configuration(format!(
                "max_risk_per_trade must be within (0, 1), got {}",
                self.max_risk_per_trade
            )));
        }
        if !self.max_position_pct.is_finite()
            || self.max_position_pct <= 0.0
            || self.max_position_pct > 1.0
        {
            return Err(EngineError::Configuration(format!(
                "max_position_pct must be within (0, 1], got {}",
                self.max_position_pct
            )));
        }
        if !self.limits.max_total_risk.is_finite()
            || self.limits.max_total_risk <= 0.0
            || self.limits.max_total_risk > 1.0
        {
            return Err(EngineError::Configuration(format!(
                "max_total_risk must be within (0, 1], got {}",
                self.limits.max_total_risk
            )));
        }
        if self.limits.max_open_positions == 0 {
            return Err(EngineError::Configuration(
                "max_open_positions must be at least 1".to_string(),
            ));
        }
        if self.max_risk_per_trade > self.limits.max_total_risk {
            return Err(EngineError::Configuration(format!(
                "max_risk_per_trade ({}) exceeds max_total_risk ({}); every trade would be rejected",
                self.max_risk_per_trade, self.limits.max_total_risk
            )));
        }
        self.sizing.validate()?;
        self.stop_loss.validate()?;
        self.take_profit.validate()?;
        Ok(())
    }
}

/// Converts signals into all-or-nothing position proposals.
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Turn a signal into a sized decision against the current account.
    ///
    /// `Ok(None)` means the signal was a hold and nothing travels
    /// downstream. Risk-ceiling rejection surfaces as
    /// [`EngineError::RiskLimitExceeded`] before any state changes.
    pub fn decide(
        &self,
        signal: &Signal,
        snapshot: &IndicatorSnapshot,
        account: &AccountState,
    ) -> Result<Option<RiskDecision>, EngineError> {
        let side = match signal.direction {
            Direction::Hold => return Ok(None),
            Direction::Buy => PositionSide::Long,
            Direction::Sell => PositionSide::Short,
        };
        let price = snapshot.close;
        let atr = snapshot.atr;

        let stop_loss = self.config.stop_loss.initial_stop(side, price, atr);
        let stop_distance = side.sign() * (price - stop_loss);
        if stop_distance <= 0.0 {
            return Err(EngineError::InvalidRiskDecision(format!(
                "stop {stop_loss} does not protect a {side:?} entry at {price}"
            )));
        }

        let mut size = sizing::position_size(
            &self.config.sizing,
            account.total_equity,
            self.config.max_risk_per_trade,
            price,
            stop_distance,
        )?;
        let max_notional = self.config.max_position_pct * account.total_equity;
        if size * price > max_notional {
            size = max_notional / price;
        }
        let risk_amount = size * stop_distance;

        let ceiling = self.config.limits.max_total_risk * account.total_equity;
        if account.allocated_risk + risk_amount > ceiling {
            return Err(EngineError::RiskLimitExceeded(format!(
                "signal for {} risks {:.2} with {:.2} allocated against a ceiling of {:.2}",
                signal.pair, risk_amount, account.allocated_risk, ceiling
            )));
        }

        let decision = RiskDecision {
            pair: signal.pair.clone(),
            side,
            size,
            reference_price: price,
            stop_loss,
            take_profit_levels: self.config.take_profit.levels(side, price, atr),
            risk_amount,
            strategy: signal.strategy,
            decided_at: snapshot.timestamp,
        };
        decision.validate()?;
        Ok(Some(decision))
    }

    /// Stop candidate for an open position as price moves; feeds the
    /// position's one-way ratchet.
    pub fn trailing_candidate(&self, side: PositionSide, price: f64) -> Option<f64> {
        self.config.stop_loss.trailing_candidate(side, price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{BollingerBands, MacdOutput};
    use crate::strategy::StrategyKind;
    use chrono::{TimeZone, Utc};

    fn snapshot(close: f64, atr: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap(),
            close,
            sma_short: close,
            sma_long: close,
            rsi: 50.0,
            atr,
            adx: 25.0,
            bollinger: BollingerBands {
                upper: close * 1.04,
                middle: close,
                lower: close * 0.96,
            },
            macd: MacdOutput { line: 0.0, signal: 0.0, histogram: 0.0 },
        }
    }

    fn buy_signal(pair: &str) -> Signal {
        Signal::new(
            pair,
            Direction::Buy,
            0.8,
            StrategyKind::TrendFollowing,
            Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap(),
        )
    }

    fn manager(config: RiskConfig) -> RiskManager {
        RiskManager::new(config).unwrap()
    }

    #[test]
    fn hold_produces_no_decision() {
        let m = manager(RiskConfig::default());
        let signal = Signal::hold(
            "BTC/USDT",
            StrategyKind::TrendFollowing,
            Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap(),
        );
        let account = AccountState::new(10_000.0);
        assert!(m.decide(&signal, &snapshot(100.0, 2.0), &account).unwrap().is_none());
    }

    #[test]
    fn risk_based_worked_example_sizes_100_units() {
        // stop 2% below entry 100, uncapped: (10_000 * 0.02) / 2 = 100 units
        let config = RiskConfig {
            max_position_pct: 1.0,
            stop_loss: StopLossPolicy::FixedPct { percentage: 0.02 },
            ..RiskConfig::default()
        };
        let m = manager(config);
        let account = AccountState::new(10_000.0);
        let decision = m
            .decide(&buy_signal("BTC/USDT"), &snapshot(100.0, 2.0), &account)
            .unwrap()
            .unwrap();
        assert!((decision.size - 100.0).abs() < 1e-9);
        assert!((decision.risk_amount - 200.0).abs() < 1e-9);
        assert!((decision.stop_loss - 98.0).abs() < 1e-9);
    }

    #[test]
    fn notional_cap_shrinks_size_and_risk() {
        // uncapped would be 100 units = 10_000 notional; cap at 20% = 2_000
        let config = RiskConfig {
            stop_loss: StopLossPolicy::FixedPct { percentage: 0.02 },
            ..RiskConfig::default()
        };
        let m = manager(config);
        let account = AccountState::new(10_000.0);
        let decision = m
            .decide(&buy_signal("BTC/USDT"), &snapshot(100.0, 2.0), &account)
            .unwrap()
            .unwrap();
        assert!((decision.size - 20.0).abs() < 1e-9);
        assert!((decision.risk_amount - 40.0).abs() < 1e-9);
    }

    #[test]
    fn sell_signal_produces_short_with_stop_above() {
        let m = manager(RiskConfig::default());
        let account = AccountState::new(10_000.0);
        let signal = Signal::new(
            "ETH/USDT",
            Direction::Sell,
            0.7,
            StrategyKind::MeanReversion,
            Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap(),
        );
        let decision = m
            .decide(&signal, &snapshot(200.0, 4.0), &account)
            .unwrap()
            .unwrap();
        assert_eq!(decision.side, PositionSide::Short);
        assert!(decision.stop_loss > 200.0);
        for level in &decision.take_profit_levels {
            assert!(level.price < 200.0);
        }
    }

    #[test]
    fn ceiling_rejection_is_risk_limit_error() {
        let m = manager(RiskConfig::default());
        let mut account = AccountState::new(10_000.0);
        // 9.9% of equity already at risk against the 10% default ceiling
        account.allocated_risk = 990.0;
        let err = m
            .decide(&buy_signal("BTC/USDT"), &snapshot(100.0, 2.0), &account)
            .unwrap_err();
        assert!(matches!(err, EngineError::RiskLimitExceeded(_)));
    }

    #[test]
    fn atr_stop_and_scaled_targets_compose() {
        let config = RiskConfig {
            stop_loss: StopLossPolicy::AtrMultiple { multiplier: 2.0 },
            take_profit: TakeProfitPolicy::default_scaled(),
            ..RiskConfig::default()
        };
        let m = manager(config);
        let account = AccountState::new(10_000.0);
        let decision = m
            .decide(&buy_signal("BTC/USDT"), &snapshot(100.0, 1.5), &account)
            .unwrap()
            .unwrap();
        assert!((decision.stop_loss - 97.0).abs() < 1e-9);
        assert_eq!(decision.take_profit_levels.len(), 3);
        assert!((decision.take_profit_levels[0].price - 105.0).abs() < 1e-9);
    }

    #[test]
    fn per_trade_risk_above_portfolio_ceiling_fails_config() {
        let config = RiskConfig {
            max_risk_per_trade: 0.15,
            ..RiskConfig::default()
        };
        assert!(RiskManager::new(config).is_err());
    }

    #[test]
    fn decision_is_deterministic() {
        let m = manager(RiskConfig::default());
        let account = AccountState::new(10_000.0);
        let s = snapshot(100.0, 2.0);
        let first = m.decide(&buy_signal("BTC/USDT"), &s, &account).unwrap();
        let second = m.decide(&buy_signal("BTC/USDT"), &s, &account).unwrap();
        assert_eq!(first, second);
    }
}
