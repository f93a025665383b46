//! The per-pair decision pipeline: indicators, regime, strategy, risk.
//!
//! One [`DecisionPipeline`] owns everything a single pair needs to turn a
//! candle into an optional [`RiskDecision`]. It holds no account state and
//! performs no execution; callers pass the current [`AccountState`] in and
//! act on the outcome themselves. Backtests and paper sessions drive the
//! same pipeline, which is what makes replayed and live decisions
//! comparable.

use serde::{Deserialize, Serialize};

use crate::domain::account::{AccountState, PortfolioLimits};
use crate::domain::candle::Candle;
use crate::domain::decision::RiskDecision;
use crate::domain::position::PositionSide;
use crate::domain::signal::Signal;
use crate::error::EngineError;
use crate::indicators::{IndicatorConfig, IndicatorEngine, IndicatorSnapshot};
use crate::regime::{classify, MarketRegime, RegimeConfig};
use crate::risk::{RiskConfig, RiskManager};
use crate::strategy::{
    Strategy, StrategyConfig, StrategyContext, StrategyKind, StrategyMemory, StrategySelector,
};

/// Everything one pipeline needs, one section per stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub indicators: IndicatorConfig,
    pub regime: RegimeConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
}

impl PipelineConfig {
    /// Validate every section. Run before any pipeline is built so a bad
    /// config dies at startup, not mid-replay.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.indicators.validate()?;
        self.regime.validate()?;
        self.strategy.validate()?;
        self.risk.validate()?;
        Ok(())
    }

    pub fn limits(&self) -> PortfolioLimits {
        self.risk.limits
    }
}

/// Everything one candle produced, in pipeline order.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub snapshot: IndicatorSnapshot,
    pub regime: MarketRegime,
    pub signal: Signal,
    /// A sized proposal, present only for a directional signal that cleared
    /// the risk checks.
    pub decision: Option<RiskDecision>,
    /// Why the risk manager vetoed the signal, when it did.
    pub rejection: Option<EngineError>,
}

#[derive(Debug, Clone)]
pub struct DecisionPipeline {
    pair: String,
    engine: IndicatorEngine,
    regime_config: RegimeConfig,
    selector: StrategySelector,
    strategies: [Strategy; 4],
    memory: StrategyMemory,
    risk: RiskManager,
}

fn strategy_slot(kind: StrategyKind) -> usize {
    match kind {
        StrategyKind::AdaptiveMomentum => 0,
        StrategyKind::MeanReversion => 1,
        StrategyKind::TrendFollowing => 2,
        StrategyKind::ModelBased => 3,
    }
}

impl DecisionPipeline {
    pub fn new(pair: impl Into<String>, config: &PipelineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let strategies = [
            config.strategy.build(StrategyKind::AdaptiveMomentum),
            config.strategy.build(StrategyKind::MeanReversion),
            config.strategy.build(StrategyKind::TrendFollowing),
            config.strategy.build(StrategyKind::ModelBased),
        ];
        Ok(Self {
            pair: pair.into(),
            engine: IndicatorEngine::new(&config.indicators)?,
            regime_config: config.regime.clone(),
            selector: config.strategy.selector(),
            strategies,
            memory: StrategyMemory::default(),
            risk: RiskManager::new(config.risk.clone())?,
        })
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Candles to feed before the first snapshot appears.
    pub fn required_history(&self) -> usize {
        self.engine.required_history()
    }

    pub fn is_warm(&self) -> bool {
        self.engine.is_warm()
    }

    /// Run one full cycle for one candle.
    ///
    /// `InsufficientHistory` during warmup and `ExecutionFailure` on a
    /// defective candle pass through untouched; the pipeline's own state is
    /// unaffected by the latter. Risk vetoes are folded into the outcome so
    /// the caller can count them without special-casing the error path.
    pub fn observe(
        &mut self,
        candle: &Candle,
        account: &AccountState,
    ) -> Result<CycleOutcome, EngineError> {
        let snapshot = self.engine.apply(candle)?;
        let regime = classify(&snapshot, &self.regime_config);
        let kind = self.selector.select(regime);

        let signal = {
            let ctx = StrategyContext {
                pair: &self.pair,
                regime,
                snapshot: &snapshot,
                candles: self.engine.window(),
            };
            self.strategies[strategy_slot(kind)].evaluate(&ctx, &self.memory)
        };
        self.memory = self.memory.advanced(&snapshot, &signal);

        let (decision, rejection) = if signal.direction.is_hold() {
            (None, None)
        } else {
            match self.risk.decide(&signal, &snapshot, account) {
                Ok(decision) => (decision, None),
                Err(err) if err.is_recoverable() => (None, Some(err)),
                Err(err) => return Err(err),
            }
        };

        Ok(CycleOutcome {
            snapshot,
            regime,
            signal,
            decision,
            rejection,
        })
    }

    /// Stop-ratchet candidate for an open position, if the configured stop
    /// policy trails.
    pub fn trailing_candidate(&self, side: PositionSide, price: f64) -> Option<f64> {
        self.risk.trailing_candidate(side, price)
    }

    /// Re-enter warmup after a data gap. Strategy memory is dropped too:
    /// a crossover read across missing candles is not a crossover.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.memory = StrategyMemory::default();
    }
}
