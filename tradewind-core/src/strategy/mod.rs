//! Strategy variants and the regime-conditioned selector.
//!
//! Variants are a closed set dispatched by exhaustive match, all sharing
//! the same capability: given a snapshot, the trailing candle window and
//! explicit memory, produce a [`Signal`]. Swapping variants never changes
//! the indicator or risk contracts.

pub mod mean_reversion;
pub mod memory;
pub mod model_based;
pub mod momentum;
pub mod trend_following;

use serde::{Deserialize, Serialize};

use crate::domain::candle::Candle;
use crate::domain::signal::Signal;
use crate::error::EngineError;
use crate::indicators::IndicatorSnapshot;
use crate::regime::MarketRegime;

pub use mean_reversion::MeanReversion;
pub use memory::StrategyMemory;
pub use model_based::ModelBased;
pub use momentum::AdaptiveMomentum;
pub use trend_following::TrendFollowing;

/// Identity tag for the fixed set of strategy variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    AdaptiveMomentum,
    MeanReversion,
    TrendFollowing,
    ModelBased,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::AdaptiveMomentum,
        StrategyKind::MeanReversion,
        StrategyKind::TrendFollowing,
        StrategyKind::ModelBased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::AdaptiveMomentum => "adaptive_momentum",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::TrendFollowing => "trend_following",
            StrategyKind::ModelBased => "model_based",
        }
    }
}

/// Everything a strategy may look at for one evaluation.
///
/// `candles` is the trailing window ending at the candle that produced
/// `snapshot`; nothing newer is ever present.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub pair: &'a str,
    pub regime: MarketRegime,
    pub snapshot: &'a IndicatorSnapshot,
    pub candles: &'a [Candle],
}

/// A configured strategy variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    AdaptiveMomentum(AdaptiveMomentum),
    MeanReversion(MeanReversion),
    TrendFollowing(TrendFollowing),
    ModelBased(ModelBased),
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::AdaptiveMomentum(_) => StrategyKind::AdaptiveMomentum,
            Strategy::MeanReversion(_) => StrategyKind::MeanReversion,
            Strategy::TrendFollowing(_) => StrategyKind::TrendFollowing,
            Strategy::ModelBased(_) => StrategyKind::ModelBased,
        }
    }

    /// Evaluate one cycle. Pure: identical inputs yield identical signals.
    pub fn evaluate(&self, ctx: &StrategyContext<'_>, memory: &StrategyMemory) -> Signal {
        match self {
            Strategy::AdaptiveMomentum(s) => s.evaluate(ctx, memory),
            Strategy::MeanReversion(s) => s.evaluate(ctx, memory),
            Strategy::TrendFollowing(s) => s.evaluate(ctx, memory),
            Strategy::ModelBased(s) => s.evaluate(ctx, memory),
        }
    }
}

/// Regime to strategy mapping, with an optional configuration pin that
/// overrides the lookup entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategySelector {
    pub pinned: Option<StrategyKind>,
}

impl StrategySelector {
    pub fn new() -> Self {
        Self { pinned: None }
    }

    pub fn pinned(kind: StrategyKind) -> Self {
        Self { pinned: Some(kind) }
    }

    /// Pure lookup: regime decides unless a pin is set.
    pub fn select(&self, regime: MarketRegime) -> StrategyKind {
        if let Some(kind) = self.pinned {
            return kind;
        }
        match regime {
            MarketRegime::Trending => StrategyKind::TrendFollowing,
            MarketRegime::Ranging => StrategyKind::MeanReversion,
            MarketRegime::Volatile => StrategyKind::AdaptiveMomentum,
            MarketRegime::Unknown => StrategyKind::AdaptiveMomentum,
        }
    }
}

/// Parameters for every variant plus the optional pin, as configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategyConfig {
    /// Run this variant in every regime instead of the regime lookup.
    pub pinned: Option<StrategyKind>,
    pub adaptive_momentum: AdaptiveMomentum,
    pub mean_reversion: MeanReversion,
    pub trend_following: TrendFollowing,
    pub model_based: ModelBased,
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.adaptive_momentum.validate()?;
        self.mean_reversion.validate()?;
        self.trend_following.validate()?;
        self.model_based.validate()?;
        Ok(())
    }

    pub fn selector(&self) -> StrategySelector {
        StrategySelector { pinned: self.pinned }
    }

    /// Instantiate the variant for `kind` with its configured parameters.
    pub fn build(&self, kind: StrategyKind) -> Strategy {
        match kind {
            StrategyKind::AdaptiveMomentum => {
                Strategy::AdaptiveMomentum(self.adaptive_momentum.clone())
            }
            StrategyKind::MeanReversion => Strategy::MeanReversion(self.mean_reversion.clone()),
            StrategyKind::TrendFollowing => Strategy::TrendFollowing(self.trend_following.clone()),
            StrategyKind::ModelBased => Strategy::ModelBased(self.model_based.clone()),
        }
    }
}
