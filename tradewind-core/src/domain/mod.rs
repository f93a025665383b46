//! Core domain types shared by every component.

pub mod account;
pub mod candle;
pub mod decision;
pub mod position;
pub mod signal;
pub mod trade;

pub use account::{AccountState, PortfolioLimits};
pub use candle::{validate_series, Candle, SeriesDefect, Timeframe};
pub use decision::{RiskDecision, FRACTION_TOLERANCE};
pub use position::{Position, PositionSide, PositionStatus, TakeProfitLevel};
pub use signal::{Direction, Signal};
pub use trade::{ClosedTrade, ExitReason, PerformanceRecord};
