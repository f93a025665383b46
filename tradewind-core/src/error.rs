//! Engine error kinds and their recovery contract.
//!
//! Only `Configuration` is fatal to the process; every other variant is a
//! per-cycle condition the caller recovers from locally, so one pair's
//! failure never halts sibling pairs or an in-flight backtest.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Not enough candles observed yet for the longest configured period.
    /// Recoverable: hold and wait for more data.
    #[error("insufficient history: have {have} candles, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    /// Invalid configuration detected at startup. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Accepting the proposal would breach a portfolio ceiling (total risk
    /// or open-position count). Recoverable: the signal is dropped, no
    /// position opens.
    #[error("risk limit exceeded: {0}")]
    RiskLimitExceeded(String),

    /// A computed decision value is unusable (non-positive size, inverted
    /// stop, duplicate position). Recoverable: the decision is rejected
    /// whole, never partially applied.
    #[error("invalid risk decision: {0}")]
    InvalidRiskDecision(String),

    /// The execution collaborator reported a failure. Recoverable: state is
    /// unchanged and the signal is eligible for retry on the next cycle.
    #[error("execution failure: {0}")]
    ExecutionFailure(String),
}

impl EngineError {
    /// Whether the process can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EngineError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configuration_is_fatal() {
        assert!(!EngineError::Configuration("bad".into()).is_recoverable());
        assert!(EngineError::InsufficientHistory { have: 3, need: 14 }.is_recoverable());
        assert!(EngineError::RiskLimitExceeded("ceiling reached".into()).is_recoverable());
        assert!(EngineError::InvalidRiskDecision("negative size".into()).is_recoverable());
        assert!(EngineError::ExecutionFailure("venue timeout".into()).is_recoverable());
    }

    #[test]
    fn display_includes_counts() {
        let err = EngineError::InsufficientHistory { have: 3, need: 14 };
        assert_eq!(
            err.to_string(),
            "insufficient history: have 3 candles, need 14"
        );
    }
}
