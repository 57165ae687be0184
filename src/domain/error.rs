//! Advisor error taxonomy.
//!
//! Three recovery classes exist:
//! - input errors leave the session untouched,
//! - `PhaseLocked` redirects the session to the earliest open phase,
//! - `CorruptState` resets the session (capital is kept).

use thiserror::Error;

use super::market::{BetType, Phase};

/// Errors raised by domain and use-case operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdvisorError {
    #[error("capital must be at least {min:.2}, got {got:.2}")]
    InvalidCapital { got: f64, min: f64 },

    #[error("capital is already set to {0:.2}; reset the session to change it")]
    CapitalLocked(f64),

    #[error("odd for {market} must be >= 1.01, got {odd}")]
    InvalidOdd { market: BetType, odd: f64 },

    #[error("invalid score {0:?}, expected \"<home>-<away>\"")]
    InvalidScore(String),

    #[error("minute must be in 0..=120, got {0}")]
    InvalidMinute(u32),

    #[error("pressure must be in [0, 1], got {0}")]
    InvalidPressure(f64),

    #[error("unknown market {0:?}")]
    UnknownMarket(String),

    #[error("unknown volatility {0:?}, expected stable, transition or chaotic")]
    UnknownVolatility(String),

    #[error("unknown side {0:?}, expected home or away")]
    UnknownSide(String),

    #[error("unknown combination {0:?}")]
    UnknownCombo(String),

    #[error("no allocation has been computed yet")]
    NoAllocation,

    #[error("select at least one combination before confirming")]
    NothingSelected,

    #[error("insufficient capital for {phase}: {available:.2} available")]
    InsufficientCapital { phase: Phase, available: f64 },

    #[error("{requested} is locked until {required} is confirmed")]
    PhaseLocked { requested: Phase, required: Phase },

    #[error("session state is inconsistent: {0}")]
    CorruptState(String),

    #[error("a red card can only be recorded after minute 30, got {0}")]
    RedCardTooEarly(u32),

    #[error("recommendation {index} cannot be applied: {reason}")]
    ApplyRejected { index: usize, reason: String },

    #[error("missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("session not started: set the capital first")]
    NotStarted,
}

impl AdvisorError {
    /// Whether the session must be reset after this error.
    pub fn resets_session(&self) -> bool {
        matches!(self, Self::CorruptState(_))
    }

    /// The phase the session should fall back to, if any.
    pub fn redirect(&self) -> Option<Phase> {
        match self {
            Self::PhaseLocked { required, .. } => Some(*required),
            _ => None,
        }
    }
}

/// Result alias for advisor operations.
pub type AdvisorResult<T> = Result<T, AdvisorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_corrupt_state_resets() {
        assert!(AdvisorError::CorruptState("x".into()).resets_session());
        assert!(!AdvisorError::NoAllocation.resets_session());
        assert!(!AdvisorError::InvalidMinute(130).resets_session());
    }

    #[test]
    fn test_phase_locked_redirects() {
        let err = AdvisorError::PhaseLocked {
            requested: Phase::InPlay,
            required: Phase::MultiBets,
        };
        assert_eq!(err.redirect(), Some(Phase::MultiBets));
        assert_eq!(AdvisorError::NothingSelected.redirect(), None);
    }

    #[test]
    fn test_error_messages() {
        let err = AdvisorError::InvalidOdd {
            market: BetType::Under25,
            odd: 0.9,
        };
        assert_eq!(err.to_string(), "odd for under_25 must be >= 1.01, got 0.9");
    }
}
