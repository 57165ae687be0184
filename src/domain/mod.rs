//! Domain layer - Core betting models and heuristics.
//!
//! Pure logic for the three-phase allocation advisor: market types,
//! contextual probabilities, the portfolio optimizer and Kelly sizing.
//! No I/O happens here (hexagonal architecture inner ring).
//! All types are serializable and testable in isolation.

pub mod error;
pub mod kelly;
pub mod market;
pub mod money;
pub mod optimizer;
pub mod probability;

// Re-export core types for convenience
pub use error::{AdvisorError, AdvisorResult};
pub use kelly::{KellyCriterion, KellySizer};
pub use market::{
    BetPortfolio, BetType, ComboBet, HumanBiasProfile, MatchCondition, Phase, QuantumBet,
    QuantumState, Score, Side,
};
pub use optimizer::{PortfolioOptimizer, correlation_matrix};
pub use probability::{ProbabilityModel, profit_margin};
