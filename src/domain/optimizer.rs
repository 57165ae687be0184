//! Rule-based portfolio optimizer for the anchor markets.
//!
//! Selection is deterministic: `Over15Match` always carries a fixed
//! third of the portfolio, the remaining markets are picked by pairwise
//! odd comparisons and weighted by squared expected value. Behavioural
//! multipliers and floors are applied last, then everything is
//! renormalised to sum to 1.

use std::collections::BTreeMap;

use tracing::debug;

use super::market::{BetType, HumanBiasProfile, MatchCondition, QuantumState};
use super::probability::ProbabilityModel;

/// Fixed weight of the `Over15Match` anchor before normalisation.
pub const ANCHOR_WEIGHT: f64 = 0.333;

/// Lowest weight kept for the speculative markets.
pub const MIN_WEIGHT: f64 = 0.05;

/// Odds used when the caller supplies none for a market.
pub const DEFAULT_ODDS: [(BetType, f64); 6] = [
    (BetType::Over15Match, 1.45),
    (BetType::Under25, 1.52),
    (BetType::BothToScore, 2.05),
    (BetType::DoubleChanceUnderdog, 1.75),
    (BetType::Over15FirstHalf, 1.95),
    (BetType::Winner, 2.15),
];

const FLOORED: [BetType; 3] = [
    BetType::Over15FirstHalf,
    BetType::DoubleChanceUnderdog,
    BetType::Winner,
];

/// Pairwise correlations between anchor markets. Unlisted pairs are 0.
const CORRELATIONS: [((BetType, BetType), f64); 6] = [
    ((BetType::Under25, BetType::Over15FirstHalf), -0.6),
    ((BetType::Under25, BetType::BothToScore), -0.7),
    ((BetType::Over15FirstHalf, BetType::BothToScore), 0.5),
    ((BetType::DoubleChanceUnderdog, BetType::Over15Match), 0.3),
    ((BetType::DoubleChanceUnderdog, BetType::Under25), 0.4),
    ((BetType::Over15Match, BetType::BothToScore), 0.6),
];

/// Allocation optimizer. Stateless apart from the probability model.
#[derive(Debug, Clone, Default)]
pub struct PortfolioOptimizer {
    model: ProbabilityModel,
}

impl PortfolioOptimizer {
    pub fn new(model: ProbabilityModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ProbabilityModel {
        &self.model
    }

    /// Compute allocation percentages for the selected markets.
    ///
    /// The returned weights are non-negative, always contain
    /// `Over15Match`, and sum to 1. `state` does not change the result.
    pub fn optimize(
        &self,
        available: &BTreeMap<BetType, f64>,
        condition: &MatchCondition,
        state: QuantumState,
        bias: Option<&HumanBiasProfile>,
    ) -> BTreeMap<BetType, f64> {
        let odd = |bt: BetType| {
            available.get(&bt).copied().unwrap_or_else(|| default_odd(bt))
        };

        // (odd, weight) per selected market
        let mut selected: BTreeMap<BetType, (f64, f64)> = BTreeMap::new();
        selected.insert(BetType::Over15Match, (odd(BetType::Over15Match), ANCHOR_WEIGHT));

        if odd(BetType::Under25) < odd(BetType::BothToScore) {
            selected.insert(BetType::Under25, (odd(BetType::Under25), 0.0));
        } else {
            selected.insert(BetType::BothToScore, (odd(BetType::BothToScore), 0.0));
        }

        if odd(BetType::DoubleChanceUnderdog) < odd(BetType::Winner) {
            selected.insert(
                BetType::DoubleChanceUnderdog,
                (odd(BetType::DoubleChanceUnderdog), 0.0),
            );
        } else {
            selected.insert(BetType::Winner, (odd(BetType::Winner), 0.0));
        }

        if odd(BetType::Over15FirstHalf) < 2.0 {
            selected.insert(BetType::Over15FirstHalf, (odd(BetType::Over15FirstHalf), 0.0));
            selected.remove(&BetType::Under25);
        }

        let secondary: Vec<BetType> = selected
            .keys()
            .copied()
            .filter(|bt| *bt != BetType::Over15Match)
            .collect();

        let scores: Vec<f64> = secondary
            .iter()
            .map(|bt| {
                let prob = self.model.estimate(*bt, condition);
                let ev = prob.mul_add(selected[bt].0, -1.0);
                ev * ev
            })
            .collect();
        let total_score: f64 = scores.iter().sum();
        let remaining = 1.0 - ANCHOR_WEIGHT;

        for (bt, score) in secondary.iter().zip(&scores) {
            if let Some(entry) = selected.get_mut(bt) {
                entry.1 = if total_score > 0.0 {
                    score / total_score * remaining
                } else {
                    remaining / secondary.len() as f64
                };
            }
        }

        if let Some(profile) = bias {
            for bt in &secondary {
                if let (Some(factor), Some(entry)) =
                    (profile.market_weights.get(bt), selected.get_mut(bt))
                {
                    entry.1 *= factor;
                }
            }
            for (tag, factors) in &profile.context_factors {
                if !condition.has_context(tag) {
                    continue;
                }
                for (bt, factor) in factors {
                    if let Some(entry) = selected.get_mut(bt) {
                        entry.1 *= factor;
                    }
                }
            }
        }

        for bt in FLOORED {
            if let Some(entry) = selected.get_mut(&bt) {
                entry.1 = entry.1.max(MIN_WEIGHT);
            }
        }

        let total: f64 = selected.values().map(|(_, w)| w).sum();
        debug!(
            %state,
            markets = selected.len(),
            total_weight = total,
            "Portfolio optimized"
        );

        if total > 0.0 {
            selected
                .into_iter()
                .map(|(bt, (_, w))| (bt, w / total))
                .collect()
        } else {
            let equal = 1.0 / selected.len() as f64;
            selected.into_keys().map(|bt| (bt, equal)).collect()
        }
    }
}

/// Default odd for a market, 2.0 if it has none in the table.
pub fn default_odd(bet_type: BetType) -> f64 {
    DEFAULT_ODDS
        .iter()
        .find(|(bt, _)| *bt == bet_type)
        .map_or(2.0, |(_, odd)| *odd)
}

/// Correlation between two markets.
pub fn correlation(a: BetType, b: BetType) -> f64 {
    if a == b {
        return 1.0;
    }
    CORRELATIONS
        .iter()
        .find(|((x, y), _)| (*x == a && *y == b) || (*x == b && *y == a))
        .map_or(0.0, |(_, c)| *c)
}

/// Symmetric correlation matrix with unit diagonal, in input order.
pub fn correlation_matrix(bet_types: &[BetType]) -> Vec<Vec<f64>> {
    bet_types
        .iter()
        .enumerate()
        .map(|(i, a)| {
            bet_types
                .iter()
                .enumerate()
                .map(|(j, b)| if i == j { 1.0 } else { correlation(*a, *b) })
                .collect()
        })
        .collect()
}
