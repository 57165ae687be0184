//! Kelly Criterion stake sizing for decimal odds.
//!
//! The full Kelly fraction is scaled by a risk fraction that depends on the
//! volatility label: half-Kelly when the market is stable, 30% in transition
//! and 10% when chaotic. No single stake may exceed 10% of the bankroll.
//!
//! Exposes both `KellyCriterion` (Decimal API) and `KellySizer` (f64 API).

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use super::market::QuantumState;

/// Kelly Criterion calculator for decimal odds (Decimal API).
#[derive(Debug, Clone)]
pub struct KellyCriterion {
    /// Share of full Kelly staked when the market is stable.
    stable_fraction: Decimal,
    /// Share of full Kelly staked during a transition.
    transition_fraction: Decimal,
    /// Share of full Kelly staked when the market is chaotic.
    chaotic_fraction: Decimal,
    /// Maximum stake as fraction of bankroll.
    max_stake_fraction: Decimal,
}

impl KellyCriterion {
    /// Creates a calculator with explicit per-state fractions and stake cap.
    pub fn new(
        stable_fraction: Decimal,
        transition_fraction: Decimal,
        chaotic_fraction: Decimal,
        max_stake_fraction: Decimal,
    ) -> Self {
        Self {
            stable_fraction,
            transition_fraction,
            chaotic_fraction,
            max_stake_fraction,
        }
    }

    /// Risk fraction applied to full Kelly in the given state.
    pub fn risk_fraction(&self, state: QuantumState) -> Decimal {
        match state {
            QuantumState::Stable => self.stable_fraction,
            QuantumState::Transition => self.transition_fraction,
            QuantumState::Chaotic => self.chaotic_fraction,
        }
    }

    /// Full Kelly fraction for a decimal odd.
    ///
    ///   f* = (p * b - q) / b
    /// where:
    ///   p = estimated probability of winning
    ///   q = 1 - p
    ///   b = odd - 1 (net payout per unit)
    pub fn full_fraction(&self, prob: Decimal, odd: Decimal) -> Decimal {
        if odd <= Decimal::ONE || prob <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let b = odd - Decimal::ONE;
        let q = Decimal::ONE - prob;
        let full_kelly = (prob * b - q) / b;

        full_kelly.max(Decimal::ZERO)
    }

    /// Stake as a fraction of bankroll after risk scaling and the cap.
    pub fn stake_fraction(&self, prob: Decimal, odd: Decimal, state: QuantumState) -> Decimal {
        let full = self.full_fraction(prob, odd);
        if full <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (full * self.risk_fraction(state)).min(self.max_stake_fraction)
    }

    /// Stake amount for the bankroll, rounded to cents.
    pub fn stake(
        &self,
        prob: Decimal,
        odd: Decimal,
        bankroll: Decimal,
        state: QuantumState,
    ) -> Decimal {
        if bankroll <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (bankroll * self.stake_fraction(prob, odd, state)).round_dp(2)
    }
}

impl Default for KellyCriterion {
    /// Default: 0.5 / 0.3 / 0.1 of full Kelly, 10% bankroll cap.
    fn default() -> Self {
        Self {
            stable_fraction: dec!(0.5),
            transition_fraction: dec!(0.3),
            chaotic_fraction: dec!(0.1),
            max_stake_fraction: dec!(0.10),
        }
    }
}

// ────────────────────────────────────────────
// KellySizer - f64 boundary API for usecases
// ────────────────────────────────────────────

/// Lightweight f64 wrapper around `KellyCriterion`.
///
/// Accepts and returns `f64` so use cases never import `Decimal`.
#[derive(Debug, Clone, Default)]
pub struct KellySizer {
    inner: KellyCriterion,
}

impl KellySizer {
    /// Create a sizer from per-state fractions and a bankroll cap.
    pub fn new(stable: f64, transition: f64, chaotic: f64, max_stake_fraction: f64) -> Self {
        let frac = |v: f64, fallback: Decimal| Decimal::from_f64(v).unwrap_or(fallback);
        Self {
            inner: KellyCriterion::new(
                frac(stable, dec!(0.5)),
                frac(transition, dec!(0.3)),
                frac(chaotic, dec!(0.1)),
                frac(max_stake_fraction, dec!(0.10)),
            ),
        }
    }

    /// Stake in currency units for the given bankroll.
    pub fn stake(&self, prob: f64, odd: f64, bankroll: f64, state: QuantumState) -> f64 {
        let (Some(prob), Some(odd), Some(bank)) = (
            Decimal::from_f64(prob),
            Decimal::from_f64(odd),
            Decimal::from_f64(bankroll),
        ) else {
            return 0.0;
        };

        self.inner
            .stake(prob, odd, bank, state)
            .to_f64()
            .unwrap_or(0.0)
    }

    /// Stake as a fraction of bankroll (0.0 – max stake fraction).
    pub fn stake_fraction(&self, prob: f64, odd: f64, state: QuantumState) -> f64 {
        let prob = Decimal::from_f64(prob).unwrap_or(Decimal::ZERO);
        let odd = Decimal::from_f64(odd).unwrap_or(Decimal::ONE);

        self.inner
            .stake_fraction(prob, odd, state)
            .to_f64()
            .unwrap_or(0.0)
    }

    /// Access the underlying precise calculator.
    pub fn inner(&self) -> &KellyCriterion {
        &self.inner
    }
}
