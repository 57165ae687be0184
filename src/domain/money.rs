//! Cent rounding for stake amounts.
//!
//! Heuristics run in `f64`; amounts shown to the user or recorded in the
//! portfolio go through `Decimal` so they land on exact cents.

use rust_decimal::prelude::*;

/// Round an amount to cents, midpoints away from zero.
pub fn round_cents(amount: f64) -> f64 {
    Decimal::from_f64(amount)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(0.0)
}

/// Split `total` by `weights`, rounding each part to cents.
///
/// The last part absorbs the rounding remainder so the parts sum to `total`
/// exactly (in cents).
pub fn split_cents(total: f64, weights: &[f64]) -> Vec<f64> {
    let Some(total_dec) = Decimal::from_f64(total) else {
        return vec![0.0; weights.len()];
    };
    let total_dec = total_dec.round_dp(2);
    let mut parts: Vec<Decimal> = weights
        .iter()
        .map(|w| {
            Decimal::from_f64(total * w)
                .unwrap_or(Decimal::ZERO)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        })
        .collect();
    if let Some((last, rest)) = parts.split_last_mut() {
        let allocated: Decimal = rest.iter().copied().sum();
        *last = total_dec - allocated;
    }
    parts.into_iter().map(|d| d.to_f64().unwrap_or(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(5.764_999), 5.76);
        assert_eq!(round_cents(3.2451), 3.25);
        assert_eq!(round_cents(0.0), 0.0);
    }

    #[test]
    fn test_split_cents_sums_exactly() {
        let parts = split_cents(31.0, &[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);
        assert_eq!(parts.len(), 3);
        let sum: f64 = parts.iter().sum();
        assert!((sum - 31.0).abs() < 1e-9);
        assert_eq!(parts[0], 10.33);
        assert_eq!(parts[2], 10.34);
    }

    #[test]
    fn test_split_cents_empty() {
        assert!(split_cents(10.0, &[]).is_empty());
    }
}
