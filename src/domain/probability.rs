//! Contextual probability estimation.
//!
//! Each market starts from a historical base rate and is adjusted by the
//! score, the minute and the pressure of both teams. The adjustments are
//! piecewise rules; results are clamped into a sane probability band.

use serde::{Deserialize, Serialize};

use super::market::{BetType, MatchCondition};

/// Historical parameters for a market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPrior {
    /// Base probability before any match context.
    pub base_prob: f64,
    /// Market-specific adjustment rate (decay, growth or momentum).
    pub rate: f64,
}

impl MarketPrior {
    const fn new(base_prob: f64, rate: f64) -> Self {
        Self { base_prob, rate }
    }
}

/// Historical base rates for the markets the optimizer trades.
pub const fn historical_prior(bet_type: BetType) -> MarketPrior {
    match bet_type {
        BetType::Under25 => MarketPrior::new(0.58, 0.015),
        BetType::Over15FirstHalf => MarketPrior::new(0.42, 0.025),
        BetType::BothToScore => MarketPrior::new(0.53, 1.2),
        BetType::Winner => MarketPrior::new(0.65, 1.5),
        BetType::DoubleChanceUnderdog => MarketPrior::new(0.45, 0.15),
        BetType::Over15Match => MarketPrior::new(0.65, 0.3),
        _ => MarketPrior::new(0.5, 0.0),
    }
}

/// Stateless estimator of in-context probabilities.
#[derive(Debug, Clone)]
pub struct ProbabilityModel {
    /// Odd the underdog double chance is normalised against.
    underdog_reference_odd: f64,
}

impl Default for ProbabilityModel {
    fn default() -> Self {
        Self {
            underdog_reference_odd: 2.0,
        }
    }
}

impl ProbabilityModel {
    pub fn new(underdog_reference_odd: f64) -> Self {
        Self {
            underdog_reference_odd: underdog_reference_odd.max(1.01),
        }
    }

    /// Estimate the probability of `bet_type` landing given the match snapshot.
    pub fn estimate(&self, bet_type: BetType, condition: &MatchCondition) -> f64 {
        let prior = historical_prior(bet_type);
        let score = condition.score;
        let goals = score.total();
        let minute = f64::from(condition.minute);

        let mut prob = prior.base_prob;
        match bet_type {
            BetType::Under25 => {
                if goals >= 2 {
                    return 0.01;
                }
                if goals == 1 {
                    prob *= 0.6;
                }
                prob -= prior.rate * (minute / 90.0);
            }
            BetType::Over15FirstHalf => {
                if condition.minute > 45 {
                    return if goals >= 2 { 1.0 } else { 0.0 };
                }
                prob += prior.rate * (minute / 45.0);
                prob *= 1.0 + (condition.home_pressure + condition.away_pressure - 1.0) / 2.0;
            }
            BetType::BothToScore => {
                if score.both_scored() {
                    return 0.99;
                }
                if condition.minute > 75 {
                    prob *= 0.5;
                }
                if goals > 0 {
                    prob *= prior.rate;
                }
            }
            BetType::DoubleChanceUnderdog => return self.underdog_double_chance(condition),
            BetType::Over15Match => return Self::over_15_match(condition),
            _ => {}
        }

        prob.clamp(0.01, 0.99)
    }

    /// Double chance on the side with less pressure.
    fn underdog_double_chance(&self, condition: &MatchCondition) -> f64 {
        let mut prob = 0.45 * (1.5 / self.underdog_reference_odd);

        let score = condition.score;
        let home_is_underdog = condition.home_pressure < condition.away_pressure;
        let deficit = if home_is_underdog {
            -score.diff()
        } else {
            score.diff()
        };

        if deficit <= 0 {
            return (prob * 1.2).min(0.99);
        }
        if deficit == 1 {
            prob = (prob * 1.4).min(0.8);
        } else {
            prob = (prob * 0.5).max(0.1);
        }

        if condition.minute < 30 {
            prob = (prob * 1.3).min(0.7);
        } else if condition.minute > 75 {
            prob = (prob * 0.7).max(0.15);
        }

        prob.clamp(0.2, 0.6)
    }

    /// Two or more goals across the whole match.
    fn over_15_match(condition: &MatchCondition) -> f64 {
        let goals = condition.score.total();
        let minute = f64::from(condition.minute);

        if goals >= 2 {
            return 0.99;
        }
        if goals == 1 {
            return (minute / 120.0).mul_add(-0.4, 0.75);
        }

        let pressure = (condition.home_pressure + condition.away_pressure) / 2.0;
        let adjusted = 0.65 * pressure.mul_add(0.6, 0.7);
        let time_decay = (minute / 90.0) * 0.5;
        (adjusted * (1.0 - time_decay)).clamp(0.05, 0.95)
    }

    /// Probability over the rest of regulation time, in 5-minute steps.
    ///
    /// Score and pressure are held fixed; only the minute moves.
    pub fn probability_curve(
        &self,
        bet_type: BetType,
        condition: &MatchCondition,
    ) -> Vec<(u32, f64)> {
        (condition.minute..=90)
            .step_by(5)
            .map(|m| (m, self.estimate(bet_type, &condition.at_minute(m))))
            .collect()
    }
}

/// Edge of `prob` over the bookmaker's implied probability, scaled by odd band.
///
/// Odds between 1.7 and 2.5 keep the full margin, longer odds keep 70%,
/// shorter odds keep half.
pub fn profit_margin(odd: f64, prob: f64) -> f64 {
    if odd <= 0.0 {
        return 0.0;
    }
    let raw = prob - 1.0 / odd;
    if (1.7..=2.5).contains(&odd) {
        raw
    } else if odd > 2.5 {
        raw * 0.7
    } else {
        raw * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Score;

    fn cond(score: (u32, u32), minute: u32, hp: f64, ap: f64) -> MatchCondition {
        MatchCondition::new(Score::new(score.0, score.1), minute, hp, ap).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_under_25_kickoff_is_base_rate() {
        let model = ProbabilityModel::default();
        assert!(approx(model.estimate(BetType::Under25, &MatchCondition::default()), 0.58));
    }

    #[test]
    fn test_under_25_dead_after_two_goals() {
        let model = ProbabilityModel::default();
        assert_eq!(model.estimate(BetType::Under25, &cond((1, 1), 30, 0.5, 0.5)), 0.01);
    }

    #[test]
    fn test_under_25_one_goal_at_full_time() {
        let model = ProbabilityModel::default();
        let p = model.estimate(BetType::Under25, &cond((1, 0), 90, 0.5, 0.5));
        assert!(approx(p, 0.58 * 0.6 - 0.015));
    }

    #[test]
    fn test_over_15_fh_settles_after_half() {
        let model = ProbabilityModel::default();
        assert_eq!(model.estimate(BetType::Over15FirstHalf, &cond((1, 1), 50, 0.5, 0.5)), 1.0);
        assert_eq!(model.estimate(BetType::Over15FirstHalf, &cond((1, 0), 50, 0.5, 0.5)), 0.0);
    }

    #[test]
    fn test_over_15_fh_pressure_scaling() {
        let model = ProbabilityModel::default();
        let p = model.estimate(BetType::Over15FirstHalf, &cond((0, 0), 45, 0.8, 0.6));
        assert!(approx(p, (0.42 + 0.025) * 1.2));
    }

    #[test]
    fn test_both_to_score_rules() {
        let model = ProbabilityModel::default();
        assert_eq!(model.estimate(BetType::BothToScore, &cond((1, 1), 10, 0.5, 0.5)), 0.99);
        let late = model.estimate(BetType::BothToScore, &cond((1, 0), 80, 0.5, 0.5));
        assert!(approx(late, 0.53 * 0.5 * 1.2));
        let early = model.estimate(BetType::BothToScore, &cond((1, 0), 20, 0.5, 0.5));
        assert!(approx(early, 0.53 * 1.2));
    }

    #[test]
    fn test_underdog_double_chance_level_game() {
        let model = ProbabilityModel::default();
        let p = model.estimate(BetType::DoubleChanceUnderdog, &MatchCondition::default());
        assert!(approx(p, 0.3375 * 1.2));
    }

    #[test]
    fn test_underdog_double_chance_one_behind() {
        let model = ProbabilityModel::default();
        // Home has less pressure, so home is the underdog and trails by one.
        let p = model.estimate(BetType::DoubleChanceUnderdog, &cond((0, 1), 50, 0.3, 0.7));
        assert!(approx(p, 0.3375 * 1.4));
        // The early boost is capped by the final band.
        let early = model.estimate(BetType::DoubleChanceUnderdog, &cond((0, 1), 20, 0.3, 0.7));
        assert_eq!(early, 0.6);
    }

    #[test]
    fn test_underdog_double_chance_floor() {
        let model = ProbabilityModel::default();
        let p = model.estimate(BetType::DoubleChanceUnderdog, &cond((3, 0), 80, 0.7, 0.3));
        assert_eq!(p, 0.2);
    }

    #[test]
    fn test_over_15_match_rules() {
        let model = ProbabilityModel::default();
        assert_eq!(model.estimate(BetType::Over15Match, &cond((2, 0), 10, 0.5, 0.5)), 0.99);
        let one = model.estimate(BetType::Over15Match, &cond((0, 1), 60, 0.5, 0.5));
        assert!(approx(one, 0.75 - 0.5 * 0.4));
        let none = model.estimate(BetType::Over15Match, &MatchCondition::default());
        assert!(approx(none, 0.65));
    }

    #[test]
    fn test_unmodelled_markets_use_half() {
        let model = ProbabilityModel::default();
        assert_eq!(model.estimate(BetType::Draw, &MatchCondition::default()), 0.5);
        assert_eq!(model.estimate(BetType::Winner, &MatchCondition::default()), 0.65);
    }

    #[test]
    fn test_probability_curve_steps() {
        let model = ProbabilityModel::default();
        let curve = model.probability_curve(BetType::Under25, &cond((0, 0), 62, 0.5, 0.5));
        let minutes: Vec<u32> = curve.iter().map(|(m, _)| *m).collect();
        assert_eq!(minutes, vec![62, 67, 72, 77, 82, 87]);
        assert!(curve.windows(2).all(|w| w[1].1 <= w[0].1));
        assert!(model.probability_curve(BetType::Under25, &cond((0, 0), 95, 0.5, 0.5)).is_empty());
    }

    #[test]
    fn test_profit_margin_bands() {
        assert!(approx(profit_margin(2.0, 0.6), 0.1));
        assert!(approx(profit_margin(4.0, 0.35), 0.1 * 0.7));
        assert!(approx(profit_margin(1.25, 0.9), 0.1 * 0.5));
    }
}
