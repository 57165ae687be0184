//! Combination Phase - Two-leg Parlays (phase 2)
//!
//! Builds the combination portfolio on top of the confirmed anchors:
//! - Fixed catalog of three combinations
//! - Priority scoring against the odds frozen in phase 1
//! - Capital weights mixing priority, anchor exposure and odds
//! - Manual leg-odd overrides
//! - Strategy notes per combination

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::domain::error::{AdvisorError, AdvisorResult};
use crate::domain::market::{BetPortfolio, BetType, ComboBet, Phase, QuantumBet};
use crate::domain::money::{round_cents, split_cents};
use crate::usecases::anchors::validate_odd;

/// A combination the advisor can offer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComboTemplate {
  pub name: &'static str,
  pub legs: [BetType; 2],
  pub default_odds: [f64; 2],
  pub description: &'static str,
  /// Both legs are expected to carry anchor money.
  pub requires_allocation: bool,
}

/// The fixed combination catalog.
pub static CATALOG: [ComboTemplate; 3] = [
  ComboTemplate {
    name: "Underdog Double Chance + Over 1.5 Match",
    legs: [BetType::DoubleChanceUnderdog, BetType::Over15Match],
    default_odds: [2.30, 1.70],
    description: "Covers the underdog while expecting goals",
    requires_allocation: true,
  },
  ComboTemplate {
    name: "Defensive Combo",
    legs: [BetType::Under25, BetType::Winner],
    default_odds: [1.90, 1.50],
    description: "Guards against unexpected results",
    requires_allocation: false,
  },
  ComboTemplate {
    name: "Goals Combo",
    legs: [BetType::Over15FirstHalf, BetType::BothToScore],
    default_odds: [2.20, 1.80],
    description: "Targets a high-scoring match",
    requires_allocation: false,
  },
];

/// Look a template up by name (case-insensitive).
pub fn find_template(name: &str) -> AdvisorResult<&'static ComboTemplate> {
  let wanted = name.trim();
  CATALOG
    .iter()
    .find(|t| t.name.eq_ignore_ascii_case(wanted))
    .ok_or_else(|| AdvisorError::UnknownCombo(name.to_string()))
}

/// Priority band of a combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
  High,
  Medium,
  Low,
}

impl PriorityTier {
  pub fn from_score(score: f64) -> Self {
    if score > 0.7 {
      Self::High
    } else if score > 0.4 {
      Self::Medium
    } else {
      Self::Low
    }
  }
}

impl fmt::Display for PriorityTier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::High => write!(f, "HIGH PRIORITY"),
      Self::Medium => write!(f, "MEDIUM PRIORITY"),
      Self::Low => write!(f, "LOW PRIORITY"),
    }
  }
}

/// Persistent phase-2 state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComboState {
  /// Selected combination names, in selection order.
  #[serde(default)]
  pub selected: Vec<String>,
  /// Leg-odd overrides keyed by combination name.
  #[serde(default)]
  pub manual_odds: BTreeMap<String, [f64; 2]>,
  /// Amounts from the latest plan, aligned with `selected`.
  #[serde(default)]
  pub calculated_amounts: Vec<f64>,
}

/// A catalog entry priced against the current portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboOffer {
  pub name: String,
  pub legs: [BetType; 2],
  /// Leg odds from the anchor bets, falling back to the catalog.
  pub odds: [f64; 2],
  pub description: String,
  pub requires_allocation: bool,
}

impl ComboOffer {
  pub fn combined_odd(&self) -> f64 {
    self.odds[0] * self.odds[1]
  }
}

/// One selected combination with its sizing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboLine {
  pub offer: ComboOffer,
  /// Odds actually used (manual override or offer odds).
  pub odds: [f64; 2],
  pub combined_odd: f64,
  pub priority: f64,
  pub tier: PriorityTier,
  pub weight: f64,
  pub amount: f64,
  pub analysis: Vec<String>,
}

/// Phase-2 allocation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboPlan {
  pub phase_capital: f64,
  pub lines: Vec<ComboLine>,
}

/// Phase-2 use case.
#[derive(Debug, Clone)]
pub struct ComboPhase {
  combo_share: f64,
}

impl ComboPhase {
  pub fn new(combo_share: f64) -> Self {
    Self { combo_share }
  }

  /// Price the catalog against the anchor bets.
  pub fn offers(&self, portfolio: &BetPortfolio) -> Vec<ComboOffer> {
    CATALOG
      .iter()
      .map(|t| {
        let odd = |i: usize| {
          portfolio
            .initial_bets
            .get(&t.legs[i])
            .map_or(t.default_odds[i], |b| b.odd)
        };
        ComboOffer {
          name: t.name.to_string(),
          legs: t.legs,
          odds: [odd(0), odd(1)],
          description: t.description.to_string(),
          requires_allocation: t.requires_allocation,
        }
      })
      .collect()
  }

  /// Add a combination to the selection.
  ///
  /// # Errors
  /// `UnknownCombo` for names outside the catalog.
  pub fn select(&self, state: &mut ComboState, name: &str) -> AdvisorResult<()> {
    let template = find_template(name)?;
    if !state.selected.iter().any(|s| s == template.name) {
      state.selected.push(template.name.to_string());
      state.calculated_amounts.clear();
    }
    Ok(())
  }

  /// Override the leg odds of a combination.
  ///
  /// # Errors
  /// `UnknownCombo`, or `InvalidOdd` for a leg below 1.01.
  pub fn set_manual_odds(
    &self,
    state: &mut ComboState,
    name: &str,
    odds: [f64; 2],
  ) -> AdvisorResult<()> {
    let template = find_template(name)?;
    for (leg, odd) in template.legs.iter().zip(odds) {
      validate_odd(*leg, odd)?;
    }
    state.manual_odds.insert(template.name.to_string(), odds);
    Ok(())
  }

  /// Priority score in [0, 1], using the frozen anchor odds first.
  pub fn priority(&self, offer: &ComboOffer, fixed_odds: &BTreeMap<BetType, f64>) -> f64 {
    let odds: BTreeMap<BetType, f64> = offer
      .legs
      .iter()
      .zip(offer.odds)
      .map(|(bt, odd)| (*bt, fixed_odds.get(bt).copied().unwrap_or(odd)))
      .collect();

    let mut priority: f64 = 0.3;

    if let (Some(dc), Some(fav)) = (
      odds.get(&BetType::DoubleChanceUnderdog),
      odds.get(&BetType::Winner),
    ) {
      priority += if fav > dc { 0.4 } else { 0.2 };
    }
    if let Some(under) = odds.get(&BetType::Under25) {
      priority += if *under > 2.0 { 0.3 } else { 0.1 };
    }
    if let Some(over) = odds.get(&BetType::Over15FirstHalf) {
      if *over < 2.0 {
        priority += 0.25;
      }
    }

    priority.min(1.0)
  }

  /// Capital weights for the offers, summing to 1.
  ///
  /// 50% priority share, 30% anchor-exposure share, 20% inverse-odd share.
  pub fn weights(
    &self,
    offers: &[ComboOffer],
    portfolio: &BetPortfolio,
    fixed_odds: &BTreeMap<BetType, f64>,
  ) -> Vec<f64> {
    if offers.is_empty() {
      return Vec::new();
    }

    let priorities: Vec<f64> = offers.iter().map(|o| self.priority(o, fixed_odds)).collect();
    let invested: Vec<f64> = offers
      .iter()
      .map(|o| {
        let total: f64 = o
          .legs
          .iter()
          .filter_map(|bt| portfolio.initial_bets.get(bt))
          .map(|b| b.amount)
          .sum();
        if total > 0.0 { total } else { 0.1 }
      })
      .collect();
    let odd_factors: Vec<f64> = offers
      .iter()
      .map(|o| {
        let o1 = fixed_odds.get(&o.legs[0]).copied().unwrap_or(o.odds[0]);
        let o2 = fixed_odds.get(&o.legs[1]).copied().unwrap_or(o.odds[1]);
        1.0 / (o1 * o2)
      })
      .collect();

    let share = |v: f64, all: &[f64]| {
      let total: f64 = all.iter().sum();
      if total > 0.0 { v / total } else { 0.0 }
    };

    let raw: Vec<f64> = (0..offers.len())
      .map(|i| {
        0.2f64.mul_add(
          share(odd_factors[i], &odd_factors),
          0.5f64.mul_add(
            share(priorities[i], &priorities),
            0.3 * share(invested[i], &invested),
          ),
        )
      })
      .collect();

    let total: f64 = raw.iter().sum();
    if total > 0.0 {
      raw.iter().map(|w| w / total).collect()
    } else {
      vec![1.0 / offers.len() as f64; offers.len()]
    }
  }

  /// Capital available to phase 2.
  ///
  /// # Errors
  /// `InsufficientCapital` when the anchors consumed everything.
  pub fn phase_capital(&self, portfolio: &BetPortfolio) -> AdvisorResult<f64> {
    let available = (portfolio.capital * self.combo_share)
      .min(portfolio.capital - portfolio.initial_invested());
    if available <= 0.0 {
      return Err(AdvisorError::InsufficientCapital {
        phase: Phase::MultiBets,
        available: round_cents(available),
      });
    }
    Ok(round_cents(available))
  }

  /// Strategy notes for one combination.
  pub fn analysis(
    &self,
    offer: &ComboOffer,
    priority: f64,
    fixed_odds: &BTreeMap<BetType, f64>,
  ) -> Vec<String> {
    let mut notes = Vec::new();
    let has = |bt: BetType| offer.legs.contains(&bt);

    if has(BetType::DoubleChanceUnderdog) && has(BetType::Winner) {
      if let (Some(dc), Some(fav)) = (
        fixed_odds.get(&BetType::DoubleChanceUnderdog),
        fixed_odds.get(&BetType::Winner),
      ) {
        if fav > dc {
          notes.push("Priority: FAVOURITE (higher odd)".to_string());
          notes.push(format!("Difference: +{:.2}", fav - dc));
        } else {
          notes.push("Priority: DOUBLE CHANCE".to_string());
        }
      }
    }

    if has(BetType::Under25) {
      if let Some(under) = fixed_odds.get(&BetType::Under25) {
        notes.push(format!("Under 2.5: {under:.2} (secondary weight)"));
      }
    }

    notes.push(PriorityTier::from_score(priority).to_string());
    notes
  }

  /// Size the current selection.
  ///
  /// # Errors
  /// `NothingSelected`, `UnknownCombo` or `InsufficientCapital`.
  pub fn plan(
    &self,
    state: &ComboState,
    portfolio: &BetPortfolio,
    fixed_odds: &BTreeMap<BetType, f64>,
  ) -> AdvisorResult<ComboPlan> {
    if state.selected.is_empty() {
      return Err(AdvisorError::NothingSelected);
    }

    let all = self.offers(portfolio);
    let offers = state
      .selected
      .iter()
      .map(|name| {
        all
          .iter()
          .find(|o| o.name.eq_ignore_ascii_case(name))
          .cloned()
          .ok_or_else(|| AdvisorError::UnknownCombo(name.clone()))
      })
      .collect::<AdvisorResult<Vec<_>>>()?;

    let phase_capital = self.phase_capital(portfolio)?;
    let weights = self.weights(&offers, portfolio, fixed_odds);
    let amounts = split_cents(phase_capital, &weights);

    let lines = offers
      .into_iter()
      .zip(weights.into_iter().zip(amounts))
      .map(|(offer, (weight, amount))| {
        let priority = self.priority(&offer, fixed_odds);
        let odds = state.manual_odds.get(&offer.name).copied().unwrap_or(offer.odds);
        let mut analysis = self.analysis(&offer, priority, fixed_odds);
        if offer.requires_allocation && anchor_exposure(&offer, portfolio) <= 0.0 {
          analysis.push("Legs carry no anchor allocation".to_string());
        }
        ComboLine {
          combined_odd: odds[0] * odds[1],
          tier: PriorityTier::from_score(priority),
          odds,
          priority,
          weight,
          amount,
          analysis,
          offer,
        }
      })
      .collect();

    Ok(ComboPlan {
      phase_capital,
      lines,
    })
  }

  /// Store the selected combinations in the portfolio.
  ///
  /// # Errors
  /// Same as [`ComboPhase::plan`].
  #[instrument(skip_all, fields(selected = state.selected.len()))]
  pub fn confirm(
    &self,
    state: &mut ComboState,
    portfolio: &mut BetPortfolio,
    fixed_odds: &BTreeMap<BetType, f64>,
  ) -> AdvisorResult<ComboPlan> {
    let plan = self.plan(state, portfolio, fixed_odds)?;

    fill_mandatory_legs(portfolio);
    state.calculated_amounts = plan.lines.iter().map(|l| l.amount).collect();
    portfolio.multi_bets = plan
      .lines
      .iter()
      .map(|l| ComboBet {
        name: l.offer.name.clone(),
        legs: l.offer.legs.to_vec(),
        odds: l.odds.to_vec(),
        amount: l.amount,
      })
      .collect();

    debug!(amounts = ?state.calculated_amounts, "Combination amounts");
    info!(
      combos = portfolio.multi_bets.len(),
      invested = portfolio.multi_invested(),
      "Combination bets confirmed"
    );

    Ok(plan)
  }
}

fn anchor_exposure(offer: &ComboOffer, portfolio: &BetPortfolio) -> f64 {
  offer
    .legs
    .iter()
    .filter_map(|bt| portfolio.initial_bets.get(bt))
    .map(|b| b.amount)
    .sum()
}

/// Record zero-amount placeholders for mandatory anchors that were never bet.
pub fn fill_mandatory_legs(portfolio: &mut BetPortfolio) {
  for (market, odd) in [
    (BetType::DoubleChanceUnderdog, 2.30),
    (BetType::Over15Match, 1.70),
  ] {
    portfolio
      .initial_bets
      .entry(market)
      .or_insert_with(|| QuantumBet::new(market, 0.0, odd, 0.0));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn portfolio_with(bets: &[(BetType, f64, f64)]) -> BetPortfolio {
    let mut portfolio = BetPortfolio::new(100.0);
    for (bt, amount, odd) in bets {
      portfolio
        .initial_bets
        .insert(*bt, QuantumBet::new(*bt, *amount, *odd, 0.5));
    }
    portfolio
  }

  fn fixed(portfolio: &BetPortfolio) -> BTreeMap<BetType, f64> {
    portfolio.initial_bets.iter().map(|(bt, b)| (*bt, b.odd)).collect()
  }

  #[test]
  fn test_offers_fall_back_to_catalog_odds() {
    let phase = ComboPhase::new(0.31);
    let portfolio = portfolio_with(&[(BetType::Under25, 20.0, 2.4)]);
    let offers = phase.offers(&portfolio);
    assert_eq!(offers.len(), 3);
    assert_eq!(offers[1].odds, [2.4, 1.50]);
    assert_eq!(offers[2].odds, [2.20, 1.80]);
  }

  #[test]
  fn test_priority_rules() {
    let phase = ComboPhase::new(0.31);
    let portfolio = portfolio_with(&[
      (BetType::Under25, 20.0, 2.4),
      (BetType::Over15FirstHalf, 10.0, 1.9),
    ]);
    let offers = phase.offers(&portfolio);
    let fixed = fixed(&portfolio);
    // Defensive: 0.3 + 0.3 (under > 2.0)
    assert!((phase.priority(&offers[1], &fixed) - 0.6).abs() < 1e-12);
    // Goals: 0.3 + 0.25 (first-half over < 2.0)
    assert!((phase.priority(&offers[2], &fixed) - 0.55).abs() < 1e-12);
    // Underdog double chance: base only
    assert!((phase.priority(&offers[0], &fixed) - 0.3).abs() < 1e-12);
  }

  #[test]
  fn test_favourite_vs_double_chance_priority() {
    let phase = ComboPhase::new(0.31);
    let offer = ComboOffer {
      name: "custom".into(),
      legs: [BetType::DoubleChanceUnderdog, BetType::Winner],
      odds: [1.8, 2.2],
      description: String::new(),
      requires_allocation: false,
    };
    assert!((phase.priority(&offer, &BTreeMap::new()) - 0.7).abs() < 1e-12);
    let fixed = BTreeMap::from([(BetType::Winner, 1.5)]);
    assert!((phase.priority(&offer, &fixed) - 0.5).abs() < 1e-12);
    let notes = phase.analysis(
      &offer,
      0.7,
      &BTreeMap::from([(BetType::Winner, 2.2), (BetType::DoubleChanceUnderdog, 1.8)]),
    );
    assert_eq!(notes[0], "Priority: FAVOURITE (higher odd)");
    assert_eq!(notes[1], "Difference: +0.40");
    assert_eq!(notes[2], "MEDIUM PRIORITY");
  }

  #[test]
  fn test_tiers() {
    assert_eq!(PriorityTier::from_score(0.75), PriorityTier::High);
    assert_eq!(PriorityTier::from_score(0.7), PriorityTier::Medium);
    assert_eq!(PriorityTier::from_score(0.4), PriorityTier::Low);
  }

  #[test]
  fn test_weights_sum_to_one() {
    let phase = ComboPhase::new(0.31);
    let portfolio = portfolio_with(&[
      (BetType::Under25, 20.0, 1.85),
      (BetType::Over15Match, 15.0, 1.70),
    ]);
    let offers = phase.offers(&portfolio);
    let weights = phase.weights(&offers, &portfolio, &fixed(&portfolio));
    assert_eq!(weights.len(), 3);
    assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    assert!(weights.iter().all(|w| *w > 0.0));
  }

  #[test]
  fn test_phase_capital_bounds() {
    let phase = ComboPhase::new(0.31);
    let portfolio = portfolio_with(&[(BetType::Under25, 60.0, 1.85)]);
    assert_eq!(phase.phase_capital(&portfolio).unwrap(), 31.0);

    let heavy = portfolio_with(&[(BetType::Under25, 80.0, 1.85)]);
    assert_eq!(phase.phase_capital(&heavy).unwrap(), 20.0);

    let spent = portfolio_with(&[(BetType::Under25, 100.0, 1.85)]);
    assert!(matches!(
      phase.phase_capital(&spent),
      Err(AdvisorError::InsufficientCapital { .. })
    ));
  }

  #[test]
  fn test_plan_amounts_sum_to_phase_capital() {
    let phase = ComboPhase::new(0.31);
    let portfolio = portfolio_with(&[(BetType::Under25, 60.0, 1.85)]);
    let mut state = ComboState::default();
    for t in &CATALOG {
      phase.select(&mut state, t.name).unwrap();
    }
    let plan = phase.plan(&state, &portfolio, &fixed(&portfolio)).unwrap();
    let total: f64 = plan.lines.iter().map(|l| l.amount).sum();
    assert!((total - 31.0).abs() < 1e-9);
  }

  #[test]
  fn test_manual_odds_override_combined_odd() {
    let phase = ComboPhase::new(0.31);
    let portfolio = portfolio_with(&[(BetType::Under25, 60.0, 1.85)]);
    let mut state = ComboState::default();
    phase.select(&mut state, "goals combo").unwrap();
    phase.set_manual_odds(&mut state, "Goals Combo", [2.0, 2.0]).unwrap();
    assert!(phase.set_manual_odds(&mut state, "Goals Combo", [1.0, 2.0]).is_err());
    assert!(phase.set_manual_odds(&mut state, "Nope", [2.0, 2.0]).is_err());

    let plan = phase.plan(&state, &portfolio, &fixed(&portfolio)).unwrap();
    assert_eq!(plan.lines[0].combined_odd, 4.0);
    assert_eq!(plan.lines[0].amount, 31.0);
  }

  #[test]
  fn test_confirm_requires_selection() {
    let phase = ComboPhase::new(0.31);
    let mut portfolio = portfolio_with(&[(BetType::Under25, 60.0, 1.85)]);
    let mut state = ComboState::default();
    let fixed = fixed(&portfolio);
    assert_eq!(
      phase.confirm(&mut state, &mut portfolio, &fixed),
      Err(AdvisorError::NothingSelected)
    );

    phase.select(&mut state, "Defensive Combo").unwrap();
    phase.confirm(&mut state, &mut portfolio, &fixed).unwrap();
    assert_eq!(portfolio.multi_bets.len(), 1);
    assert_eq!(portfolio.multi_bets[0].legs, vec![BetType::Under25, BetType::Winner]);
    assert_eq!(portfolio.initial_bets[&BetType::DoubleChanceUnderdog].amount, 0.0);
    assert_eq!(state.calculated_amounts, vec![31.0]);
  }
}
