//! Anchor Phase - Pre-match Allocation (phase 1)
//!
//! Turns the user's pre-match odds into the anchor portfolio:
//! - Editable odds for the six anchor markets
//! - Optimizer run at kickoff with the anchor bias profile
//! - Per-bet amount, probability, EV and profit margin
//! - Mandatory market check (warn or force a minimum stake)
//! - Low-capital mode collapsing to a single Under 2.5 bet

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::AllocationConfig;
use crate::domain::error::{AdvisorError, AdvisorResult};
use crate::domain::market::{
  BetPortfolio, BetType, HumanBiasProfile, MatchCondition, QuantumBet, QuantumState,
};
use crate::domain::money::{round_cents, split_cents};
use crate::domain::optimizer::PortfolioOptimizer;
use crate::domain::probability::profit_margin;

/// Markets offered in phase 1, in display order.
pub const ANCHOR_MARKETS: [BetType; 6] = [
  BetType::Under25,
  BetType::Over15FirstHalf,
  BetType::BothToScore,
  BetType::Winner,
  BetType::DoubleChanceUnderdog,
  BetType::Over15Match,
];

/// Markets every anchor portfolio is expected to hold.
pub const MANDATORY_MARKETS: [BetType; 2] = [BetType::DoubleChanceUnderdog, BetType::Over15Match];

/// Lowest odd accepted from the user.
pub const MIN_ODD: f64 = 1.01;

/// Starting odds: 1.85 stepping by 0.10, with the two mandatory markets pinned.
pub fn default_anchor_odds() -> BTreeMap<BetType, f64> {
  let mut odds: BTreeMap<BetType, f64> = ANCHOR_MARKETS
    .iter()
    .enumerate()
    .map(|(i, bt)| (*bt, round_cents(0.1f64.mul_add(i as f64, 1.85))))
    .collect();
  odds.insert(BetType::DoubleChanceUnderdog, 2.30);
  odds.insert(BetType::Over15Match, 1.70);
  odds
}

/// Validate a user-supplied odd.
pub fn validate_odd(market: BetType, odd: f64) -> AdvisorResult<f64> {
  if odd.is_finite() && odd >= MIN_ODD {
    Ok(odd)
  } else {
    Err(AdvisorError::InvalidOdd { market, odd })
  }
}

/// Persistent phase-1 state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorState {
  /// Current odds per anchor market.
  pub odds: BTreeMap<BetType, f64>,
  /// Latest optimizer output (percentages summing to 1).
  #[serde(default)]
  pub allocations: BTreeMap<BetType, f64>,
  /// Odds frozen at confirmation; phase 2 prioritises on these.
  pub initial_odds_fixed: BTreeMap<BetType, f64>,
}

impl Default for AnchorState {
  fn default() -> Self {
    let odds = default_anchor_odds();
    Self {
      initial_odds_fixed: odds.clone(),
      odds,
      allocations: BTreeMap::new(),
    }
  }
}

/// One row of the anchor report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorLine {
  pub bet: QuantumBet,
  /// Share of phase capital (0 for forced mandatory bets).
  pub share: f64,
  pub potential_profit: f64,
  pub profit_margin: f64,
  /// Added by the mandatory-market rule rather than the optimizer.
  pub forced: bool,
}

/// Phase-1 allocation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorPlan {
  pub phase_capital: f64,
  pub low_capital: bool,
  pub lines: Vec<AnchorLine>,
  pub warnings: Vec<String>,
}

impl AnchorPlan {
  pub fn total(&self) -> f64 {
    self.lines.iter().map(|l| l.bet.amount).sum()
  }
}

/// Phase-1 use case.
#[derive(Debug, Clone)]
pub struct AnchorPhase {
  optimizer: PortfolioOptimizer,
  anchor_share: f64,
  low_capital_threshold: f64,
  low_capital_stake: f64,
  mandatory_share: f64,
}

impl AnchorPhase {
  pub fn new(optimizer: PortfolioOptimizer, config: &AllocationConfig) -> Self {
    Self {
      optimizer,
      anchor_share: config.anchor_share,
      low_capital_threshold: config.low_capital_threshold,
      low_capital_stake: config.low_capital_stake,
      mandatory_share: config.mandatory_share,
    }
  }

  /// Whether `capital` triggers the single-bet mode.
  pub fn is_low_capital(&self, capital: f64) -> bool {
    capital < self.low_capital_threshold
  }

  /// Overwrite one anchor odd. Clears any stale allocation.
  ///
  /// # Errors
  /// `UnknownMarket` outside the anchor set, `InvalidOdd` below 1.01.
  pub fn set_odd(&self, state: &mut AnchorState, market: BetType, odd: f64) -> AdvisorResult<()> {
    if !ANCHOR_MARKETS.contains(&market) {
      return Err(AdvisorError::UnknownMarket(market.to_string()));
    }
    let odd = validate_odd(market, odd)?;
    state.odds.insert(market, odd);
    state.allocations.clear();
    Ok(())
  }

  /// Kickoff snapshot the anchors are priced against.
  pub fn kickoff_condition() -> MatchCondition {
    MatchCondition::default().with_context("high_stakes")
  }

  /// Behavioural profile used for the anchor run.
  pub fn anchor_bias() -> HumanBiasProfile {
    HumanBiasProfile::with_market_weights([(BetType::Under25, 1.18), (BetType::Winner, 1.15)])
  }

  /// Run the optimizer on the current odds and store the allocation.
  #[instrument(skip(self, state))]
  pub fn optimize(&self, state: &mut AnchorState) -> BTreeMap<BetType, f64> {
    let bias = Self::anchor_bias();
    let allocations = self.optimizer.optimize(
      &state.odds,
      &Self::kickoff_condition(),
      QuantumState::Stable,
      Some(&bias),
    );

    info!(
      markets = allocations.len(),
      "Anchor portfolio optimized"
    );

    state.allocations = allocations.clone();
    allocations
  }

  /// Build the report for the current state.
  ///
  /// # Errors
  /// `NoAllocation` in standard mode before `optimize` has run.
  pub fn plan(
    &self,
    state: &AnchorState,
    capital: f64,
    force_mandatory: bool,
  ) -> AdvisorResult<AnchorPlan> {
    if self.is_low_capital(capital) {
      return Ok(self.low_capital_plan(state, capital));
    }
    if state.allocations.is_empty() {
      return Err(AdvisorError::NoAllocation);
    }

    let phase_capital = round_cents(capital * self.anchor_share);
    let model = self.optimizer.model();
    let at_kickoff = MatchCondition::default();

    let markets: Vec<BetType> = state.allocations.keys().copied().collect();
    let shares: Vec<f64> = state.allocations.values().copied().collect();
    let amounts = split_cents(phase_capital, &shares);

    let mut lines: Vec<AnchorLine> = markets
      .iter()
      .zip(shares.iter().zip(amounts))
      .map(|(bt, (share, amount))| {
        let odd = state.odds.get(bt).copied().unwrap_or(MIN_ODD);
        let prob = model.estimate(*bt, &at_kickoff);
        line(QuantumBet::new(*bt, amount, odd, prob), *share, false)
      })
      .collect();

    let mut warnings = Vec::new();
    for market in MANDATORY_MARKETS {
      let funded = lines
        .iter()
        .any(|l| l.bet.bet_type == market && l.bet.amount > 0.0);
      if funded {
        continue;
      }
      warnings.push(format!("{} was not allocated", market.label()));
      if force_mandatory {
        let odd = state.odds.get(&market).copied().unwrap_or(MIN_ODD);
        let prob = model.estimate(market, &at_kickoff);
        let amount = round_cents(phase_capital * self.mandatory_share);
        lines.retain(|l| l.bet.bet_type != market);
        lines.push(line(QuantumBet::new(market, amount, odd, prob), 0.0, true));
      }
    }

    Ok(AnchorPlan {
      phase_capital,
      low_capital: false,
      lines,
      warnings,
    })
  }

  fn low_capital_plan(&self, state: &AnchorState, capital: f64) -> AnchorPlan {
    let market = BetType::Under25;
    let odd = state.odds.get(&market).copied().unwrap_or(MIN_ODD);
    let amount = round_cents(self.low_capital_stake.min(capital * 0.8));
    let prob = self
      .optimizer
      .model()
      .estimate(market, &MatchCondition::default());

    AnchorPlan {
      phase_capital: amount,
      low_capital: true,
      lines: vec![line(QuantumBet::new(market, amount, odd, prob), 1.0, false)],
      warnings: vec![format!(
        "Low-capital mode: single {} bet",
        market.label()
      )],
    }
  }

  /// Commit the plan to the portfolio and freeze the odds.
  ///
  /// # Errors
  /// Same as [`AnchorPhase::plan`].
  #[instrument(skip(self, state, portfolio), fields(capital = portfolio.capital))]
  pub fn confirm(
    &self,
    state: &mut AnchorState,
    portfolio: &mut BetPortfolio,
    force_mandatory: bool,
  ) -> AdvisorResult<AnchorPlan> {
    let plan = self.plan(state, portfolio.capital, force_mandatory)?;

    for warning in &plan.warnings {
      warn!(%warning, "Anchor confirmation warning");
    }

    portfolio.initial_bets = plan
      .lines
      .iter()
      .map(|l| (l.bet.bet_type, l.bet.clone()))
      .collect();
    state.initial_odds_fixed = portfolio
      .initial_bets
      .iter()
      .map(|(bt, bet)| (*bt, bet.odd))
      .collect();

    info!(
      bets = portfolio.initial_bets.len(),
      invested = portfolio.initial_invested(),
      low_capital = plan.low_capital,
      "Anchor bets confirmed"
    );

    Ok(plan)
  }
}

fn line(bet: QuantumBet, share: f64, forced: bool) -> AnchorLine {
  AnchorLine {
    potential_profit: round_cents(bet.potential_profit()),
    profit_margin: profit_margin(bet.odd, bet.probability),
    bet,
    share,
    forced,
  }
}
