//! Live Engine - In-play Scenario Rules (phase 3)
//!
//! Reads the live match snapshot and proposes adjustments:
//! - Capital budget that grows in the last quarter of the match
//! - Ten independent scenario rules (comeback, safety hedge, red card, ...)
//! - Per-recommendation stake, live odd, EV and protection/attack split
//! - Hedge, strategy and Kelly advice
//! - Apply gate on EV and stake before a bet is recorded

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::{AllocationConfig, LiveConfig};
use crate::domain::error::{AdvisorError, AdvisorResult};
use crate::domain::kelly::KellySizer;
use crate::domain::market::{
  BetPortfolio, BetType, MatchCondition, QuantumBet, QuantumState, Score, Side,
};
use crate::domain::money::{round_cents, split_cents};
use crate::domain::probability::ProbabilityModel;

/// Slack for amounts already rounded to cents.
const CENT_TOLERANCE: f64 = 0.005;

/// Earliest minute at which a red card can be recorded.
pub const RED_CARD_MIN_MINUTE: u32 = 30;

/// Urgency label attached by a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Critical,
  High,
  Medium,
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Critical => write!(f, "critical"),
      Self::High => write!(f, "high"),
      Self::Medium => write!(f, "medium"),
    }
  }
}

/// A recorded red card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedCard {
  pub side: Side,
  pub minute: u32,
}

/// One user observation of the match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveInput {
  pub score: Score,
  pub minute: u32,
  /// Suggested from score and minute when absent.
  pub home_pressure: Option<f64>,
  /// Suggested from score and minute when absent.
  pub away_pressure: Option<f64>,
  pub volatility: QuantumState,
}

/// Raw output of a scenario rule, before sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
  pub bet_type: BetType,
  pub name: String,
  pub reason: String,
  pub weight: f64,
  pub min_odd: f64,
  #[serde(default)]
  pub priority: Option<Priority>,
}

impl Scenario {
  fn new(
    bet_type: BetType,
    name: impl Into<String>,
    reason: impl Into<String>,
    weight: f64,
    min_odd: f64,
  ) -> Self {
    Self {
      bet_type,
      name: name.into(),
      reason: reason.into(),
      weight,
      min_odd,
      priority: None,
    }
  }

  fn with_priority(mut self, priority: Priority) -> Self {
    self.priority = Some(priority);
    self
  }
}

/// Suggested hedge against an anchor position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeAdvice {
  pub market: BetType,
  /// Share of the anchor stake to hedge, in [0.3, 0.7].
  pub ratio: f64,
  pub amount: f64,
  pub probability: f64,
  pub reference_odd: f64,
}

/// 70/30 protection/attack companion for protective markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionSplit {
  pub protection_weight: f64,
  pub attack_market: BetType,
  pub attack_weight: f64,
  pub attack_probability: f64,
  pub attack_min_odd: f64,
}

/// A sized, priced in-play recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
  pub scenario: Scenario,
  pub odd: f64,
  pub probability: f64,
  pub proportion: f64,
  pub stake: f64,
  /// Expected value in percent.
  pub ev_pct: f64,
  pub protection_ratio: f64,
  pub attack_ratio: f64,
  pub protection_stake: f64,
  pub attack_stake: f64,
  pub strategy: String,
  pub hedge: Option<HedgeAdvice>,
  pub kelly_stake: f64,
  pub split: Option<ProtectionSplit>,
}

impl Recommendation {
  /// Why this recommendation cannot be applied, if it cannot.
  pub fn rejection(&self, ev_threshold: f64) -> Option<String> {
    if self.stake <= 0.0 {
      Some("stake must be above 0.00".to_string())
    } else if self.ev_pct < ev_threshold {
      Some(format!(
        "EV {:.1}% below the {:.1}% threshold",
        self.ev_pct, ev_threshold
      ))
    } else {
      None
    }
  }
}

/// Persistent phase-3 state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveState {
  pub score: Score,
  pub minute: u32,
  pub home_pressure: f64,
  pub away_pressure: f64,
  pub volatility: QuantumState,
  /// Volatility seen at the previous evaluation.
  #[serde(default)]
  pub last_volatility: Option<QuantumState>,
  #[serde(default)]
  pub red_card: Option<RedCard>,
  /// Output of the latest evaluation, addressable by `apply`.
  #[serde(default)]
  pub recommendations: Vec<Recommendation>,
}

impl Default for LiveState {
  fn default() -> Self {
    Self {
      score: Score::default(),
      minute: 0,
      home_pressure: 0.5,
      away_pressure: 0.5,
      volatility: QuantumState::Stable,
      last_volatility: None,
      red_card: None,
      recommendations: Vec::new(),
    }
  }
}

impl LiveState {
  /// Match snapshot for the stored observation.
  ///
  /// # Errors
  /// Propagates snapshot validation.
  pub fn condition(&self) -> AdvisorResult<MatchCondition> {
    MatchCondition::new(self.score, self.minute, self.home_pressure, self.away_pressure)
  }
}

/// Phase-3 use case.
#[derive(Debug, Clone)]
pub struct LiveEngine {
  model: ProbabilityModel,
  kelly: KellySizer,
  combo_share: f64,
  live_share: f64,
  live_cap_share: f64,
  apply_ev_threshold: f64,
}

impl LiveEngine {
  pub fn new(
    model: ProbabilityModel,
    kelly: KellySizer,
    allocation: &AllocationConfig,
    live: &LiveConfig,
  ) -> Self {
    Self {
      model,
      kelly,
      combo_share: allocation.combo_share,
      live_share: allocation.live_share,
      live_cap_share: allocation.live_cap_share,
      apply_ev_threshold: live.apply_ev_threshold,
    }
  }

  pub fn apply_threshold(&self) -> f64 {
    self.apply_ev_threshold
  }

  pub fn live_cap_share(&self) -> f64 {
    self.live_cap_share
  }

  /// Ceiling on the sum of in-play stakes for `capital`.
  pub fn live_cap(&self, capital: f64) -> f64 {
    (capital * self.live_cap_share).max(0.0)
  }

  /// Capital available for in-play bets at `minute`.
  ///
  /// Never above what is left of the live cap once applied in-play
  /// stakes are counted.
  pub fn phase_capital(&self, portfolio: &BetPortfolio, minute: u32) -> f64 {
    let capital = portfolio.capital;
    let combo_reserved = if portfolio.multi_bets.is_empty() {
      0.0
    } else {
      capital * self.combo_share
    };
    let invested = portfolio.initial_invested() + combo_reserved;
    let cap = capital * self.live_cap_share;

    let mut budget = (capital * self.live_share).min(capital - invested);
    let minute_factor = (f64::from(minute) / 90.0).min(1.0);
    if minute_factor > 0.75 {
      let boost = (minute_factor - 0.75).mul_add(2.0, 1.0);
      budget = (budget * boost).min(cap);
    }

    let headroom = (cap - portfolio.in_play_invested()).max(0.0);
    round_cents(budget.clamp(0.0, headroom))
  }

  /// Pressure values suggested by the score and the clock.
  pub fn suggested_pressure(score: Score, minute: u32) -> (f64, f64) {
    let diff = score.diff() as f64;
    let minute_factor = (f64::from(minute) / 90.0).min(1.0);
    let home = 0.1f64.mul_add(diff, 0.5) + 0.3 * minute_factor;
    let away = 0.1f64.mul_add(-diff, 0.5) + 0.3 * minute_factor;
    (home.clamp(0.0, 1.0), away.clamp(0.0, 1.0))
  }

  /// Store a new observation.
  ///
  /// # Errors
  /// `InvalidMinute` or `InvalidPressure`; the state is untouched on error.
  pub fn observe(&self, state: &mut LiveState, input: LiveInput) -> AdvisorResult<MatchCondition> {
    let (suggested_home, suggested_away) = Self::suggested_pressure(input.score, input.minute);
    let condition = MatchCondition::new(
      input.score,
      input.minute,
      input.home_pressure.unwrap_or(suggested_home),
      input.away_pressure.unwrap_or(suggested_away),
    )?;

    state.score = condition.score;
    state.minute = condition.minute;
    state.home_pressure = condition.home_pressure;
    state.away_pressure = condition.away_pressure;
    state.volatility = input.volatility;
    Ok(condition)
  }

  /// Record a red card. Only the first one counts.
  ///
  /// Returns `false` when a card was already recorded.
  ///
  /// # Errors
  /// `RedCardTooEarly` at or before minute 30.
  pub fn record_red_card(state: &mut LiveState, side: Side) -> AdvisorResult<bool> {
    if state.minute <= RED_CARD_MIN_MINUTE {
      return Err(AdvisorError::RedCardTooEarly(state.minute));
    }
    if state.red_card.is_some() {
      return Ok(false);
    }
    state.red_card = Some(RedCard {
      side,
      minute: state.minute,
    });
    info!(%side, minute = state.minute, "Red card recorded");
    Ok(true)
  }

  /// Run every scenario rule against the snapshot.
  ///
  /// Records the volatility for the next evaluation.
  pub fn scenarios(
    &self,
    state: &mut LiveState,
    condition: &MatchCondition,
    portfolio: &BetPortfolio,
  ) -> Vec<Scenario> {
    let mut out = Vec::new();
    let (h, a) = (condition.score.home, condition.score.away);
    let total = h + a;
    let minute = condition.minute;
    let (hp, ap) = (condition.home_pressure, condition.away_pressure);
    let volatility = state.volatility;

    // 1. Comeback
    let losing_side_storming = (h < a && hp > 0.75) || (a < h && ap > 0.75);
    if losing_side_storming && (60..=75).contains(&minute) {
      let home_favoured = hp > ap;
      let main = if home_favoured { BetType::HomeWin } else { BetType::AwayWin };
      let side = if home_favoured { "Home" } else { "Away" };
      let p_main = self.model.estimate(main, condition);
      let p_draw = self.model.estimate(BetType::Draw, condition);
      out.push(
        Scenario::new(
          main,
          format!("Comeback - {side} (70%)"),
          format!("Favourite pressing for the turnaround (prob {:.1}%)", p_main * 100.0),
          0.7 * 1.5,
          2.50,
        )
        .with_priority(Priority::High),
      );
      out.push(
        Scenario::new(
          BetType::Draw,
          "Draw protection (30%)",
          format!("Cover against a draw (prob {:.1}%)", p_draw * 100.0),
          0.3 * 1.5,
          3.50,
        )
        .with_priority(Priority::Medium),
      );
    }

    // 2. Safety hedge on nearly-won multi bets
    if minute >= 80 && total <= 2 {
      for combo in portfolio.multi_bets.iter().filter(|c| c.legs.len() >= 3) {
        let pending: Vec<BetType> = combo
          .legs
          .iter()
          .copied()
          .filter(|leg| !is_bet_won(*leg, condition.score))
          .collect();
        let [remaining] = pending.as_slice() else {
          continue;
        };
        if let Some(hedge) = hedge_market(*remaining) {
          out.push(
            Scenario::new(
              hedge,
              format!("Safety hedge for {}", combo.name),
              format!(
                "Multi bet one market away from winning. Lock the profit on the opposite: {hedge}."
              ),
              1.3,
              1.80,
            )
            .with_priority(Priority::Critical),
          );
        }
      }
    }

    // 3. Red card
    if let Some(card) = state.red_card {
      if condition.score.diff().abs() <= 1 {
        match card.side {
          Side::Home => out.push(
            Scenario::new(
              BetType::Under25,
              "Red card effect - fewer goals (home down to ten)",
              "Home side sent off. Expect a tighter match.",
              1.4,
              1.60,
            )
            .with_priority(Priority::High),
          ),
          Side::Away => out.push(
            Scenario::new(
              BetType::AwayHandicap,
              "Red card effect - away handicap",
              "Away side sent off. The favourite should extend the lead.",
              1.2,
              1.80,
            )
            .with_priority(Priority::Medium),
          ),
        }
      }
    }

    // 4. Quiet half-time
    if total == 1 && (40..=50).contains(&minute) && volatility == QuantumState::Stable {
      out.push(Scenario::new(
        BetType::Under25,
        "Under 2.5 Goals (match)",
        "Stable market and a single first-half goal. The defensive trend should hold.",
        1.1,
        1.50,
      ));
    }

    // 5. Favourite early storm
    if hp > 0.70 && minute <= 25 && volatility == QuantumState::Chaotic {
      out.push(Scenario::new(
        BetType::BothToScoreNo,
        "Both Teams to Score - No",
        format!(
          "Heavy favourite pressure ({:.0}%) in a volatile market. Covers a one-sided goal.",
          hp * 100.0
        ),
        0.9,
        1.60,
      ));
    }

    // 6. Underdog early storm
    if ap > 0.70 && minute <= 25 && volatility == QuantumState::Chaotic {
      out.push(Scenario::new(
        BetType::NextGoalAway,
        "Next Goal - Away (underdog)",
        format!(
          "Surprising underdog pressure ({:.0}%). Value on the next goal.",
          ap * 100.0
        ),
        0.8,
        2.00,
      ));
    }

    // 7. Level at the break
    if h == 1
      && a == 1
      && (40..=50).contains(&minute)
      && matches!(volatility, QuantumState::Stable | QuantumState::Transition)
    {
      out.push(Scenario::new(
        BetType::Draw,
        "Full Time Result - Draw",
        "Balanced draw at the break. The result holding is a real chance.",
        0.7,
        3.50,
      ));
    }

    // 8. Losing side pressing
    if (h < a && hp > 0.6) || (a < h && ap > 0.6) {
      let (side, pressure) = if h < a { ("Home", hp) } else { ("Away", ap) };
      out.push(Scenario::new(
        BetType::NextGoalLosingTeam,
        format!("Next Goal - {side} (losing side)"),
        format!(
          "Losing side ({side}) pressing hard ({:.0}%). Good counter-attack spot.",
          pressure * 100.0
        ),
        0.9,
        2.20,
      ));
    }

    // 9. Volatility jump
    if state.last_volatility == Some(QuantumState::Stable)
      && volatility == QuantumState::Chaotic
      && minute > 1
    {
      out.push(Scenario::new(
        BetType::GoalNext5Min,
        "Goal in the next 5 minutes",
        "Sudden switch to a chaotic market. A goal is likely soon.",
        1.4,
        2.50,
      ));
    }
    state.last_volatility = Some(volatility);

    // 10. Dead game
    if total <= 1 && minute >= 60 && hp < 0.4 && ap < 0.4 {
      out.push(Scenario::new(
        BetType::NoMoreGoals,
        "No more goals in the match",
        "Low-intensity match with few chances in the last 15 minutes.",
        1.2,
        2.00,
      ));
    }

    debug!(count = out.len(), minute, %volatility, "Scenario rules evaluated");
    out
  }

  /// Evaluate the stored observation and keep the recommendations.
  ///
  /// # Errors
  /// Propagates snapshot validation.
  #[instrument(
    skip_all,
    fields(score = %state.score, minute = state.minute, volatility = %state.volatility)
  )]
  pub fn evaluate(
    &self,
    state: &mut LiveState,
    portfolio: &BetPortfolio,
  ) -> AdvisorResult<Vec<Recommendation>> {
    let condition = state.condition()?;
    let scenarios = self.scenarios(state, &condition, portfolio);
    let capital = self.phase_capital(portfolio, condition.minute);
    let recommendations = self.enrich(scenarios, &condition, state.volatility, portfolio, capital);

    info!(
      capital,
      recommendations = recommendations.len(),
      "In-play evaluation complete"
    );

    state.recommendations = recommendations.clone();
    Ok(recommendations)
  }

  fn enrich(
    &self,
    scenarios: Vec<Scenario>,
    condition: &MatchCondition,
    volatility: QuantumState,
    portfolio: &BetPortfolio,
    capital: f64,
  ) -> Vec<Recommendation> {
    let total_weight: f64 = scenarios.iter().map(|s| s.weight).sum();
    if scenarios.is_empty() || total_weight <= 0.0 {
      return Vec::new();
    }

    let proportions: Vec<f64> = scenarios.iter().map(|s| s.weight / total_weight).collect();
    let stakes = split_cents(capital, &proportions);

    scenarios
      .into_iter()
      .zip(proportions.into_iter().zip(stakes))
      .map(|(scenario, (proportion, stake))| {
        let bt = scenario.bet_type;
        let (protection_ratio, attack_ratio) = dynamic_ratios(bt, condition, volatility);
        let probability = self.model.estimate(bt, condition);
        let initial = portfolio.initial_bets.get(&bt);
        let odd = initial.map_or(scenario.min_odd, |b| b.odd * (1.0 + (0.5 - probability)));
        let protection_stake = round_cents(stake * protection_ratio);

        Recommendation {
          odd,
          probability,
          proportion,
          stake,
          ev_pct: probability.mul_add(odd, -1.0) * 100.0,
          protection_ratio,
          attack_ratio,
          protection_stake,
          attack_stake: round_cents(stake - protection_stake),
          strategy: strategy_info(bt, condition, volatility),
          hedge: self.hedge_advice(bt, initial.map_or(0.0, |b| b.amount), condition),
          kelly_stake: self.kelly.stake(probability, odd, capital, volatility),
          split: self.protection_split(bt, condition, scenario.min_odd),
          scenario,
        }
      })
      .collect()
  }

  /// Hedge against an anchor position on `bet_type`.
  pub fn hedge_advice(
    &self,
    bet_type: BetType,
    initial_amount: f64,
    condition: &MatchCondition,
  ) -> Option<HedgeAdvice> {
    let market = hedge_market(bet_type)?;
    let p_main = self.model.estimate(bet_type, condition);
    let p_hedge = self.model.estimate(market, condition);
    if p_main + p_hedge <= 0.0 {
      return None;
    }
    let ratio = (p_hedge / (p_main + p_hedge)).clamp(0.3, 0.7);
    Some(HedgeAdvice {
      market,
      ratio,
      amount: round_cents(initial_amount * ratio),
      probability: p_hedge,
      reference_odd: fallback_odd(market),
    })
  }

  /// 70/30 split between a protective market and its attacking counterpart.
  pub fn protection_split(
    &self,
    bet_type: BetType,
    condition: &MatchCondition,
    min_odd: f64,
  ) -> Option<ProtectionSplit> {
    let attack_market = match bet_type {
      BetType::Under25 => BetType::Over25,
      BetType::BothToScoreNo => BetType::BothToScore,
      BetType::Draw if condition.home_pressure > condition.away_pressure => BetType::HomeWin,
      BetType::Draw => BetType::AwayWin,
      _ => return None,
    };
    let p_protect = self.model.estimate(bet_type, condition);
    let p_attack = self.model.estimate(attack_market, condition);
    let total = p_protect + p_attack;
    if total <= 0.0 {
      return None;
    }
    Some(ProtectionSplit {
      protection_weight: p_protect / total * 0.7,
      attack_market,
      attack_weight: p_attack / total * 0.3,
      attack_probability: p_attack,
      attack_min_odd: min_odd * 1.3,
    })
  }

  /// Apply the recommendation at 1-based `position` from the latest evaluation.
  ///
  /// # Errors
  /// `ApplyRejected` for an unknown position, a zero stake, EV below the
  /// threshold or a stake that would push in-play bets past the live cap.
  #[instrument(skip(self, state, portfolio))]
  pub fn apply(
    &self,
    state: &LiveState,
    portfolio: &mut BetPortfolio,
    position: usize,
  ) -> AdvisorResult<QuantumBet> {
    let rec = position
      .checked_sub(1)
      .and_then(|i| state.recommendations.get(i))
      .ok_or_else(|| AdvisorError::ApplyRejected {
        index: position,
        reason: format!("no recommendation at position {position}"),
      })?;

    if let Some(reason) = rec.rejection(self.apply_ev_threshold) {
      warn!(position, %reason, "Recommendation rejected");
      return Err(AdvisorError::ApplyRejected {
        index: position,
        reason,
      });
    }

    let cap = self.live_cap(portfolio.capital);
    let committed = portfolio.in_play_invested();
    if committed + rec.stake > cap + CENT_TOLERANCE {
      let reason = format!(
        "in-play stakes {committed:.2} + {:.2} exceed the cap of {cap:.2}",
        rec.stake
      );
      warn!(position, %reason, "Recommendation rejected");
      return Err(AdvisorError::ApplyRejected {
        index: position,
        reason,
      });
    }

    let bt = rec.scenario.bet_type;
    let previous = portfolio.in_play_bets.get(&bt).map_or(0.0, |b| b.amount);
    let bet = QuantumBet::new(
      bt,
      round_cents(previous + rec.stake),
      rec.odd,
      rec.probability,
    );
    portfolio.in_play_bets.insert(bt, bet.clone());

    info!(
      market = %bt,
      stake = rec.stake,
      odd = rec.odd,
      ev_pct = rec.ev_pct,
      "In-play bet applied"
    );

    Ok(bet)
  }

  /// Check the cycle can be closed.
  ///
  /// # Errors
  /// `MissingPrerequisite` without anchor or combination bets.
  pub fn finish(portfolio: &BetPortfolio) -> AdvisorResult<()> {
    if portfolio.initial_bets.is_empty() {
      return Err(AdvisorError::MissingPrerequisite("no anchor bets defined".into()));
    }
    if portfolio.multi_bets.is_empty() {
      return Err(AdvisorError::MissingPrerequisite(
        "no combination bets defined".into(),
      ));
    }
    Ok(())
  }
}

/// Protection share of a stake for `bet_type`; attack is the remainder.
pub fn dynamic_ratios(
  bet_type: BetType,
  condition: &MatchCondition,
  volatility: QuantumState,
) -> (f64, f64) {
  let vf = volatility.volatility_factor();
  let pressure_gap = condition.pressure_diff().abs();
  let time_factor = condition.time_factor();

  let base = match bet_type {
    BetType::Under25 | BetType::BothToScoreNo => {
      0.1f64.mul_add(-pressure_gap, 0.2f64.mul_add(vf, 0.6))
    }
    BetType::Over25 | BetType::BothToScore => {
      0.2f64.mul_add(time_factor, 0.1f64.mul_add(-vf, 0.4))
    }
    _ => 0.5,
  };
  let protection = base.clamp(0.1, 0.9);
  (protection, 1.0 - protection)
}

/// Strategy description for a market at the current stage of the match.
pub fn strategy_info(
  bet_type: BetType,
  condition: &MatchCondition,
  volatility: QuantumState,
) -> String {
  let stage = match condition.minute {
    0..30 => 0,
    30..60 => 1,
    _ => 2,
  };

  if let Some((split, note)) = base_strategy(bet_type, volatility, stage) {
    return format!("{split} - {note}");
  }

  let protection = (0.5
    + 0.4 * volatility.volatility_factor()
    - 0.2 * condition.pressure_diff().abs()
    + 0.3 * condition.time_factor())
  .clamp(0.2, 0.8);
  let protection_pct = (protection * 100.0) as u32;
  let attack_pct = ((1.0 - protection) * 100.0) as u32;
  format!(
    "Protection {protection_pct}% + Attack {attack_pct}% - dynamic strategy from the match context"
  )
}

type StrategyRow = [(&'static str, &'static str); 3];

fn base_strategy(
  bet_type: BetType,
  volatility: QuantumState,
  stage: usize,
) -> Option<(&'static str, &'static str)> {
  use QuantumState::{Chaotic, Stable, Transition};

  let row: StrategyRow = match (bet_type, volatility) {
    (BetType::Under25, Stable) => [
      ("Protection 30% + Attack 70%", "preventive entry on the under"),
      ("Protection 50% + Attack 50%", "balanced adjustment"),
      ("Protection 70% + Attack 30%", "defensive lock"),
    ],
    (BetType::Under25, Chaotic) => [
      ("Protection 50% + Attack 50%", "cautious entry on the under"),
      ("Protection 60% + Attack 40%", "defend against a turnaround"),
      ("Protection 80% + Attack 20%", "maximum protection"),
    ],
    (BetType::Over25, Transition) => [
      ("Attack 70% + Protection 30%", "exploit an attacking start"),
      ("Attack 50% + Protection 50%", "tactical adjustment"),
      ("Protection 70% + Attack 30%", "lock in profits"),
    ],
    (BetType::HomeWin, Stable) => [
      ("Attack 60% + Protection 40%", "value on the home side"),
      ("Attack 40% + Protection 60%", "consolidation"),
      ("Protection 80% + Attack 20%", "hold the lead"),
    ],
    (BetType::AwayWin, Chaotic) => [
      ("Attack 30% + Protection 70%", "cautious speculation"),
      ("Attack 50% + Protection 50%", "potential turnaround"),
      ("Attack 70% + Protection 30%", "late pressure"),
    ],
    _ => return None,
  };
  row.get(stage).copied()
}

/// Entry-timing advice for an anchor market.
pub fn timing_advice(
  bet_type: BetType,
  condition: &MatchCondition,
  volatility: QuantumState,
) -> String {
  let Score { home, away } = condition.score;
  let total = home + away;
  let diff = condition.score.diff();
  let minute = condition.minute;
  let pressure_diff = condition.pressure_diff();

  let base = match bet_type {
    BetType::Under25 => {
      if minute < 25 && total == 0 {
        "STRONG ENTRY (before 25')"
      } else if minute < 35 && total < 1 {
        "MODERATE ENTRY (25'-35')"
      } else if minute < 60 && total < 2 {
        "PROTECTION (35'-60')"
      } else {
        "MANDATORY HEDGE (after 60')"
      }
    }
    BetType::Over15FirstHalf => {
      if minute < 15 && pressure_diff > 0.3 {
        "AGGRESSIVE ENTRY (before 15')"
      } else if minute < 25 {
        "STANDARD ENTRY (15'-25')"
      } else if minute < 35 && total == 0 {
        "LAST CHANCE (25'-35')"
      } else {
        "AVOID (after 35')"
      }
    }
    BetType::BothToScore => {
      if minute < 20 {
        "EARLY ENTRY (before 20')"
      } else if minute < 40 && total == 0 {
        "LATE ENTRY (20'-40')"
      } else if home == 1 || away == 1 {
        "PARTIAL PROTECTION (40'-70')"
      } else {
        "POSITION AGAINST (after 70')"
      }
    }
    BetType::DoubleChanceUnderdog => {
      if minute < 25 && diff == 0 {
        "EARLY ENTRY (before 25')"
      } else if diff == 1 {
        "POSITION AGAINST (25'-60')"
      } else if diff.abs() <= 1 {
        "PARTIAL HEDGE (after 60')"
      } else {
        "HOLD POSITION"
      }
    }
    BetType::Over15Match => {
      if minute < 15 {
        "STRONG ENTRY (before 15')"
      } else if minute < 30 && total == 0 {
        "CONDITIONAL ENTRY (15'-30')"
      } else if total == 1 {
        "PROTECTION (30'-60')"
      } else {
        "CLOSE POSITION (after 60')"
      }
    }
    _ => "Analyse the context manually",
  };

  let mut notes = Vec::new();
  match volatility {
    QuantumState::Chaotic => notes.push("volatile market, take extra care".to_string()),
    QuantumState::Stable => notes.push("stable market, good opportunities".to_string()),
    QuantumState::Transition => {}
  }
  if pressure_diff > 0.4 {
    notes.push(format!("pressure favours home ({pressure_diff:.1})"));
  } else if pressure_diff < -0.4 {
    notes.push(format!("pressure favours away ({:.1})", pressure_diff.abs()));
  }

  if notes.is_empty() {
    base.to_string()
  } else {
    format!("{base} [{}]", notes.join(", "))
  }
}

/// Markets worth watching at the current goal count.
pub fn priority_markets(score: Score) -> [BetType; 3] {
  match score.total() {
    0 => [BetType::Over15FirstHalf, BetType::BothToScore, BetType::Over15Match],
    1 => [BetType::Over25, BetType::BothToScore, BetType::DoubleChanceUnderdog],
    _ => [BetType::Under35, BetType::BothToScore, BetType::Winner],
  }
}

/// Whether `bet_type` is already settled as won at `score`.
pub fn is_bet_won(bet_type: BetType, score: Score) -> bool {
  match bet_type {
    BetType::HomeWin => score.home > score.away,
    BetType::AwayWin => score.away > score.home,
    BetType::Draw => score.home == score.away,
    BetType::Over15Match => score.total() > 1,
    BetType::Over25 => score.total() > 2,
    BetType::BothToScore => score.both_scored(),
    _ => false,
  }
}

/// Opposite market used to hedge a position.
pub fn hedge_market(bet_type: BetType) -> Option<BetType> {
  match bet_type {
    BetType::HomeWin => Some(BetType::AwayWin),
    BetType::AwayWin => Some(BetType::HomeWin),
    BetType::Over25 => Some(BetType::Under25),
    BetType::BothToScore => Some(BetType::BothToScoreNo),
    _ => None,
  }
}

/// Reference odd when no market price is known.
pub fn fallback_odd(bet_type: BetType) -> f64 {
  match bet_type {
    BetType::AwayWin => 3.5,
    BetType::Draw => 3.2,
    BetType::Over25 => 1.8,
    _ => 2.0,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::domain::market::ComboBet;

  fn engine() -> LiveEngine {
    let config = AppConfig::default();
    LiveEngine::new(
      ProbabilityModel::default(),
      KellySizer::default(),
      &config.allocation,
      &config.live,
    )
  }

  fn state(score: (u32, u32), minute: u32, hp: f64, ap: f64, v: QuantumState) -> LiveState {
    LiveState {
      score: Score::new(score.0, score.1),
      minute,
      home_pressure: hp,
      away_pressure: ap,
      volatility: v,
      ..LiveState::default()
    }
  }

  fn run(engine: &LiveEngine, state: &mut LiveState, portfolio: &BetPortfolio) -> Vec<Scenario> {
    let condition = state.condition().unwrap();
    engine.scenarios(state, &condition, portfolio)
  }

  fn confirmed_portfolio() -> BetPortfolio {
    let mut portfolio = BetPortfolio::new(100.0);
    portfolio
      .initial_bets
      .insert(BetType::Under25, QuantumBet::new(BetType::Under25, 60.0, 1.85, 0.58));
    portfolio
  }

  #[test]
  fn test_phase_capital_base_and_boost() {
    let engine = engine();
    let portfolio = confirmed_portfolio();
    assert_eq!(engine.phase_capital(&portfolio, 30), 9.0);
    // minute 90: boost 1.5 -> 13.5, capped at 12
    assert_eq!(engine.phase_capital(&portfolio, 90), 12.0);

    let mut with_combos = portfolio.clone();
    with_combos.multi_bets.push(ComboBet {
      name: "x".into(),
      legs: vec![BetType::Under25, BetType::Winner],
      odds: vec![1.9, 1.5],
      amount: 31.0,
    });
    // 100 - 60 - 31 = 9
    assert_eq!(engine.phase_capital(&with_combos, 0), 9.0);

    let mut spent = portfolio;
    spent.initial_bets.get_mut(&BetType::Under25).unwrap().amount = 100.0;
    assert_eq!(engine.phase_capital(&spent, 80), 0.0);
  }

  #[test]
  fn test_suggested_pressure() {
    let (h, a) = LiveEngine::suggested_pressure(Score::new(2, 0), 45);
    assert!((h - 0.85).abs() < 1e-9);
    assert!((a - 0.45).abs() < 1e-9);
    let (h, _) = LiveEngine::suggested_pressure(Score::new(5, 0), 90);
    assert_eq!(h, 1.0);
  }

  #[test]
  fn test_observe_validates_and_keeps_state() {
    let engine = engine();
    let mut live = LiveState::default();
    let bad = LiveInput {
      score: Score::new(1, 0),
      minute: 130,
      home_pressure: None,
      away_pressure: None,
      volatility: QuantumState::Chaotic,
    };
    assert!(engine.observe(&mut live, bad).is_err());
    assert_eq!(live, LiveState::default());

    let good = LiveInput { minute: 45, ..bad };
    let condition = engine.observe(&mut live, good).unwrap();
    assert_eq!(live.volatility, QuantumState::Chaotic);
    assert!((condition.home_pressure - 0.75).abs() < 1e-9);
  }

  #[test]
  fn test_comeback_scenario() {
    let engine = engine();
    let mut live = state((0, 1), 65, 0.8, 0.5, QuantumState::Stable);
    let scenarios = run(&engine, &mut live, &BetPortfolio::new(100.0));
    assert_eq!(scenarios[0].bet_type, BetType::HomeWin);
    assert!((scenarios[0].weight - 1.05).abs() < 1e-12);
    assert_eq!(scenarios[0].priority, Some(Priority::High));
    assert_eq!(scenarios[1].bet_type, BetType::Draw);
    assert!((scenarios[1].weight - 0.45).abs() < 1e-12);
    // losing side pressing also fires
    assert!(scenarios.iter().any(|s| s.bet_type == BetType::NextGoalLosingTeam));
  }

  #[test]
  fn test_safety_hedge_on_three_leg_combo() {
    let engine = engine();
    let mut portfolio = BetPortfolio::new(100.0);
    portfolio.multi_bets.push(ComboBet {
      name: "Treble".into(),
      legs: vec![BetType::HomeWin, BetType::Over15Match, BetType::BothToScore],
      odds: vec![2.0, 1.5, 1.8],
      amount: 10.0,
    });
    let mut live = state((1, 1), 85, 0.5, 0.5, QuantumState::Stable);
    let scenarios = run(&engine, &mut live, &portfolio);
    let hedge = scenarios
      .iter()
      .find(|s| s.priority == Some(Priority::Critical))
      .unwrap();
    assert_eq!(hedge.bet_type, BetType::AwayWin);
    assert_eq!(hedge.min_odd, 1.80);
  }

  #[test]
  fn test_red_card_rules() {
    let engine = engine();
    let mut live = state((0, 0), 20, 0.5, 0.5, QuantumState::Transition);
    assert_eq!(
      LiveEngine::record_red_card(&mut live, Side::Home),
      Err(AdvisorError::RedCardTooEarly(20))
    );
    live.minute = 35;
    assert_eq!(LiveEngine::record_red_card(&mut live, Side::Away), Ok(true));
    assert_eq!(LiveEngine::record_red_card(&mut live, Side::Home), Ok(false));

    let scenarios = run(&engine, &mut live, &BetPortfolio::new(100.0));
    assert_eq!(scenarios[0].bet_type, BetType::AwayHandicap);

    live.score = Score::new(3, 0);
    let scenarios = run(&engine, &mut live, &BetPortfolio::new(100.0));
    assert!(scenarios.iter().all(|s| s.bet_type != BetType::AwayHandicap));
  }

  #[test]
  fn test_half_time_scenarios() {
    let engine = engine();
    let mut quiet = state((1, 0), 45, 0.5, 0.5, QuantumState::Stable);
    let scenarios = run(&engine, &mut quiet, &BetPortfolio::new(100.0));
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0].bet_type, BetType::Under25);

    let mut level = state((1, 1), 45, 0.5, 0.5, QuantumState::Transition);
    let scenarios = run(&engine, &mut level, &BetPortfolio::new(100.0));
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0].bet_type, BetType::Draw);
  }

  #[test]
  fn test_early_storms_need_chaos() {
    let engine = engine();
    let mut live = state((0, 0), 10, 0.8, 0.75, QuantumState::Chaotic);
    let kinds: Vec<BetType> = run(&engine, &mut live, &BetPortfolio::new(100.0))
      .into_iter()
      .map(|s| s.bet_type)
      .collect();
    assert_eq!(kinds, vec![BetType::BothToScoreNo, BetType::NextGoalAway]);

    let mut calm = state((0, 0), 10, 0.8, 0.75, QuantumState::Transition);
    assert!(run(&engine, &mut calm, &BetPortfolio::new(100.0)).is_empty());
  }

  #[test]
  fn test_volatility_jump_uses_previous_evaluation() {
    let engine = engine();
    let portfolio = BetPortfolio::new(100.0);
    let mut live = state((0, 0), 30, 0.5, 0.5, QuantumState::Stable);
    assert!(run(&engine, &mut live, &portfolio).is_empty());
    assert_eq!(live.last_volatility, Some(QuantumState::Stable));

    live.volatility = QuantumState::Chaotic;
    let scenarios = run(&engine, &mut live, &portfolio);
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0].bet_type, BetType::GoalNext5Min);

    // Chaotic -> Chaotic does not fire again
    assert!(run(&engine, &mut live, &portfolio).is_empty());
  }

  #[test]
  fn test_dead_game() {
    let engine = engine();
    let mut live = state((0, 0), 70, 0.3, 0.2, QuantumState::Transition);
    let scenarios = run(&engine, &mut live, &BetPortfolio::new(100.0));
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0].bet_type, BetType::NoMoreGoals);
  }

  #[test]
  fn test_evaluate_enriches_and_sizes() {
    let engine = engine();
    let portfolio = confirmed_portfolio();
    let mut live = state((1, 0), 45, 0.5, 0.5, QuantumState::Stable);
    let recs = engine.evaluate(&mut live, &portfolio).unwrap();
    assert_eq!(recs.len(), 1);
    let rec = &recs[0];

    assert_eq!(rec.stake, 9.0);
    assert_eq!(rec.proportion, 1.0);
    let p = ProbabilityModel::default().estimate(BetType::Under25, &live.condition().unwrap());
    assert!((rec.odd - 1.85 * (1.0 + (0.5 - p))).abs() < 1e-9);
    assert!((rec.protection_ratio + rec.attack_ratio - 1.0).abs() < 1e-12);
    assert!((rec.protection_stake + rec.attack_stake - rec.stake).abs() < 1e-9);
    assert!(rec.split.is_some());
    assert!(rec.hedge.is_none());
    assert_eq!(live.recommendations, recs);
  }

  #[test]
  fn test_apply_gate() {
    let engine = engine();
    let mut portfolio = BetPortfolio::new(100.0);
    // Draw at 3.5 with p = 0.5: EV 75%
    let mut live = state((1, 1), 45, 0.5, 0.5, QuantumState::Stable);
    let recs = engine.evaluate(&mut live, &portfolio).unwrap();
    assert!(recs[0].ev_pct > 3.0);

    let bet = engine.apply(&live, &mut portfolio, 1).unwrap();
    assert_eq!(bet.bet_type, BetType::Draw);
    assert_eq!(portfolio.in_play_bets[&BetType::Draw].amount, bet.amount);

    // 9 already staked; another 9 would pass the 12 cap
    assert!(matches!(
      engine.apply(&live, &mut portfolio, 1),
      Err(AdvisorError::ApplyRejected { index: 1, .. })
    ));
    assert_eq!(portfolio.in_play_invested(), bet.amount);

    assert!(matches!(
      engine.apply(&live, &mut portfolio, 0),
      Err(AdvisorError::ApplyRejected { index: 0, .. })
    ));
    assert!(matches!(
      engine.apply(&live, &mut portfolio, 5),
      Err(AdvisorError::ApplyRejected { index: 5, .. })
    ));
  }

  #[test]
  fn test_phase_capital_shrinks_with_applied_stakes() {
    let engine = engine();
    let mut portfolio = BetPortfolio::new(100.0);
    assert_eq!(engine.phase_capital(&portfolio, 45), 9.0);

    portfolio
      .in_play_bets
      .insert(BetType::Draw, QuantumBet::new(BetType::Draw, 5.0, 3.5, 0.5));
    assert_eq!(engine.phase_capital(&portfolio, 45), 7.0);
    assert_eq!(engine.phase_capital(&portfolio, 90), 7.0);

    portfolio
      .in_play_bets
      .insert(BetType::Under25, QuantumBet::new(BetType::Under25, 7.0, 1.9, 0.5));
    assert_eq!(engine.phase_capital(&portfolio, 90), 0.0);
  }

  #[test]
  fn test_apply_rejects_low_ev() {
    let engine = engine();
    let mut portfolio = confirmed_portfolio();
    let mut live = state((1, 0), 45, 0.5, 0.5, QuantumState::Stable);
    let recs = engine.evaluate(&mut live, &portfolio).unwrap();
    // Under 2.5 repriced off a 1.85 anchor has negative EV
    assert!(recs[0].ev_pct < 3.0);
    assert!(engine.apply(&live, &mut portfolio, 1).is_err());
    assert!(portfolio.in_play_bets.is_empty());
  }

  #[test]
  fn test_dynamic_ratios() {
    let cond = MatchCondition::new(Score::new(0, 0), 45, 0.7, 0.3).unwrap();
    let (p, a) = dynamic_ratios(BetType::Under25, &cond, QuantumState::Chaotic);
    assert!((p - (0.6 + 0.18 - 0.04)).abs() < 1e-9);
    assert!((p + a - 1.0).abs() < 1e-12);
    let (p, _) = dynamic_ratios(BetType::BothToScore, &cond, QuantumState::Stable);
    assert!((p - (0.4 - 0.03 + 0.1)).abs() < 1e-9);
    assert_eq!(dynamic_ratios(BetType::Draw, &cond, QuantumState::Stable).0, 0.5);
  }

  #[test]
  fn test_strategy_table_and_fallback() {
    let late = MatchCondition::new(Score::new(1, 0), 70, 0.5, 0.5).unwrap();
    assert_eq!(
      strategy_info(BetType::Under25, &late, QuantumState::Chaotic),
      "Protection 80% + Attack 20% - maximum protection"
    );
    let early = MatchCondition::default();
    let fallback = strategy_info(BetType::Draw, &early, QuantumState::Stable);
    assert!(fallback.starts_with("Protection 62% + Attack 38%"));
  }

  #[test]
  fn test_hedge_advice_ratio_bounds() {
    let engine = engine();
    let cond = MatchCondition::default();
    let advice = engine.hedge_advice(BetType::HomeWin, 10.0, &cond).unwrap();
    assert_eq!(advice.market, BetType::AwayWin);
    assert!((advice.ratio - 0.5).abs() < 1e-12);
    assert_eq!(advice.amount, 5.0);
    assert_eq!(advice.reference_odd, 3.5);
    assert!(engine.hedge_advice(BetType::Draw, 10.0, &cond).is_none());
  }

  #[test]
  fn test_protection_split_draw_follows_pressure() {
    let engine = engine();
    let cond = MatchCondition::new(Score::new(1, 1), 45, 0.3, 0.6).unwrap();
    let split = engine.protection_split(BetType::Draw, &cond, 3.5).unwrap();
    assert_eq!(split.attack_market, BetType::AwayWin);
    assert!((split.protection_weight - 0.35).abs() < 1e-9);
    assert!((split.attack_weight - 0.15).abs() < 1e-9);
    assert!((split.attack_min_odd - 4.55).abs() < 1e-9);
  }

  #[test]
  fn test_timing_advice() {
    let cond = MatchCondition::new(Score::new(0, 0), 10, 0.9, 0.4).unwrap();
    assert_eq!(
      timing_advice(BetType::Under25, &cond, QuantumState::Transition),
      "STRONG ENTRY (before 25') [pressure favours home (0.5)]"
    );
    assert_eq!(
      timing_advice(BetType::Over15FirstHalf, &cond, QuantumState::Chaotic),
      "AGGRESSIVE ENTRY (before 15') [volatile market, take extra care, pressure favours home (0.5)]"
    );
    assert_eq!(
      timing_advice(BetType::Draw, &MatchCondition::default(), QuantumState::Transition),
      "Analyse the context manually"
    );
  }

  #[test]
  fn test_bet_resolution_helpers() {
    assert!(is_bet_won(BetType::Over15Match, Score::new(1, 1)));
    assert!(!is_bet_won(BetType::Over25, Score::new(1, 1)));
    assert!(is_bet_won(BetType::Draw, Score::new(0, 0)));
    assert!(!is_bet_won(BetType::Under25, Score::new(0, 0)));
    assert_eq!(hedge_market(BetType::Over25), Some(BetType::Under25));
    assert_eq!(hedge_market(BetType::Under25), None);
    assert_eq!(
      priority_markets(Score::new(2, 1)),
      [BetType::Under35, BetType::BothToScore, BetType::Winner]
    );
    assert_eq!(fallback_odd(BetType::HomeWin), 2.0);
  }

  #[test]
  fn test_finish_prerequisites() {
    let mut portfolio = confirmed_portfolio();
    assert!(LiveEngine::finish(&portfolio).is_err());
    portfolio.multi_bets.push(ComboBet {
      name: "x".into(),
      legs: vec![BetType::Under25, BetType::Winner],
      odds: vec![1.9, 1.5],
      amount: 31.0,
    });
    assert!(LiveEngine::finish(&portfolio).is_ok());
  }
}
