//! Advisor - Command Orchestration over the Session Store
//!
//! Wires the three phases to a `SessionStore`:
//! 1. Loads (or creates) the session and checks its consistency
//! 2. Runs one command on a draft copy of the session
//! 3. Saves the draft on success; on failure applies the error's
//!    recovery (redirect or reset) to the stored session instead
//!
//! Input errors therefore never leave a half-applied command behind.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::domain::error::AdvisorResult;
use crate::domain::kelly::KellySizer;
use crate::domain::market::{BetType, MatchCondition, Phase, QuantumBet, QuantumState, Side};
use crate::domain::optimizer::{PortfolioOptimizer, correlation_matrix};
use crate::domain::probability::ProbabilityModel;
use crate::ports::session_store::SessionStore;

use super::anchors::{ANCHOR_MARKETS, AnchorPhase, AnchorPlan};
use super::combos::{ComboOffer, ComboPhase, ComboPlan};
use super::live::{LiveEngine, LiveInput, Recommendation, priority_markets, timing_advice};
use super::session::Session;

/// Phase-1 request.
#[derive(Debug, Clone, Default)]
pub struct AnchorsCommand {
  pub odds: Vec<(BetType, f64)>,
  pub optimize: bool,
  pub confirm: bool,
  pub force_mandatory: bool,
}

/// Phase-2 request.
#[derive(Debug, Clone, Default)]
pub struct CombosCommand {
  pub select: Vec<String>,
  pub odds: Vec<(String, [f64; 2])>,
  pub confirm: bool,
}

/// Phase-3 request.
#[derive(Debug, Clone)]
pub struct LiveCommand {
  pub input: LiveInput,
  pub red_card: Option<Side>,
  /// 1-based position in this evaluation's recommendations.
  pub apply: Option<usize>,
  pub finish: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnchorsReport {
  pub capital: f64,
  pub odds: Vec<(BetType, f64)>,
  /// `None` until an allocation exists.
  pub plan: Option<AnchorPlan>,
  /// Markets in the plan, in the order of `correlations`.
  pub allocated: Vec<BetType>,
  pub correlations: Vec<Vec<f64>>,
  pub confirmed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CombosReport {
  pub offers: Vec<ComboOffer>,
  pub selected: Vec<String>,
  /// `None` while nothing is selected.
  pub plan: Option<ComboPlan>,
  pub confirmed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveReport {
  pub condition: MatchCondition,
  pub volatility: QuantumState,
  pub phase_capital: f64,
  pub red_card_recorded: Option<bool>,
  pub recommendations: Vec<Recommendation>,
  pub timing: Vec<(BetType, String)>,
  pub priority_markets: [BetType; 3],
  pub applied: Option<QuantumBet>,
  pub finished: bool,
}

/// Command surface of the advisor.
pub struct Advisor<S: SessionStore> {
  /// Session persistence.
  store: Arc<S>,
  anchors: AnchorPhase,
  combos: ComboPhase,
  live: LiveEngine,
  kelly: KellySizer,
  model: ProbabilityModel,
  min_capital: f64,
}

impl<S: SessionStore> Advisor<S> {
  /// Build the phases from configuration.
  pub fn new(config: &AppConfig, store: Arc<S>) -> Self {
    let model = ProbabilityModel::default();
    let kelly = KellySizer::new(
      config.kelly.stable_fraction,
      config.kelly.transition_fraction,
      config.kelly.chaotic_fraction,
      config.kelly.max_bankroll_fraction,
    );

    Self {
      store,
      anchors: AnchorPhase::new(PortfolioOptimizer::new(model.clone()), &config.allocation),
      combos: ComboPhase::new(config.allocation.combo_share),
      live: LiveEngine::new(model.clone(), kelly.clone(), &config.allocation, &config.live),
      kelly,
      model,
      min_capital: config.allocation.min_capital,
    }
  }

  /// Load the stored session, creating or repairing it as needed.
  ///
  /// An inconsistent snapshot is reset (capital kept) and saved back.
  #[instrument(skip(self))]
  pub async fn load(&self) -> Result<Session> {
    let Some(mut session) = self.store.load().await? else {
      return Ok(Session::new());
    };

    if let Err(err) = session.validate(self.live.live_cap_share()) {
      warn!(error = %err, "Stored session failed validation");
      session.recover(&err);
      session.touch();
      self
        .store
        .save(&session)
        .await
        .context("Failed to save repaired session")?;
    }
    Ok(session)
  }

  /// Run `op` against the stored session.
  ///
  /// The session is saved only if `op` succeeds. A failing `op`
  /// leaves the stored session untouched unless its error asks
  /// for a redirect or a reset.
  pub async fn execute<T, F>(&self, op: F) -> Result<T>
  where
    F: FnOnce(&Self, &mut Session) -> AdvisorResult<T>,
  {
    let mut session = self.load().await?;
    let mut draft = session.clone();

    match op(self, &mut draft) {
      Ok(value) => {
        draft.touch();
        self.store.save(&draft).await?;
        Ok(value)
      }
      Err(err) => {
        if session.recover(&err) {
          session.touch();
          self.store.save(&session).await?;
        }
        Err(err.into())
      }
    }
  }

  /// Clear everything but the capital.
  pub async fn reset(&self) -> Result<Session> {
    let mut session = self.load().await?;
    session.reset();
    session.touch();
    self.store.save(&session).await?;
    Ok(session)
  }

  /// Set the session capital.
  ///
  /// # Errors
  /// See [`Session::start`].
  pub fn start(&self, session: &mut Session, capital: f64) -> AdvisorResult<()> {
    session.start(capital, self.min_capital)
  }

  /// Phase 1: edit odds, optimize, confirm.
  ///
  /// # Errors
  /// Gating, odd validation and allocation errors.
  #[instrument(
    skip_all,
    fields(odds = cmd.odds.len(), optimize = cmd.optimize, confirm = cmd.confirm)
  )]
  pub fn anchors(
    &self,
    session: &mut Session,
    cmd: &AnchorsCommand,
  ) -> AdvisorResult<AnchorsReport> {
    session.require(Phase::InitialOdds)?;

    for (market, odd) in &cmd.odds {
      self.anchors.set_odd(&mut session.anchors, *market, *odd)?;
    }

    let capital = session.capital();
    let low_capital = self.anchors.is_low_capital(capital);
    if cmd.optimize {
      self.anchors.optimize(&mut session.anchors);
    }

    let plan = if cmd.confirm {
      let plan = self
        .anchors
        .confirm(&mut session.anchors, &mut session.portfolio, cmd.force_mandatory)?;
      session.combos = Default::default();
      session.confirm_initial();
      Some(plan)
    } else if low_capital || !session.anchors.allocations.is_empty() {
      Some(self.anchors.plan(&session.anchors, capital, cmd.force_mandatory)?)
    } else {
      None
    };

    let allocated: Vec<BetType> = plan
      .as_ref()
      .map(|p| p.lines.iter().map(|l| l.bet.bet_type).collect())
      .unwrap_or_default();

    Ok(AnchorsReport {
      capital,
      odds: ANCHOR_MARKETS
        .iter()
        .map(|bt| (*bt, session.anchors.odds.get(bt).copied().unwrap_or_default()))
        .collect(),
      correlations: correlation_matrix(&allocated),
      allocated,
      plan,
      confirmed: session.initial_confirmed,
    })
  }

  /// Phase 2: select, override odds, confirm.
  ///
  /// # Errors
  /// Gating, unknown combinations, odd validation and capital errors.
  #[instrument(skip_all, fields(select = cmd.select.len(), confirm = cmd.confirm))]
  pub fn combos(&self, session: &mut Session, cmd: &CombosCommand) -> AdvisorResult<CombosReport> {
    session.require(Phase::MultiBets)?;

    for name in &cmd.select {
      self.combos.select(&mut session.combos, name)?;
    }
    for (name, odds) in &cmd.odds {
      self.combos.set_manual_odds(&mut session.combos, name, *odds)?;
    }

    let fixed = session.anchors.initial_odds_fixed.clone();
    let plan = if cmd.confirm {
      let plan = self
        .combos
        .confirm(&mut session.combos, &mut session.portfolio, &fixed)?;
      session.live = Default::default();
      session.confirm_multi();
      Some(plan)
    } else if session.combos.selected.is_empty() {
      None
    } else {
      Some(self.combos.plan(&session.combos, &session.portfolio, &fixed)?)
    };

    Ok(CombosReport {
      offers: self.combos.offers(&session.portfolio),
      selected: session.combos.selected.clone(),
      plan,
      confirmed: session.multi_confirmed,
    })
  }

  /// Phase 3: observe, evaluate, optionally apply or finish.
  ///
  /// # Errors
  /// Gating, snapshot validation, red-card timing, apply gate and
  /// finish prerequisites.
  #[instrument(skip_all, fields(minute = cmd.input.minute, score = %cmd.input.score))]
  pub fn live(&self, session: &mut Session, cmd: &LiveCommand) -> AdvisorResult<LiveReport> {
    session.require(Phase::InPlay)?;

    let condition = self.live.observe(&mut session.live, cmd.input)?;
    let red_card_recorded = match cmd.red_card {
      Some(side) => Some(LiveEngine::record_red_card(&mut session.live, side)?),
      None => None,
    };

    let recommendations = self.live.evaluate(&mut session.live, &session.portfolio)?;
    let phase_capital = self.live.phase_capital(&session.portfolio, condition.minute);

    let applied = match cmd.apply {
      Some(position) => Some(self.live.apply(&session.live, &mut session.portfolio, position)?),
      None => None,
    };

    let volatility = session.live.volatility;
    let timing = ANCHOR_MARKETS
      .iter()
      .filter(|bt| session.portfolio.initial_bets.contains_key(bt))
      .map(|bt| (*bt, timing_advice(*bt, &condition, volatility)))
      .collect();

    if cmd.finish {
      LiveEngine::finish(&session.portfolio)?;
      session.complete_cycle();
    }

    info!(
      recommendations = recommendations.len(),
      applied = applied.is_some(),
      finished = cmd.finish,
      "Live command processed"
    );

    Ok(LiveReport {
      priority_markets: priority_markets(condition.score),
      condition,
      volatility,
      phase_capital,
      red_card_recorded,
      recommendations,
      timing,
      applied,
      finished: cmd.finish,
    })
  }

  /// Fractional Kelly stake, independent of the session.
  pub fn kelly(&self, prob: f64, odd: f64, bankroll: f64, state: QuantumState) -> f64 {
    self.kelly.stake(prob, odd, bankroll, state)
  }

  /// Probability curve of `market` over the rest of regulation time.
  pub fn curve(&self, market: BetType, condition: &MatchCondition) -> Vec<(u32, f64)> {
    self.model.probability_curve(market, condition)
  }

  pub fn live_engine(&self) -> &LiveEngine {
    &self.live
  }
}
