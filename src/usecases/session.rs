//! Session Controller - Phase Gating and Recovery
//!
//! Owns everything the advisor remembers between commands:
//! - Capital, locked once set until the session is reset
//! - The current phase and the two confirmation flags
//! - Per-phase working state (anchors, combinations, live)
//! - Consistency checks applied to every loaded snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::error::{AdvisorError, AdvisorResult};
use crate::domain::market::{BetPortfolio, Phase};

use super::anchors::AnchorState;
use super::combos::ComboState;
use super::live::LiveState;

/// One advisory session (a single match cycle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
  pub id: Uuid,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub phase: Phase,
  pub portfolio: BetPortfolio,
  #[serde(default)]
  pub initial_confirmed: bool,
  #[serde(default)]
  pub multi_confirmed: bool,
  #[serde(default)]
  pub anchors: AnchorState,
  #[serde(default)]
  pub combos: ComboState,
  #[serde(default)]
  pub live: LiveState,
  /// Cycles closed with `finish` since the capital was set.
  #[serde(default)]
  pub cycles_completed: u32,
}

impl Default for Session {
  fn default() -> Self {
    Self::new()
  }
}

impl Session {
  pub fn new() -> Self {
    let now = Utc::now();
    Self {
      id: Uuid::new_v4(),
      created_at: now,
      updated_at: now,
      phase: Phase::InitialOdds,
      portfolio: BetPortfolio::default(),
      initial_confirmed: false,
      multi_confirmed: false,
      anchors: AnchorState::default(),
      combos: ComboState::default(),
      live: LiveState::default(),
      cycles_completed: 0,
    }
  }

  pub fn capital(&self) -> f64 {
    self.portfolio.capital
  }

  pub fn is_started(&self) -> bool {
    self.portfolio.capital > 0.0
  }

  /// Set the capital. Allowed only while it is still zero.
  ///
  /// # Errors
  /// `CapitalLocked` once set, `InvalidCapital` below `min_capital`.
  pub fn start(&mut self, capital: f64, min_capital: f64) -> AdvisorResult<()> {
    if self.is_started() {
      return Err(AdvisorError::CapitalLocked(self.portfolio.capital));
    }
    if !capital.is_finite() || capital < min_capital {
      return Err(AdvisorError::InvalidCapital {
        got: capital,
        min: min_capital,
      });
    }

    self.portfolio.capital = capital;
    info!(session = %self.id, capital, "Session started");
    Ok(())
  }

  /// Earliest phase whose confirmation is still missing.
  pub fn earliest_open_phase(&self) -> Phase {
    if !self.initial_confirmed {
      Phase::InitialOdds
    } else if !self.multi_confirmed {
      Phase::MultiBets
    } else {
      Phase::InPlay
    }
  }

  /// Check that `phase` may be entered.
  ///
  /// # Errors
  /// `NotStarted` without capital, `PhaseLocked` when an earlier
  /// phase is unconfirmed.
  pub fn require(&self, phase: Phase) -> AdvisorResult<()> {
    if !self.is_started() {
      return Err(AdvisorError::NotStarted);
    }
    let open = self.earliest_open_phase();
    if phase > open {
      return Err(AdvisorError::PhaseLocked {
        requested: phase,
        required: open,
      });
    }
    Ok(())
  }

  /// Consistency check for a loaded snapshot.
  ///
  /// In-play stakes may not exceed `live_cap_share` of the capital.
  ///
  /// # Errors
  /// `CorruptState` describing the first violation.
  pub fn validate(&self, live_cap_share: f64) -> AdvisorResult<()> {
    let corrupt = |msg: &str| Err(AdvisorError::CorruptState(msg.to_string()));
    let capital = self.portfolio.capital;

    if !capital.is_finite() || capital < 0.0 {
      return corrupt("capital is negative or not a number");
    }
    if capital == 0.0 && (self.phase != Phase::InitialOdds || self.initial_confirmed) {
      return corrupt("phase advanced without capital");
    }
    if self.multi_confirmed && !self.initial_confirmed {
      return corrupt("combinations confirmed before the anchors");
    }
    if self.initial_confirmed && self.portfolio.initial_bets.is_empty() {
      return corrupt("anchors confirmed without bets");
    }
    if self.phase > self.earliest_open_phase() {
      return corrupt("phase ahead of its confirmations");
    }
    if self.portfolio.in_play_invested() > capital * live_cap_share + 0.005 {
      return corrupt("in-play stakes exceed the live cap");
    }
    Ok(())
  }

  /// Clear everything except the capital.
  pub fn reset(&mut self) {
    let capital = self.portfolio.capital;
    let cycles = self.cycles_completed;
    *self = Self {
      id: self.id,
      created_at: self.created_at,
      portfolio: BetPortfolio::new(capital),
      cycles_completed: cycles,
      ..Self::new()
    };
    info!(session = %self.id, capital, "Session reset");
  }

  /// Apply the recovery an error calls for.
  ///
  /// Returns `true` when the session changed.
  pub fn recover(&mut self, err: &AdvisorError) -> bool {
    if err.resets_session() {
      warn!(error = %err, "Resetting session after inconsistent state");
      self.reset();
      return true;
    }
    if let Some(phase) = err.redirect() {
      warn!(error = %err, redirect = %phase, "Redirecting session");
      self.phase = phase;
      return true;
    }
    false
  }

  pub fn confirm_initial(&mut self) {
    self.initial_confirmed = true;
    self.multi_confirmed = false;
    self.phase = Phase::MultiBets;
  }

  pub fn confirm_multi(&mut self) {
    self.multi_confirmed = true;
    self.phase = Phase::InPlay;
  }

  /// Close the cycle and start a fresh one on the same capital.
  pub fn complete_cycle(&mut self) {
    self.cycles_completed += 1;
    info!(
      session = %self.id,
      cycles = self.cycles_completed,
      committed = self.portfolio.total_committed(),
      "Cycle finished"
    );
    self.reset();
  }

  pub fn touch(&mut self) {
    self.updated_at = Utc::now();
  }
}
