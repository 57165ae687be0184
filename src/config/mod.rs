//! Configuration Module - TOML-based Advisor Configuration
//!
//! Loads and validates configuration from `advisor.toml`.
//! Capital shares, Kelly fractions and live thresholds are
//! externalized here; every section falls back to built-in
//! defaults when it is missing from the file.

pub mod loader;

use serde::Deserialize;

/// Top-level advisor configuration.
///
/// Loaded from `advisor.toml` when `--config` is given, otherwise
/// `AppConfig::default()` is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// Advisor identity and logging.
  #[serde(default)]
  pub advisor: AdvisorConfig,
  /// Capital split between the three phases.
  #[serde(default)]
  pub allocation: AllocationConfig,
  /// Kelly sizing parameters.
  #[serde(default)]
  pub kelly: KellyConfig,
  /// In-play engine parameters.
  #[serde(default)]
  pub live: LiveConfig,
  /// Session persistence.
  #[serde(default)]
  pub persistence: PersistenceConfig,
}

/// Advisor identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorConfig {
  /// Human-readable advisor name.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Log output format: `pretty` or `json`.
  #[serde(default = "default_log_format")]
  pub log_format: String,
}

impl Default for AdvisorConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
      log_format: default_log_format(),
    }
  }
}

/// Capital allocation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AllocationConfig {
  /// Share of capital for anchor bets (phase 1).
  #[serde(default = "default_anchor_share")]
  pub anchor_share: f64,
  /// Share of capital for combination bets (phase 2).
  #[serde(default = "default_combo_share")]
  pub combo_share: f64,
  /// Share of capital for in-play bets (phase 3).
  #[serde(default = "default_live_share")]
  pub live_share: f64,
  /// Hard cap on in-play capital as share of the total.
  #[serde(default = "default_live_cap_share")]
  pub live_cap_share: f64,
  /// Minimum capital accepted at session start.
  #[serde(default = "default_min_capital")]
  pub min_capital: f64,
  /// Below this capital the anchors collapse to a single bet.
  #[serde(default = "default_low_capital_threshold")]
  pub low_capital_threshold: f64,
  /// Upper bound of the single low-capital stake.
  #[serde(default = "default_low_capital_stake")]
  pub low_capital_stake: f64,
  /// Share of anchor capital forced onto a missing mandatory market.
  #[serde(default = "default_mandatory_share")]
  pub mandatory_share: f64,
}

impl Default for AllocationConfig {
  fn default() -> Self {
    Self {
      anchor_share: default_anchor_share(),
      combo_share: default_combo_share(),
      live_share: default_live_share(),
      live_cap_share: default_live_cap_share(),
      min_capital: default_min_capital(),
      low_capital_threshold: default_low_capital_threshold(),
      low_capital_stake: default_low_capital_stake(),
      mandatory_share: default_mandatory_share(),
    }
  }
}

/// Kelly sizing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct KellyConfig {
  /// Share of full Kelly staked in a stable market.
  #[serde(default = "default_stable_fraction")]
  pub stable_fraction: f64,
  /// Share of full Kelly staked in a transition.
  #[serde(default = "default_transition_fraction")]
  pub transition_fraction: f64,
  /// Share of full Kelly staked in a chaotic market.
  #[serde(default = "default_chaotic_fraction")]
  pub chaotic_fraction: f64,
  /// Maximum single stake as fraction of bankroll.
  #[serde(default = "default_max_bankroll_fraction")]
  pub max_bankroll_fraction: f64,
}

impl Default for KellyConfig {
  fn default() -> Self {
    Self {
      stable_fraction: default_stable_fraction(),
      transition_fraction: default_transition_fraction(),
      chaotic_fraction: default_chaotic_fraction(),
      max_bankroll_fraction: default_max_bankroll_fraction(),
    }
  }
}

/// In-play engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
  /// Minimum EV (percent) before a recommendation can be applied.
  #[serde(default = "default_apply_ev_threshold")]
  pub apply_ev_threshold: f64,
}

impl Default for LiveConfig {
  fn default() -> Self {
    Self {
      apply_ev_threshold: default_apply_ev_threshold(),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersistenceConfig {
  /// Session snapshot used when `--state` is not given.
  /// Without either, the session lives in memory only.
  #[serde(default)]
  pub state_path: Option<String>,
}

// Default value functions for serde

fn default_name() -> String {
  "flux-advisor".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_log_format() -> String {
  "pretty".to_string()
}

fn default_anchor_share() -> f64 {
  0.60
}

fn default_combo_share() -> f64 {
  0.31
}

fn default_live_share() -> f64 {
  0.09
}

fn default_live_cap_share() -> f64 {
  0.12
}

fn default_min_capital() -> f64 {
  10.0
}

fn default_low_capital_threshold() -> f64 {
  20.0
}

fn default_low_capital_stake() -> f64 {
  5.0
}

fn default_mandatory_share() -> f64 {
  0.05
}

fn default_stable_fraction() -> f64 {
  0.5
}

fn default_transition_fraction() -> f64 {
  0.3
}

fn default_chaotic_fraction() -> f64 {
  0.1
}

fn default_max_bankroll_fraction() -> f64 {
  0.10
}

fn default_apply_ev_threshold() -> f64 {
  3.0
}
