//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `advisor.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    path = %path.display(),
    anchor_share = config.allocation.anchor_share,
    combo_share = config.allocation.combo_share,
    live_share = config.allocation.live_share,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse advisor.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Phase shares in (0, 1] summing to 1
/// - A live cap no lower than the live share
/// - Kelly fractions in (0, 1]
/// - Positive capital thresholds
pub fn validate_config(config: &AppConfig) -> Result<()> {
  let alloc = &config.allocation;

  for (name, share) in [
    ("anchor_share", alloc.anchor_share),
    ("combo_share", alloc.combo_share),
    ("live_share", alloc.live_share),
    ("live_cap_share", alloc.live_cap_share),
    ("mandatory_share", alloc.mandatory_share),
  ] {
    anyhow::ensure!(
      share > 0.0 && share <= 1.0,
      "{name} must be in (0, 1], got {share}"
    );
  }

  let total = alloc.anchor_share + alloc.combo_share + alloc.live_share;
  anyhow::ensure!(
    (total - 1.0).abs() <= 1e-6,
    "Phase shares must sum to 1, got {total}"
  );
  anyhow::ensure!(
    alloc.live_cap_share >= alloc.live_share,
    "live_cap_share ({}) must not be below live_share ({})",
    alloc.live_cap_share,
    alloc.live_share
  );

  anyhow::ensure!(
    alloc.min_capital > 0.0,
    "min_capital must be positive, got {}",
    alloc.min_capital
  );
  anyhow::ensure!(
    alloc.low_capital_threshold >= alloc.min_capital,
    "low_capital_threshold must be >= min_capital"
  );
  anyhow::ensure!(
    alloc.low_capital_stake > 0.0,
    "low_capital_stake must be positive"
  );

  let kelly = &config.kelly;
  for (name, fraction) in [
    ("stable_fraction", kelly.stable_fraction),
    ("transition_fraction", kelly.transition_fraction),
    ("chaotic_fraction", kelly.chaotic_fraction),
    ("max_bankroll_fraction", kelly.max_bankroll_fraction),
  ] {
    anyhow::ensure!(
      fraction > 0.0 && fraction <= 1.0,
      "Kelly {name} must be in (0, 1], got {fraction}"
    );
  }

  anyhow::ensure!(
    config.live.apply_ev_threshold.is_finite(),
    "apply_ev_threshold must be finite"
  );

  let level = config.advisor.log_level.to_ascii_lowercase();
  anyhow::ensure!(
    ["trace", "debug", "info", "warn", "error"].contains(&level.as_str()),
    "Unknown log_level {:?}",
    config.advisor.log_level
  );
  anyhow::ensure!(
    ["pretty", "json"].contains(&config.advisor.log_format.as_str()),
    "log_format must be \"pretty\" or \"json\", got {:?}",
    config.advisor.log_format
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_sample_file_is_valid() {
    let config = load_config("advisor.toml").unwrap();
    assert_eq!(config.allocation.live_cap_share, 0.12);
    assert!(config.persistence.state_path.is_none());
  }

  #[test]
  fn test_defaults_are_valid() {
    assert!(validate_config(&AppConfig::default()).is_ok());
  }

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = parse_config("").unwrap();
    assert_eq!(config.allocation.anchor_share, 0.60);
    assert_eq!(config.kelly.chaotic_fraction, 0.1);
    assert_eq!(config.live.apply_ev_threshold, 3.0);
    assert!(config.persistence.state_path.is_none());
  }

  #[test]
  fn test_partial_section_override() {
    let config = parse_config(
      r#"
      [advisor]
      log_level = "debug"
      log_format = "json"

      [kelly]
      stable_fraction = 0.4
      "#,
    )
    .unwrap();
    assert_eq!(config.advisor.log_level, "debug");
    assert_eq!(config.advisor.name, "flux-advisor");
    assert_eq!(config.kelly.stable_fraction, 0.4);
    assert_eq!(config.kelly.transition_fraction, 0.3);
  }

  #[test]
  fn test_shares_must_sum_to_one() {
    let err = parse_config(
      r#"
      [allocation]
      anchor_share = 0.7
      "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("sum to 1"));
  }

  #[test]
  fn test_kelly_fraction_range() {
    let result = parse_config(
      r#"
      [kelly]
      chaotic_fraction = 0.0
      "#,
    );
    assert!(result.is_err());
  }

  #[test]
  fn test_unknown_log_format() {
    let result = parse_config(
      r#"
      [advisor]
      log_format = "xml"
      "#,
    );
    assert!(result.is_err());
  }
}
