//! Core match and betting domain types.
//!
//! Defines the closed set of betting markets, the volatility label the user
//! assigns to the market, the match snapshot every heuristic reads, and the
//! portfolio that accumulates bets across the three phases.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{AdvisorError, AdvisorResult};

// ────────────────────────────────────────────
// Markets
// ────────────────────────────────────────────

/// Betting market identifier (fixed, closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BetType {
    // Core
    #[serde(rename = "under_25")]
    Under25,
    #[serde(rename = "over_15_fh")]
    Over15FirstHalf,
    #[serde(rename = "both_to_score")]
    BothToScore,
    #[serde(rename = "both_to_score_no")]
    BothToScoreNo,
    #[serde(rename = "winner")]
    Winner,
    #[serde(rename = "home_win")]
    HomeWin,
    #[serde(rename = "away_win")]
    AwayWin,
    #[serde(rename = "draw")]
    Draw,
    // Hedges
    #[serde(rename = "over_25")]
    Over25,
    #[serde(rename = "under_35")]
    Under35,
    #[serde(rename = "no_goal")]
    NoGoal,
    // Special scenarios
    #[serde(rename = "next_goal_home")]
    NextGoalHome,
    #[serde(rename = "next_goal_away")]
    NextGoalAway,
    #[serde(rename = "goal_next_5_min")]
    GoalNext5Min,
    #[serde(rename = "double_chance_underdog")]
    DoubleChanceUnderdog,
    #[serde(rename = "over_15_match")]
    Over15Match,
    #[serde(rename = "away_handicap")]
    AwayHandicap,
    #[serde(rename = "no_more_goals")]
    NoMoreGoals,
    #[serde(rename = "next_goal_losing_team")]
    NextGoalLosingTeam,
}

impl BetType {
    /// Every market, in declaration order.
    pub const ALL: [Self; 19] = [
        Self::Under25,
        Self::Over15FirstHalf,
        Self::BothToScore,
        Self::BothToScoreNo,
        Self::Winner,
        Self::HomeWin,
        Self::AwayWin,
        Self::Draw,
        Self::Over25,
        Self::Under35,
        Self::NoGoal,
        Self::NextGoalHome,
        Self::NextGoalAway,
        Self::GoalNext5Min,
        Self::DoubleChanceUnderdog,
        Self::Over15Match,
        Self::AwayHandicap,
        Self::NoMoreGoals,
        Self::NextGoalLosingTeam,
    ];

    /// Stable snake_case key, used for parsing, display and the historical table.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Under25 => "under_25",
            Self::Over15FirstHalf => "over_15_fh",
            Self::BothToScore => "both_to_score",
            Self::BothToScoreNo => "both_to_score_no",
            Self::Winner => "winner",
            Self::HomeWin => "home_win",
            Self::AwayWin => "away_win",
            Self::Draw => "draw",
            Self::Over25 => "over_25",
            Self::Under35 => "under_35",
            Self::NoGoal => "no_goal",
            Self::NextGoalHome => "next_goal_home",
            Self::NextGoalAway => "next_goal_away",
            Self::GoalNext5Min => "goal_next_5_min",
            Self::DoubleChanceUnderdog => "double_chance_underdog",
            Self::Over15Match => "over_15_match",
            Self::AwayHandicap => "away_handicap",
            Self::NoMoreGoals => "no_more_goals",
            Self::NextGoalLosingTeam => "next_goal_losing_team",
        }
    }

    /// Human-readable market name.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Under25 => "Under 2.5 Goals",
            Self::Over15FirstHalf => "Over 1.5 Goals (1st Half)",
            Self::BothToScore => "Both Teams to Score",
            Self::BothToScoreNo => "Both Teams to Score - No",
            Self::Winner => "Match Winner",
            Self::HomeWin => "Home Win",
            Self::AwayWin => "Away Win",
            Self::Draw => "Draw",
            Self::Over25 => "Over 2.5 Goals",
            Self::Under35 => "Under 3.5 Goals",
            Self::NoGoal => "No Goal",
            Self::NextGoalHome => "Next Goal - Home",
            Self::NextGoalAway => "Next Goal - Away",
            Self::GoalNext5Min => "Goal in Next 5 Minutes",
            Self::DoubleChanceUnderdog => "Underdog Double Chance",
            Self::Over15Match => "Over 1.5 Goals (Match)",
            Self::AwayHandicap => "Away Handicap",
            Self::NoMoreGoals => "No More Goals",
            Self::NextGoalLosingTeam => "Next Goal - Losing Team",
        }
    }

    /// Opposite market for hedging, if one exists.
    pub const fn opposite(self) -> Option<Self> {
        match self {
            Self::HomeWin => Some(Self::AwayWin),
            Self::AwayWin => Some(Self::HomeWin),
            Self::Over25 => Some(Self::Under25),
            Self::Under25 => Some(Self::Over25),
            Self::BothToScore => Some(Self::BothToScoreNo),
            Self::NextGoalHome => Some(Self::NextGoalAway),
            Self::NextGoalAway => Some(Self::NextGoalHome),
            _ => None,
        }
    }

    /// Whether this is a goal-line (under/over) market.
    pub const fn is_under_over(self) -> bool {
        matches!(
            self,
            Self::Under25 | Self::Over25 | Self::Under35 | Self::Over15FirstHalf | Self::Over15Match
        )
    }

    /// Whether this is a match-result market.
    pub const fn is_winner_type(self) -> bool {
        matches!(self, Self::HomeWin | Self::AwayWin | Self::Draw | Self::Winner)
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for BetType {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|bt| bt.key() == wanted)
            .ok_or_else(|| AdvisorError::UnknownMarket(s.to_string()))
    }
}

// ────────────────────────────────────────────
// Volatility label
// ────────────────────────────────────────────

/// Market volatility as judged by the user. Never inferred from data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantumState {
    /// Predictable movement, low volatility.
    #[default]
    Stable,
    /// The pattern is shifting.
    Transition,
    /// High volatility, unpredictable.
    Chaotic,
}

impl QuantumState {
    /// Numeric volatility used by the protection/attack ratios.
    pub const fn volatility_factor(self) -> f64 {
        match self {
            Self::Stable => 0.3,
            Self::Transition => 0.6,
            Self::Chaotic => 0.9,
        }
    }

    /// Default share of full Kelly staked in this state.
    pub const fn risk_fraction(self) -> f64 {
        match self {
            Self::Stable => 0.5,
            Self::Transition => 0.3,
            Self::Chaotic => 0.1,
        }
    }
}

impl fmt::Display for QuantumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Transition => write!(f, "transition"),
            Self::Chaotic => write!(f, "chaotic"),
        }
    }
}

impl FromStr for QuantumState {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "transition" => Ok(Self::Transition),
            "chaotic" => Ok(Self::Chaotic),
            _ => Err(AdvisorError::UnknownVolatility(s.to_string())),
        }
    }
}

// ────────────────────────────────────────────
// Session phases
// ────────────────────────────────────────────

/// The three advisory phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    InitialOdds,
    MultiBets,
    InPlay,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitialOdds => write!(f, "phase 1 (anchors)"),
            Self::MultiBets => write!(f, "phase 2 (combinations)"),
            Self::InPlay => write!(f, "phase 3 (in-play)"),
        }
    }
}

/// Team side, used by events that belong to one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl FromStr for Side {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" => Ok(Self::Home),
            "away" => Ok(Self::Away),
            _ => Err(AdvisorError::UnknownSide(s.to_string())),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "home"),
            Self::Away => write!(f, "away"),
        }
    }
}

// ────────────────────────────────────────────
// Match snapshot
// ────────────────────────────────────────────

/// Current score, serialized as `"home-away"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    /// Most goals a side can be credited with.
    pub const MAX_GOALS: u32 = 99;

    pub const fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    pub const fn total(self) -> u32 {
        self.home.saturating_add(self.away)
    }

    pub const fn is_plausible(self) -> bool {
        self.home <= Self::MAX_GOALS && self.away <= Self::MAX_GOALS
    }

    /// Home goals minus away goals.
    pub fn diff(self) -> i64 {
        i64::from(self.home) - i64::from(self.away)
    }

    pub const fn both_scored(self) -> bool {
        self.home > 0 && self.away > 0
    }
}

impl FromStr for Score {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AdvisorError::InvalidScore(s.to_string());
        let (home, away) = s.trim().split_once('-').ok_or_else(invalid)?;
        let home = home.trim().parse().map_err(|_| invalid())?;
        let away = away.trim().parse().map_err(|_| invalid())?;
        let score = Self { home, away };
        if !score.is_plausible() {
            return Err(invalid());
        }
        Ok(score)
    }
}

impl TryFrom<String> for Score {
    type Error = AdvisorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Score> for String {
    fn from(score: Score) -> Self {
        score.to_string()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// Snapshot of the match at one moment. Recreated wherever needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCondition {
    pub score: Score,
    pub minute: u32,
    pub home_pressure: f64,
    pub away_pressure: f64,
    /// Free-form context tags (`high_stakes`, `derby`, ...).
    #[serde(default)]
    pub context: BTreeSet<String>,
}

impl Default for MatchCondition {
    fn default() -> Self {
        Self {
            score: Score::default(),
            minute: 0,
            home_pressure: 0.5,
            away_pressure: 0.5,
            context: BTreeSet::new(),
        }
    }
}

impl MatchCondition {
    /// Latest minute accepted (extra time included).
    pub const MAX_MINUTE: u32 = 120;

    /// Build a validated snapshot.
    ///
    /// # Errors
    /// Rejects implausible scores, minutes above 120 and pressures
    /// outside `[0, 1]`.
    pub fn new(
        score: Score,
        minute: u32,
        home_pressure: f64,
        away_pressure: f64,
    ) -> AdvisorResult<Self> {
        if !score.is_plausible() {
            return Err(AdvisorError::InvalidScore(score.to_string()));
        }
        if minute > Self::MAX_MINUTE {
            return Err(AdvisorError::InvalidMinute(minute));
        }
        for pressure in [home_pressure, away_pressure] {
            if !(0.0..=1.0).contains(&pressure) {
                return Err(AdvisorError::InvalidPressure(pressure));
            }
        }
        Ok(Self {
            score,
            minute,
            home_pressure,
            away_pressure,
            context: BTreeSet::new(),
        })
    }

    /// Add a context tag.
    #[must_use]
    pub fn with_context(mut self, tag: &str) -> Self {
        self.context.insert(tag.to_string());
        self
    }

    /// Same snapshot at another minute.
    #[must_use]
    pub fn at_minute(&self, minute: u32) -> Self {
        Self {
            minute,
            ..self.clone()
        }
    }

    pub fn has_context(&self, tag: &str) -> bool {
        self.context.contains(tag)
    }

    /// Home pressure minus away pressure.
    pub fn pressure_diff(&self) -> f64 {
        self.home_pressure - self.away_pressure
    }

    /// Elapsed share of regulation time, capped at 1.
    pub fn time_factor(&self) -> f64 {
        (f64::from(self.minute) / 90.0).min(1.0)
    }
}

// ────────────────────────────────────────────
// Bets and portfolio
// ────────────────────────────────────────────

/// One allocation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumBet {
    pub bet_type: BetType,
    pub amount: f64,
    pub odd: f64,
    pub probability: f64,
    /// Expected value per unit staked: `probability * odd - 1`.
    pub ev: f64,
}

impl QuantumBet {
    pub fn new(bet_type: BetType, amount: f64, odd: f64, probability: f64) -> Self {
        Self {
            bet_type,
            amount,
            odd,
            probability,
            ev: probability.mul_add(odd, -1.0),
        }
    }

    /// Net profit if the bet wins.
    pub fn potential_profit(&self) -> f64 {
        self.amount * (self.odd - 1.0)
    }
}

/// A confirmed two-market combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboBet {
    pub name: String,
    pub legs: Vec<BetType>,
    pub odds: Vec<f64>,
    pub amount: f64,
}

impl ComboBet {
    /// Product of the leg odds.
    pub fn combined_odd(&self) -> f64 {
        self.odds.iter().product()
    }
}

/// Bets accumulated across the three phases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BetPortfolio {
    pub capital: f64,
    #[serde(default)]
    pub initial_bets: BTreeMap<BetType, QuantumBet>,
    #[serde(default)]
    pub multi_bets: Vec<ComboBet>,
    #[serde(default)]
    pub in_play_bets: BTreeMap<BetType, QuantumBet>,
}

impl BetPortfolio {
    pub fn new(capital: f64) -> Self {
        Self {
            capital,
            ..Self::default()
        }
    }

    pub fn initial_invested(&self) -> f64 {
        self.initial_bets.values().map(|b| b.amount).sum()
    }

    pub fn multi_invested(&self) -> f64 {
        self.multi_bets.iter().map(|c| c.amount).sum()
    }

    pub fn in_play_invested(&self) -> f64 {
        self.in_play_bets.values().map(|b| b.amount).sum()
    }

    pub fn total_committed(&self) -> f64 {
        self.initial_invested() + self.multi_invested() + self.in_play_invested()
    }
}

// ────────────────────────────────────────────
// Behavioural adjustments
// ────────────────────────────────────────────

/// Static behavioural multipliers layered on top of the optimizer weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanBiasProfile {
    pub market_weights: BTreeMap<BetType, f64>,
    /// Context tag -> per-market multiplier.
    pub context_factors: BTreeMap<String, BTreeMap<BetType, f64>>,
}

impl Default for HumanBiasProfile {
    fn default() -> Self {
        Self::with_market_weights([
            (BetType::Under25, 1.15),
            (BetType::Winner, 1.20),
            (BetType::BothToScore, 1.10),
            (BetType::Over15Match, 0.95),
        ])
    }
}

impl HumanBiasProfile {
    /// Custom market weights with the default context factors.
    pub fn with_market_weights(weights: impl IntoIterator<Item = (BetType, f64)>) -> Self {
        let context_factors = BTreeMap::from([
            (
                "high_stakes".to_string(),
                BTreeMap::from([(BetType::Under25, 1.25)]),
            ),
            (
                "derby".to_string(),
                BTreeMap::from([(BetType::Winner, 1.30)]),
            ),
        ]);
        Self {
            market_weights: weights.into_iter().collect(),
            context_factors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bet_type_round_trip_key() {
        for bt in BetType::ALL {
            assert_eq!(bt.key().parse::<BetType>().unwrap(), bt);
        }
        assert_eq!("Over-15-FH".parse::<BetType>().unwrap(), BetType::Over15FirstHalf);
        assert!("under_15".parse::<BetType>().is_err());
    }

    #[test]
    fn test_bet_type_serde_key_matches_display() {
        let json = serde_json::to_string(&BetType::DoubleChanceUnderdog).unwrap();
        assert_eq!(json, "\"double_chance_underdog\"");
    }

    #[test]
    fn test_opposites() {
        assert_eq!(BetType::HomeWin.opposite(), Some(BetType::AwayWin));
        assert_eq!(BetType::Under25.opposite(), Some(BetType::Over25));
        assert_eq!(BetType::BothToScore.opposite(), Some(BetType::BothToScoreNo));
        assert_eq!(BetType::Draw.opposite(), None);
    }

    #[test]
    fn test_market_families() {
        assert!(BetType::Over15Match.is_under_over());
        assert!(!BetType::BothToScore.is_under_over());
        assert!(BetType::Winner.is_winner_type());
        assert!(!BetType::DoubleChanceUnderdog.is_winner_type());
    }

    #[test]
    fn test_score_parse() {
        let score: Score = " 2-1 ".parse().unwrap();
        assert_eq!(score, Score::new(2, 1));
        assert_eq!(score.total(), 3);
        assert_eq!(score.diff(), 1);
        assert!(score.both_scored());
        assert!("2:1".parse::<Score>().is_err());
        assert!("a-1".parse::<Score>().is_err());
        assert!("-1-0".parse::<Score>().is_err());
    }

    #[test]
    fn test_score_rejects_implausible_goal_counts() {
        assert_eq!("99-0".parse::<Score>().unwrap(), Score::new(99, 0));
        assert_eq!(
            "4294967295-1".parse::<Score>(),
            Err(AdvisorError::InvalidScore("4294967295-1".into()))
        );
        assert!("0-100".parse::<Score>().is_err());

        let huge = Score::new(u32::MAX, 1);
        assert_eq!(huge.total(), u32::MAX);
        assert!(matches!(
            MatchCondition::new(huge, 45, 0.5, 0.5),
            Err(AdvisorError::InvalidScore(_))
        ));
        assert!(serde_json::from_str::<Score>("\"150-2\"").is_err());
    }

    #[test]
    fn test_score_serializes_as_string() {
        let json = serde_json::to_string(&Score::new(1, 0)).unwrap();
        assert_eq!(json, "\"1-0\"");
        let back: Score = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Score::new(1, 0));
    }

    #[test]
    fn test_condition_validation() {
        assert!(MatchCondition::new(Score::default(), 121, 0.5, 0.5).is_err());
        assert!(MatchCondition::new(Score::default(), 90, 1.2, 0.5).is_err());
        let cond = MatchCondition::new(Score::new(0, 1), 45, 0.8, 0.3)
            .unwrap()
            .with_context("derby");
        assert!(cond.has_context("derby"));
        assert!((cond.pressure_diff() - 0.5).abs() < 1e-12);
        assert!((cond.time_factor() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_quantum_state_tables() {
        assert_eq!(QuantumState::Stable.risk_fraction(), 0.5);
        assert_eq!(QuantumState::Chaotic.volatility_factor(), 0.9);
        assert_eq!("Transition".parse::<QuantumState>().unwrap(), QuantumState::Transition);
        assert_eq!(
            "wild".parse::<QuantumState>(),
            Err(AdvisorError::UnknownVolatility("wild".into()))
        );
        assert_eq!(" Away ".parse::<Side>().unwrap(), Side::Away);
        assert_eq!("left".parse::<Side>(), Err(AdvisorError::UnknownSide("left".into())));
    }

    #[test]
    fn test_quantum_bet_ev() {
        let bet = QuantumBet::new(BetType::Under25, 10.0, 2.0, 0.6);
        assert!((bet.ev - 0.2).abs() < 1e-12);
        assert!((bet.potential_profit() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_portfolio_totals() {
        let mut portfolio = BetPortfolio::new(100.0);
        portfolio
            .initial_bets
            .insert(BetType::Under25, QuantumBet::new(BetType::Under25, 30.0, 1.9, 0.5));
        portfolio.multi_bets.push(ComboBet {
            name: "combo".into(),
            legs: vec![BetType::Under25, BetType::Winner],
            odds: vec![1.9, 1.5],
            amount: 20.0,
        });
        assert_eq!(portfolio.initial_invested(), 30.0);
        assert_eq!(portfolio.multi_invested(), 20.0);
        assert_eq!(portfolio.total_committed(), 50.0);
        assert!((portfolio.multi_bets[0].combined_odd() - 2.85).abs() < 1e-12);
    }

    #[test]
    fn test_portfolio_json_keys() {
        let mut portfolio = BetPortfolio::new(50.0);
        portfolio
            .initial_bets
            .insert(BetType::Over15Match, QuantumBet::new(BetType::Over15Match, 5.0, 1.7, 0.6));
        let json = serde_json::to_string(&portfolio).unwrap();
        assert!(json.contains("\"over_15_match\""));
        let back: BetPortfolio = serde_json::from_str(&json).unwrap();
        assert_eq!(back, portfolio);
    }

    #[test]
    fn test_default_bias_profile() {
        let profile = HumanBiasProfile::default();
        assert_eq!(profile.market_weights[&BetType::Winner], 1.20);
        assert_eq!(profile.context_factors["high_stakes"][&BetType::Under25], 1.25);
        assert_eq!(profile.context_factors["derby"][&BetType::Winner], 1.30);
    }
}
