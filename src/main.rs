//! Flux Advisor - Entry Point
//!
//! One command per invocation; the session persists between
//! invocations through the configured session store.
//!
//! Wiring sequence:
//! 1. Parse the command line
//! 2. Load advisor.toml + validate (built-in defaults without `--config`)
//! 3. Init tracing on stderr (pretty or JSON); advice goes to stdout
//! 4. Pick the session store (`--state`, `persistence.state_path`, or memory)
//! 5. Run the command against the session and print the report

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flux_advisor::adapters::persistence::{FileSessionStore, MemorySessionStore};
use flux_advisor::config::{self, AppConfig};
use flux_advisor::domain::{BetType, MatchCondition, QuantumState, Score, Side};
use flux_advisor::ports::SessionStore;
use flux_advisor::usecases::advisor::{AnchorsReport, CombosReport, LiveReport};
use flux_advisor::usecases::live::LiveInput;
use flux_advisor::usecases::{Advisor, AnchorsCommand, CombosCommand, LiveCommand, Session};

#[derive(Parser)]
#[command(name = "flux-advisor")]
#[command(about = "Three-phase capital allocation advisor for a soccer match")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (advisor.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Session file; without it the session lives in memory only
    #[arg(short, long, global = true)]
    state: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the capital for a new session
    Start {
        #[arg(long)]
        capital: f64,
    },

    /// Phase 1: anchor bets (60% of capital)
    Anchors {
        /// Override an anchor odd, e.g. `under_25=1.95`
        #[arg(long = "odd", value_parser = parse_market_odd)]
        odds: Vec<(BetType, f64)>,

        /// Run the optimizer on the current odds
        #[arg(long)]
        optimize: bool,

        /// Confirm the anchors and open phase 2
        #[arg(long)]
        confirm: bool,

        /// Give missing mandatory markets a minimum stake
        #[arg(long)]
        force_mandatory: bool,
    },

    /// Phase 2: combination bets (31% of capital)
    Combos {
        /// Add a combination by name
        #[arg(long)]
        select: Vec<String>,

        /// Override leg odds, e.g. `"Goals Combo=2.1,1.75"`
        #[arg(long = "odds", value_parser = parse_combo_odds)]
        odds: Vec<(String, [f64; 2])>,

        /// Confirm the combinations and open phase 3
        #[arg(long)]
        confirm: bool,
    },

    /// Phase 3: in-play adjustments (9% of capital)
    Live {
        /// Current score, e.g. `1-0`
        #[arg(long)]
        score: Score,

        #[arg(long)]
        minute: u32,

        /// Suggested from score and minute when omitted
        #[arg(long)]
        home_pressure: Option<f64>,

        /// Suggested from score and minute when omitted
        #[arg(long)]
        away_pressure: Option<f64>,

        /// stable, transition or chaotic
        #[arg(long)]
        volatility: QuantumState,

        /// Record a red card (home or away)
        #[arg(long)]
        red_card: Option<Side>,

        /// Apply the recommendation at this 1-based position
        #[arg(long)]
        apply: Option<usize>,

        /// Close the cycle, keeping the capital
        #[arg(long)]
        finish: bool,
    },

    /// Fractional Kelly stake
    Kelly {
        #[arg(long)]
        prob: f64,

        #[arg(long)]
        odd: f64,

        #[arg(long)]
        bankroll: f64,

        #[arg(long, default_value = "stable")]
        volatility: QuantumState,
    },

    /// Probability curve of a market until full time
    Curve {
        #[arg(long)]
        market: BetType,

        #[arg(long, default_value = "0-0")]
        score: Score,

        #[arg(long, default_value = "0")]
        minute: u32,

        #[arg(long, default_value = "0.5")]
        home_pressure: f64,

        #[arg(long, default_value = "0.5")]
        away_pressure: f64,
    },

    /// Show the session
    Status,

    /// Clear the session, keeping the capital
    Reset,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── 1. Load configuration ───────────────────────────────
    let config = match &cli.config {
        Some(path) => config::loader::load_config(path).context("Failed to load configuration")?,
        None => AppConfig::default(),
    };

    // ── 2. Initialize logging on stderr ─────────────────────
    init_tracing(&config);

    info!(
        name = %config.advisor.name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting advisor"
    );

    // ── 3. Pick the session store ───────────────────────────
    let state_path = cli
        .state
        .clone()
        .or_else(|| config.persistence.state_path.clone());

    match state_path {
        Some(path) => {
            let store = FileSessionStore::new(&path)
                .await
                .context("Failed to open session file")?;
            if !store.is_healthy().await {
                warn!(path = %path, "Session file is not readable");
            }
            run(cli.command, &config, Arc::new(store)).await
        }
        None => {
            info!("No state file configured, session lives in memory only");
            run(cli.command, &config, Arc::new(MemorySessionStore::new())).await
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.advisor.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.advisor.log_format == "json" {
        builder.json().init();
    } else {
        builder.with_target(false).compact().init();
    }
}

async fn run<S: SessionStore>(command: Commands, config: &AppConfig, store: Arc<S>) -> Result<()> {
    let advisor = Advisor::new(config, store);

    match command {
        Commands::Start { capital } => {
            advisor.execute(|a, s| a.start(s, capital)).await?;
            println!("Capital set to {capital:.2}. Next: phase 1 (anchors).");
        }
        Commands::Anchors {
            odds,
            optimize,
            confirm,
            force_mandatory,
        } => {
            let cmd = AnchorsCommand {
                odds,
                optimize,
                confirm,
                force_mandatory,
            };
            let report = advisor.execute(|a, s| a.anchors(s, &cmd)).await?;
            print_anchors(&report);
        }
        Commands::Combos {
            select,
            odds,
            confirm,
        } => {
            let cmd = CombosCommand {
                select,
                odds,
                confirm,
            };
            let report = advisor.execute(|a, s| a.combos(s, &cmd)).await?;
            print_combos(&report);
        }
        Commands::Live {
            score,
            minute,
            home_pressure,
            away_pressure,
            volatility,
            red_card,
            apply,
            finish,
        } => {
            let cmd = LiveCommand {
                input: LiveInput {
                    score,
                    minute,
                    home_pressure,
                    away_pressure,
                    volatility,
                },
                red_card,
                apply,
                finish,
            };
            let report = advisor.execute(|a, s| a.live(s, &cmd)).await?;
            print_live(&report, advisor.live_engine().apply_threshold());
        }
        Commands::Kelly {
            prob,
            odd,
            bankroll,
            volatility,
        } => {
            let stake = advisor.kelly(prob, odd, bankroll, volatility);
            println!(
                "Kelly stake ({volatility}): {stake:.2} of {bankroll:.2} ({:.2}%)",
                if bankroll > 0.0 { stake / bankroll * 100.0 } else { 0.0 }
            );
        }
        Commands::Curve {
            market,
            score,
            minute,
            home_pressure,
            away_pressure,
        } => {
            let condition = MatchCondition::new(score, minute, home_pressure, away_pressure)?;
            println!("{} from minute {minute} at {score}", market.label());
            for (m, p) in advisor.curve(market, &condition) {
                println!("  {m:>3}'  {:>5.1}%", p * 100.0);
            }
        }
        Commands::Status => print_status(&advisor.load().await?),
        Commands::Reset => {
            let session = advisor.reset().await?;
            println!("Session reset. Capital kept: {:.2}", session.capital());
        }
    }

    Ok(())
}

// ── Argument parsers ────────────────────────────────────────

fn parse_market_odd(s: &str) -> Result<(BetType, f64), String> {
    let (market, odd) = s
        .split_once('=')
        .ok_or_else(|| format!("expected market=odd, got {s:?}"))?;
    let market = market.parse::<BetType>().map_err(|e| e.to_string())?;
    let odd = odd
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid odd {odd:?}: {e}"))?;
    Ok((market, odd))
}

fn parse_combo_odds(s: &str) -> Result<(String, [f64; 2]), String> {
    let (name, odds) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected name=odd1,odd2, got {s:?}"))?;
    let parsed: Vec<f64> = odds
        .split(',')
        .map(|o| o.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid odds {odds:?}: {e}"))?;
    let [first, second] = parsed.as_slice() else {
        return Err(format!("expected two odds, got {}", parsed.len()));
    };
    Ok((name.trim().to_string(), [*first, *second]))
}

// ── Report printers ─────────────────────────────────────────

fn print_anchors(report: &AnchorsReport) {
    println!("\n{}", "=".repeat(70));
    println!("  PHASE 1 - ANCHOR BETS | Capital {:.2}", report.capital);
    println!("{}\n", "=".repeat(70));

    println!("Odds:");
    for (market, odd) in &report.odds {
        println!("  {:<28} {odd:>6.2}", market.label());
    }

    let Some(plan) = &report.plan else {
        println!("\nNo allocation yet. Run with --optimize.");
        return;
    };

    println!("\nAllocation (phase capital {:.2}):", plan.phase_capital);
    for line in &plan.lines {
        let bet = &line.bet;
        println!(
            "  {:<28} {:>8.2}  {:>5.1}%  @ {:<5.2} p={:>4.1}%  EV {:>+6.1}%  profit {:>7.2}  margin {:>+5.1}%{}",
            bet.bet_type.label(),
            bet.amount,
            line.share * 100.0,
            bet.odd,
            bet.probability * 100.0,
            bet.ev * 100.0,
            line.potential_profit,
            line.profit_margin * 100.0,
            if line.forced { "  (forced)" } else { "" }
        );
    }
    println!("  {:<28} {:>8.2}", "Total", plan.total());

    for warning in &plan.warnings {
        println!("  ! {warning}");
    }

    if report.allocated.len() > 1 {
        println!("\nCorrelations:");
        for (market, row) in report.allocated.iter().zip(&report.correlations) {
            let cells: Vec<String> = row.iter().map(|c| format!("{c:>+5.2}")).collect();
            println!("  {:<28} {}", market.label(), cells.join(" "));
        }
    }
    if report.confirmed {
        println!("\nAnchors confirmed. Next: phase 2 (combinations).");
    }
}

fn print_combos(report: &CombosReport) {
    println!("\n{}", "=".repeat(70));
    println!("  PHASE 2 - COMBINATIONS");
    println!("{}\n", "=".repeat(70));

    for offer in &report.offers {
        let mark = if report.selected.contains(&offer.name) { "x" } else { " " };
        println!(
            "  [{mark}] {:<42} @ {:.2}  {}",
            offer.name,
            offer.combined_odd(),
            offer.description
        );
    }

    let Some(plan) = &report.plan else {
        println!("\nNothing selected. Use --select <name>.");
        return;
    };

    println!("\nAllocation (phase capital {:.2}):", plan.phase_capital);
    for line in &plan.lines {
        println!(
            "  {:<42} {:>8.2}  {:>5.1}%  @ {:.2}  {}",
            line.offer.name,
            line.amount,
            line.weight * 100.0,
            line.combined_odd,
            line.tier
        );
        for note in &line.analysis {
            println!("      - {note}");
        }
    }
    if report.confirmed {
        println!("\nCombinations confirmed. Next: phase 3 (in-play).");
    }
}

fn print_live(report: &LiveReport, threshold: f64) {
    let cond = &report.condition;
    println!("\n{}", "=".repeat(70));
    println!(
        "  PHASE 3 - IN-PLAY | {} at {}' | pressure {:.2}/{:.2} | {}",
        cond.score, cond.minute, cond.home_pressure, cond.away_pressure, report.volatility
    );
    println!("  Live capital: {:.2}", report.phase_capital);
    println!("{}\n", "=".repeat(70));

    match report.red_card_recorded {
        Some(true) => println!("Red card recorded.\n"),
        Some(false) => println!("A red card was already recorded; ignored.\n"),
        None => {}
    }

    if report.recommendations.is_empty() {
        println!("No scenario triggered.");
    }
    for (i, rec) in report.recommendations.iter().enumerate() {
        let scenario = &rec.scenario;
        let priority = scenario
            .priority
            .map(|p| format!(" [{p}]"))
            .unwrap_or_default();
        let gate = rec.rejection(threshold).unwrap_or_else(|| "can apply".to_string());
        println!("{}. {}{priority}", i + 1, scenario.name);
        println!("   {}", scenario.reason);
        println!(
            "   {} @ {:.2} (min {:.2}) | p={:.1}% | EV {:+.1}% | stake {:.2} ({:.0}%) | {gate}",
            scenario.bet_type.label(),
            rec.odd,
            scenario.min_odd,
            rec.probability * 100.0,
            rec.ev_pct,
            rec.stake,
            rec.proportion * 100.0
        );
        println!(
            "   Protection {:.2} ({:.0}%) / Attack {:.2} ({:.0}%) | Kelly {:.2}",
            rec.protection_stake,
            rec.protection_ratio * 100.0,
            rec.attack_stake,
            rec.attack_ratio * 100.0,
            rec.kelly_stake
        );
        println!("   Strategy: {}", rec.strategy);
        if let Some(hedge) = &rec.hedge {
            println!(
                "   Hedge: {:.2} on {} ({:.0}%, p={:.1}%, ref @ {:.2})",
                hedge.amount,
                hedge.market.label(),
                hedge.ratio * 100.0,
                hedge.probability * 100.0,
                hedge.reference_odd
            );
        }
        if let Some(split) = &rec.split {
            println!(
                "   Split: protect {:.0}% / attack {:.0}% on {} (min @ {:.2})",
                split.protection_weight * 100.0,
                split.attack_weight * 100.0,
                split.attack_market.label(),
                split.attack_min_odd
            );
        }
    }

    if !report.timing.is_empty() {
        println!("\nTiming:");
        for (market, advice) in &report.timing {
            println!("  {:<28} {advice}", market.label());
        }
    }
    let watch: Vec<&str> = report.priority_markets.iter().map(|m| m.label()).collect();
    println!("\nWatch: {}", watch.join(", "));

    if let Some(bet) = &report.applied {
        println!(
            "\nApplied: {} {:.2} @ {:.2}",
            bet.bet_type.label(),
            bet.amount,
            bet.odd
        );
    }
    if report.finished {
        println!("\nCycle finished. Capital kept; back to phase 1.");
    }
}

fn print_status(session: &Session) {
    let portfolio = &session.portfolio;
    println!("Session {}", session.id);
    println!("  Phase:      {}", session.phase);
    println!("  Capital:    {:.2}", portfolio.capital);
    println!(
        "  Confirmed:  anchors {} | combinations {}",
        session.initial_confirmed, session.multi_confirmed
    );
    println!(
        "  Invested:   anchors {:.2} | combinations {:.2} | in-play {:.2}",
        portfolio.initial_invested(),
        portfolio.multi_invested(),
        portfolio.in_play_invested()
    );
    println!("  Cycles:     {}", session.cycles_completed);
    println!("  Updated:    {}", session.updated_at.to_rfc3339());
}
