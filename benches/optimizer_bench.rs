//! Advisor Benchmarks - Per-command Computation
//!
//! Benchmarks the domain functions behind each CLI command.
//! Every command should finish well under a frame of terminal latency.
//!
//! Run with: cargo bench --bench optimizer_bench

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use flux_advisor::config::AppConfig;
use flux_advisor::domain::kelly::KellySizer;
use flux_advisor::domain::{
    BetPortfolio, BetType, HumanBiasProfile, MatchCondition, PortfolioOptimizer,
    ProbabilityModel, QuantumBet, QuantumState, Score,
};
use flux_advisor::usecases::live::{LiveEngine, LiveState};

/// Benchmark the anchor optimizer with the default bias profile.
fn bench_optimize(c: &mut Criterion) {
    let optimizer = PortfolioOptimizer::default();
    let odds: BTreeMap<BetType, f64> = [
        (BetType::Under25, 1.85),
        (BetType::Over15FirstHalf, 2.05),
        (BetType::BothToScore, 2.05),
        (BetType::Winner, 2.15),
        (BetType::DoubleChanceUnderdog, 2.30),
        (BetType::Over15Match, 1.70),
    ]
    .into_iter()
    .collect();
    let condition = MatchCondition::default().with_context("high_stakes");
    let bias = HumanBiasProfile::default();

    c.bench_function("optimize_anchors", |b| {
        b.iter(|| {
            let _weights = optimizer.optimize(
                black_box(&odds),
                black_box(&condition),
                QuantumState::Stable,
                Some(&bias),
            );
        });
    });
}

/// Benchmark a full probability curve from kickoff.
fn bench_probability_curve(c: &mut Criterion) {
    let model = ProbabilityModel::default();
    let condition = MatchCondition::default();

    c.bench_function("probability_curve_dcu", |b| {
        b.iter(|| {
            let _curve =
                model.probability_curve(black_box(BetType::DoubleChanceUnderdog), &condition);
        });
    });
}

/// Benchmark fractional Kelly sizing through the Decimal path.
fn bench_kelly_stake(c: &mut Criterion) {
    let sizer = KellySizer::default();

    c.bench_function("kelly_stake_transition", |b| {
        b.iter(|| {
            let _stake = sizer.stake(
                black_box(0.55),
                black_box(2.10),
                black_box(1000.0),
                QuantumState::Transition,
            );
        });
    });
}

/// Benchmark one in-play evaluation (scenarios + enrichment).
fn bench_live_evaluate(c: &mut Criterion) {
    let config = AppConfig::default();
    let engine = LiveEngine::new(
        ProbabilityModel::default(),
        KellySizer::default(),
        &config.allocation,
        &config.live,
    );
    let mut portfolio = BetPortfolio::new(100.0);
    portfolio
        .initial_bets
        .insert(BetType::Under25, QuantumBet::new(BetType::Under25, 20.0, 1.85, 0.58));
    let base = LiveState {
        score: Score::new(0, 1),
        minute: 65,
        home_pressure: 0.8,
        away_pressure: 0.35,
        volatility: QuantumState::Transition,
        ..LiveState::default()
    };

    c.bench_function("live_evaluate_comeback", |b| {
        b.iter(|| {
            let mut state = base.clone();
            let _recs = engine.evaluate(black_box(&mut state), &portfolio);
        });
    });
}

criterion_group!(
    benches,
    bench_optimize,
    bench_probability_curve,
    bench_kelly_stake,
    bench_live_evaluate,
);
criterion_main!(benches);
