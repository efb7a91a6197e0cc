use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};
use std::hint::black_box;

use wc26_engine::artifacts::ModelSnapshot;
use wc26_engine::config::{EngineConfig, SimulationConfig};
use wc26_engine::engine::{self, Engine};
use wc26_engine::features;
use wc26_engine::goal_rate::GoalRatePair;
use wc26_engine::simulate;

fn fixture(idx: usize) -> Value {
    json!({
        "home_elo": 1500 + (idx % 7) * 40,
        "away_elo": 1480 + (idx % 5) * 50,
        "home_league_position": 1 + idx % 20,
        "away_league_position": 20 - idx % 20,
        "home_form_points": {"total": idx % 16},
        "away_form_points": "9",
        "home_goals_for_avg": 1.6,
        "away_goals_against_avg": 1.2,
        "odds_home_prob": "48%",
        "odds_draw_prob": 0.27,
        "odds_away_prob": 0.29,
    })
}

fn bench_normalize(c: &mut Criterion) {
    let raw = fixture(3);
    c.bench_function("feature_normalize", |b| {
        b.iter(|| black_box(features::normalize(black_box(&raw))))
    });
}

fn bench_simulate(c: &mut Criterion) {
    let cfg = SimulationConfig::default();
    let rates = GoalRatePair {
        home: 1.7,
        away: 1.1,
    };
    c.bench_function("simulate_5000", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(7);
            black_box(simulate::simulate(black_box(rates), &cfg, &mut rng))
        })
    });
}

fn bench_predict(c: &mut Criterion) {
    let mut cfg = EngineConfig::default();
    cfg.simulation.seed = Some(1);
    let snapshot = ModelSnapshot::heuristic(cfg.clone()).expect("valid config");
    let raw = fixture(5);
    c.bench_function("predict_single", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(1);
            black_box(engine::predict_with(black_box(&raw), &snapshot, &mut rng).unwrap())
        })
    });

    let engine = Engine::new(ModelSnapshot::heuristic(cfg).expect("valid config"));
    let batch: Vec<Value> = (0..64).map(fixture).collect();
    c.bench_function("predict_batch_64", |b| {
        b.iter(|| black_box(engine.predict_batch(black_box(&batch))))
    });
}

criterion_group!(benches, bench_normalize, bench_simulate, bench_predict);
criterion_main!(benches);
