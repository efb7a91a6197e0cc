//! Prediction entry points: one fixture in, one calibrated `PredictionResult` out.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::artifacts::{ModelHandle, ModelSnapshot};
use crate::calibration::apply_temperature;
use crate::config::EngineConfig;
use crate::consistency::{self, ConsistencyView, ConsistencyWarning};
use crate::ensemble::{self, ModelContribution};
use crate::error::{EngineError, Result};
use crate::features::{self, FeatureIssue, FeatureVector};
use crate::goal_rate::{GoalRatePair, estimate_goal_rates};
use crate::outcome::OutcomeDistribution;
use crate::predictor::PredictionInput;
use crate::simulate::{self, Scoreline, ScorelineDistribution};
use crate::uncertainty::{self, ConfidenceInterval};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    MalformedFeature {
        issue: FeatureIssue,
    },
    GoalRateClamped {
        side: &'static str,
        raw: f64,
        clamped: f64,
    },
    PredictorExcluded {
        model: &'static str,
        reason: String,
    },
    MetaModelFallback {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub outcome: OutcomeDistribution,
    pub scoreline: Scoreline,
    pub scorelines: ScorelineDistribution,
    pub goal_rates: GoalRatePair,
    pub contributions: Vec<ModelContribution>,
    pub confidence: ConfidenceInterval,
    pub consistency_warnings: Vec<ConsistencyWarning>,
    pub diagnostics: Vec<Diagnostic>,
    pub model_version: String,
}

/// One-shot prediction without trained artifacts.
///
/// Uses `config.simulation.seed` when set, OS entropy otherwise.
pub fn predict(raw: &Value, config: &EngineConfig) -> Result<PredictionResult> {
    let snapshot = ModelSnapshot::heuristic(config.clone())?;
    let mut rng = request_rng(config.simulation.seed);
    predict_with(raw, &snapshot, &mut rng)
}

pub fn predict_with<R: Rng + ?Sized>(
    raw: &Value,
    snapshot: &ModelSnapshot,
    rng: &mut R,
) -> Result<PredictionResult> {
    let normalized = features::normalize(raw);
    let diagnostics = normalized
        .issues
        .into_iter()
        .map(|issue| Diagnostic::MalformedFeature { issue })
        .collect();
    run(&normalized.vector, snapshot, rng, diagnostics)
}

pub fn predict_vector<R: Rng + ?Sized>(
    features: &FeatureVector,
    snapshot: &ModelSnapshot,
    rng: &mut R,
) -> Result<PredictionResult> {
    run(features, snapshot, rng, Vec::new())
}

fn run<R: Rng + ?Sized>(
    features: &FeatureVector,
    snapshot: &ModelSnapshot,
    rng: &mut R,
    mut diagnostics: Vec<Diagnostic>,
) -> Result<PredictionResult> {
    let _span = tracing::debug_span!("predict", version = %snapshot.version).entered();
    let cfg = &snapshot.config;

    let estimate = estimate_goal_rates(features, &cfg.goal_rate);
    for event in estimate.clamp_events() {
        tracing::warn!(%event, "goal rate clamped");
        if let EngineError::DegenerateGoalRate { side, raw, clamped } = event {
            diagnostics.push(Diagnostic::GoalRateClamped { side, raw, clamped });
        }
    }
    let goal_rates = estimate.pair;

    let scorelines = simulate::simulate(goal_rates, &cfg.simulation, rng);

    let input = PredictionInput {
        features,
        goal_rates,
    };
    let combined = ensemble::combine(
        &snapshot.registry,
        snapshot.meta.as_deref(),
        &cfg.ensemble,
        &input,
    )?;
    diagnostics.extend(combined.excluded.iter().map(|ex| Diagnostic::PredictorExcluded {
        model: ex.name,
        reason: ex.reason.to_string(),
    }));
    if let Some(reason) = &combined.meta_fallback {
        diagnostics.push(Diagnostic::MetaModelFallback {
            reason: reason.clone(),
        });
    }

    let outcome = apply_temperature(combined.combined, cfg.calibration.temperature);
    let scoreline = simulate::select_scoreline(&scorelines, &outcome, &cfg.scoreline);
    let confidence = uncertainty::estimate(&combined.contributions, &cfg.uncertainty);

    let consistency_warnings = consistency::validate(
        ConsistencyView {
            outcome: &outcome,
            scoreline,
            markets: &scorelines,
            contributions: &combined.contributions,
        },
        &cfg.consistency,
    );

    tracing::debug!(
        home = outcome.home,
        draw = outcome.draw,
        away = outcome.away,
        home_goals = scoreline.home,
        away_goals = scoreline.away,
        warnings = consistency_warnings.len(),
        "prediction ready"
    );

    Ok(PredictionResult {
        outcome,
        scoreline,
        scorelines,
        goal_rates,
        contributions: combined.contributions,
        confidence,
        consistency_warnings,
        diagnostics,
        model_version: snapshot.version.clone(),
    })
}

fn request_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

pub struct Engine {
    handle: ModelHandle,
}

impl Engine {
    pub fn new(snapshot: ModelSnapshot) -> Self {
        Self {
            handle: ModelHandle::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        self.handle.current()
    }

    pub fn predict(&self, raw: &Value) -> Result<PredictionResult> {
        let snapshot = self.handle.current();
        let mut rng = request_rng(snapshot.config.simulation.seed);
        predict_with(raw, &snapshot, &mut rng)
    }

    pub fn predict_seeded(&self, raw: &Value, seed: u64) -> Result<PredictionResult> {
        let snapshot = self.handle.current();
        let mut rng = StdRng::seed_from_u64(seed);
        predict_with(raw, &snapshot, &mut rng)
    }

    /// Predicts fixtures in parallel against one snapshot. Fixture `i` is seeded with
    /// `seed + i` when a seed is configured.
    pub fn predict_batch(&self, fixtures: &[Value]) -> Vec<Result<PredictionResult>> {
        let snapshot = self.handle.current();
        let seed = snapshot.config.simulation.seed;
        fixtures
            .par_iter()
            .enumerate()
            .map(|(idx, raw)| {
                let mut rng = request_rng(seed.map(|s| s.wrapping_add(idx as u64)));
                predict_with(raw, &snapshot, &mut rng)
            })
            .collect()
    }

    /// Installs a freshly built snapshot; in-flight requests finish on the old one.
    pub fn reload(&self, snapshot: ModelSnapshot) -> Arc<ModelSnapshot> {
        self.handle.swap(snapshot)
    }
}
