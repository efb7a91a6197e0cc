//! Weighted combination of the base predictors, with an optional stacked meta-model.
//!
//! A predictor that fails (missing artifact, unusable input) is dropped and the
//! remaining static weights are renormalized; the prediction only fails when no
//! weight survives.

use serde::Serialize;

use crate::classifier::{LogitParams, MultinomialLogit};
use crate::config::{CombinationMode, EnsembleConfig};
use crate::error::{EngineError, Result};
use crate::outcome::{Outcome, OutcomeDistribution};
use crate::predictor::{KNOWN_PREDICTORS, PredictionInput, PredictorRegistry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelContribution {
    pub name: String,
    pub distribution: OutcomeDistribution,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub name: &'static str,
    pub reason: EngineError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleOutput {
    pub combined: OutcomeDistribution,
    pub weighted_mean: OutcomeDistribution,
    pub contributions: Vec<ModelContribution>,
    pub excluded: Vec<Exclusion>,
    pub meta_used: bool,
    pub meta_fallback: Option<String>,
}

/// Second-stage classifier over concatenated base outputs.
///
/// Columns are named `<predictor>:<home|draw|away>`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaModel {
    columns: Vec<(String, Outcome)>,
    logit: MultinomialLogit,
}

impl MetaModel {
    pub fn from_params(name: &str, params: &LogitParams) -> Result<Self> {
        let logit = MultinomialLogit::from_params(name, params)?;
        let columns = params
            .inputs
            .iter()
            .map(|col| parse_column(col).ok_or_else(|| {
                EngineError::invalid_artifact(name, format!("bad meta input column {col:?}"))
            }))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns, logit })
    }

    pub fn required_predictors(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for (name, _) in &self.columns {
            if !out.contains(&name.as_str()) {
                out.push(name);
            }
        }
        out
    }

    /// `None` when a required predictor did not contribute to this prediction.
    pub fn predict(&self, contributions: &[ModelContribution]) -> Option<OutcomeDistribution> {
        let mut row = Vec::with_capacity(self.columns.len());
        for (name, outcome) in &self.columns {
            let c = contributions.iter().find(|c| c.name == *name)?;
            row.push(c.distribution.get(*outcome));
        }
        Some(self.logit.predict(&row))
    }
}

fn parse_column(col: &str) -> Option<(String, Outcome)> {
    let (name, class) = col.split_once(':')?;
    let name = name.trim();
    if !KNOWN_PREDICTORS.contains(&name) {
        return None;
    }
    let outcome = match class.trim() {
        "home" => Outcome::Home,
        "draw" => Outcome::Draw,
        "away" => Outcome::Away,
        _ => return None,
    };
    Some((name.to_string(), outcome))
}

pub fn combine(
    registry: &PredictorRegistry,
    meta: Option<&MetaModel>,
    cfg: &EnsembleConfig,
    input: &PredictionInput<'_>,
) -> Result<EnsembleOutput> {
    let mut contributions = Vec::with_capacity(registry.len());
    let mut excluded = Vec::new();

    for entry in registry.entries() {
        let name = entry.predictor.name();
        match entry.predictor.predict(input) {
            Ok(dist) => contributions.push(ModelContribution {
                name: name.to_string(),
                distribution: dist.renormalized(),
                weight: entry.weight,
            }),
            Err(reason) => {
                tracing::warn!(predictor = name, error = %reason, "excluding predictor");
                excluded.push(Exclusion { name, reason });
            }
        }
    }

    renormalize_weights(&mut contributions)?;
    let weighted_mean = weighted_mean(&contributions);

    let mut meta_used = false;
    let mut meta_fallback = None;
    let combined = match (cfg.mode, meta) {
        // Without a meta artifact the weighted mean is the regular path, not a fallback.
        (CombinationMode::WeightedMean, _) | (_, None) => weighted_mean,
        (mode, Some(meta)) => match meta.predict(&contributions) {
            Some(stacked) => {
                meta_used = true;
                if mode == CombinationMode::MetaOnly {
                    stacked
                } else {
                    blend(weighted_mean, stacked, cfg.meta_blend_weight)
                }
            }
            None => {
                meta_fallback = Some("meta-model input predictor excluded".to_string());
                weighted_mean
            }
        },
    };

    if let Some(reason) = &meta_fallback {
        tracing::debug!(%reason, "using weighted mean");
    }

    Ok(EnsembleOutput {
        combined: combined.renormalized(),
        weighted_mean,
        contributions,
        excluded,
        meta_used,
        meta_fallback,
    })
}

pub fn renormalize_weights(contributions: &mut [ModelContribution]) -> Result<()> {
    let total: f64 = contributions
        .iter()
        .map(|c| c.weight)
        .filter(|w| w.is_finite() && *w > 0.0)
        .sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(EngineError::EnsembleNormalizationFailure {
            active: contributions.len(),
        });
    }
    for c in contributions.iter_mut() {
        c.weight = if c.weight.is_finite() && c.weight > 0.0 {
            c.weight / total
        } else {
            0.0
        };
    }
    Ok(())
}

pub fn weighted_mean(contributions: &[ModelContribution]) -> OutcomeDistribution {
    let mut acc = [0.0; 3];
    for c in contributions {
        for (slot, p) in acc.iter_mut().zip(c.distribution.to_array()) {
            *slot += c.weight * p;
        }
    }
    OutcomeDistribution::from_array(acc)
}

fn blend(a: OutcomeDistribution, b: OutcomeDistribution, w_b: f64) -> OutcomeDistribution {
    let w_b = w_b.clamp(0.0, 1.0);
    let w_a = 1.0 - w_b;
    OutcomeDistribution::from_weights(
        w_a * a.home + w_b * b.home,
        w_a * a.draw + w_b * b.draw,
        w_a * a.away + w_b * b.away,
    )
}
