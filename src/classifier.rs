use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::features::{Feature, FeatureVector};
use crate::outcome::OutcomeDistribution;
use crate::predictor::{BasePredictor, LOGISTIC_CLASSIFIER, PredictionInput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogitParams {
    pub inputs: Vec<String>,
    #[serde(default)]
    pub means: Vec<f64>,
    #[serde(default)]
    pub stds: Vec<f64>,
    pub coefficients: [Vec<f64>; 3],
    #[serde(default)]
    pub intercepts: [f64; 3],
    #[serde(default)]
    pub train_log_loss: f64,
    #[serde(default)]
    pub val_log_loss: f64,
    #[serde(default)]
    pub train_samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultinomialLogit {
    means: Vec<f64>,
    stds: Vec<f64>,
    coefficients: [Vec<f64>; 3],
    intercepts: [f64; 3],
}

impl MultinomialLogit {
    pub fn from_params(name: &str, params: &LogitParams) -> Result<Self> {
        let width = params.inputs.len();
        if width == 0 {
            return Err(EngineError::invalid_artifact(name, "no inputs"));
        }
        for (class, row) in params.coefficients.iter().enumerate() {
            if row.len() != width {
                return Err(EngineError::invalid_artifact(
                    name,
                    format!(
                        "coefficient row {class} has {} entries, expected {width}",
                        row.len()
                    ),
                ));
            }
        }
        for (label, v) in [("means", &params.means), ("stds", &params.stds)] {
            if !v.is_empty() && v.len() != width {
                return Err(EngineError::invalid_artifact(
                    name,
                    format!("{label} has {} entries, expected {width}", v.len()),
                ));
            }
        }
        let finite = params
            .coefficients
            .iter()
            .flatten()
            .chain(params.intercepts.iter())
            .chain(params.means.iter())
            .chain(params.stds.iter())
            .all(|v| v.is_finite());
        if !finite {
            return Err(EngineError::invalid_artifact(name, "non-finite parameter"));
        }

        Ok(Self {
            means: params.means.clone(),
            stds: params.stds.clone(),
            coefficients: params.coefficients.clone(),
            intercepts: params.intercepts,
        })
    }

    pub fn width(&self) -> usize {
        self.coefficients[0].len()
    }

    pub fn predict(&self, raw: &[f64]) -> OutcomeDistribution {
        let mut scores = self.intercepts;
        for (idx, x) in raw.iter().take(self.width()).enumerate() {
            let z = self.standardized(*x, idx);
            for (class, row) in self.coefficients.iter().enumerate() {
                scores[class] += row[idx] * z;
            }
        }
        OutcomeDistribution::from_scores(scores[0], scores[1], scores[2])
    }

    fn standardized(&self, raw: f64, idx: usize) -> f64 {
        let mean = self.means.get(idx).copied().unwrap_or(0.0);
        let std = self.stds.get(idx).copied().unwrap_or(1.0).max(1e-6);
        (raw - mean) / std
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    columns: Vec<Feature>,
    logit: MultinomialLogit,
}

impl LogisticModel {
    pub fn from_params(name: &str, params: &LogitParams) -> Result<Self> {
        let logit = MultinomialLogit::from_params(name, params)?;
        let columns = params
            .inputs
            .iter()
            .map(|input| {
                Feature::from_name(input).ok_or_else(|| {
                    EngineError::invalid_artifact(name, format!("unknown feature {input:?}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns, logit })
    }

    pub fn vectorize(&self, features: &FeatureVector) -> Vec<f64> {
        self.columns.iter().map(|f| features.get(*f)).collect()
    }

    pub fn predict(&self, features: &FeatureVector) -> OutcomeDistribution {
        self.logit.predict(&self.vectorize(features))
    }
}

/// The trained variant. Without an artifact it reports `ModelNotLoaded`.
pub struct LogisticClassifier {
    model: Option<Arc<LogisticModel>>,
}

impl LogisticClassifier {
    pub fn new(model: Option<Arc<LogisticModel>>) -> Self {
        Self { model }
    }
}

impl BasePredictor for LogisticClassifier {
    fn name(&self) -> &'static str {
        LOGISTIC_CLASSIFIER
    }

    fn predict(&self, input: &PredictionInput<'_>) -> Result<OutcomeDistribution> {
        let model = self.model.as_ref().ok_or_else(|| EngineError::ModelNotLoaded {
            model: LOGISTIC_CLASSIFIER.to_string(),
        })?;
        Ok(model.predict(input.features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal_rate::GoalRatePair;

    fn elo_params() -> LogitParams {
        LogitParams {
            inputs: vec!["home_elo".into(), "away_elo".into()],
            means: vec![1500.0, 1500.0],
            stds: vec![100.0, 100.0],
            coefficients: [vec![0.5, -0.5], vec![0.0, 0.0], vec![-0.5, 0.5]],
            intercepts: [0.1, 0.0, -0.1],
            train_log_loss: 0.0,
            val_log_loss: 0.0,
            train_samples: 0,
        }
    }

    #[test]
    fn vectorizes_in_artifact_column_order() {
        let model = LogisticModel::from_params("clf", &elo_params()).unwrap();
        let f = FeatureVector::default()
            .with(Feature::HomeElo, 1700.0)
            .with(Feature::AwayElo, 1400.0);
        assert_eq!(model.vectorize(&f), vec![1700.0, 1400.0]);
        let p = model.predict(&f);
        assert!(p.is_valid());
        assert!(p.home > p.away);
    }

    #[test]
    fn rejects_unknown_feature_and_bad_shape() {
        let mut params = elo_params();
        params.inputs[1] = "moon_phase".into();
        assert!(matches!(
            LogisticModel::from_params("clf", &params),
            Err(EngineError::InvalidArtifact { .. })
        ));

        let mut params = elo_params();
        params.coefficients[2].pop();
        assert!(LogisticModel::from_params("clf", &params).is_err());
    }

    #[test]
    fn missing_model_fails_loudly() {
        let features = FeatureVector::default();
        let input = PredictionInput {
            features: &features,
            goal_rates: GoalRatePair {
                home: 1.0,
                away: 1.0,
            },
        };
        let err = LogisticClassifier::new(None).predict(&input).unwrap_err();
        assert_eq!(
            err,
            EngineError::ModelNotLoaded {
                model: LOGISTIC_CLASSIFIER.to_string()
            }
        );
    }
}
