use std::sync::Arc;

use crate::classifier::{LogisticClassifier, LogisticModel};
use crate::config::EngineConfig;
use crate::elo::RatingDifference;
use crate::error::Result;
use crate::features::FeatureVector;
use crate::goal_rate::GoalRatePair;
use crate::heuristic::{FormTable, HeadToHead, MarketOdds};
use crate::outcome::OutcomeDistribution;
use crate::win_prob::PoissonGoals;

pub const LOGISTIC_CLASSIFIER: &str = "logistic_classifier";
pub const POISSON_GOALS: &str = "poisson_goals";
pub const ELO_RATING: &str = "elo_rating";
pub const FORM_TABLE: &str = "form_table";
pub const MARKET_ODDS: &str = "market_odds";
pub const HEAD_TO_HEAD: &str = "head_to_head";

pub const KNOWN_PREDICTORS: [&str; 6] = [
    LOGISTIC_CLASSIFIER,
    POISSON_GOALS,
    ELO_RATING,
    FORM_TABLE,
    MARKET_ODDS,
    HEAD_TO_HEAD,
];

/// The goal rates are estimated once so the Poisson predictor and the scoreline
/// simulator always see the same numbers.
#[derive(Debug, Clone, Copy)]
pub struct PredictionInput<'a> {
    pub features: &'a FeatureVector,
    pub goal_rates: GoalRatePair,
}

/// A single outcome-probability estimator.
///
/// Implementations must be deterministic, free of I/O and shared mutable state, and
/// return a valid distribution (normalize defensively). Predictors backed by trained
/// parameters return `ModelNotLoaded` when those parameters are missing.
pub trait BasePredictor: Send + Sync {
    fn name(&self) -> &'static str;

    fn predict(&self, input: &PredictionInput<'_>) -> Result<OutcomeDistribution>;
}

pub struct RegisteredPredictor {
    pub predictor: Box<dyn BasePredictor>,
    pub weight: f64,
}

pub struct PredictorRegistry {
    entries: Vec<RegisteredPredictor>,
}

impl PredictorRegistry {
    /// Registers every variant in [`KNOWN_PREDICTORS`] order; zero-weight ones are skipped.
    pub fn build(config: &EngineConfig, classifier: Option<Arc<LogisticModel>>) -> Self {
        let candidates: Vec<Box<dyn BasePredictor>> = vec![
            Box::new(LogisticClassifier::new(classifier)),
            Box::new(PoissonGoals::new(config.poisson)),
            Box::new(RatingDifference::new(config.rating)),
            Box::new(FormTable::new(config.heuristic)),
            Box::new(MarketOdds::new(config.heuristic)),
            Box::new(HeadToHead::new(config.heuristic)),
        ];
        let entries = candidates
            .into_iter()
            .filter_map(|predictor| {
                let weight = config.ensemble.weight_of(predictor.name());
                (weight > 0.0).then_some(RegisteredPredictor { predictor, weight })
            })
            .collect();
        Self { entries }
    }

    pub fn from_entries(entries: Vec<RegisteredPredictor>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RegisteredPredictor] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.predictor.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PredictorWeight;

    #[test]
    fn build_keeps_registration_order_and_skips_zero_weights() {
        let mut cfg = EngineConfig::default();
        cfg.ensemble.weights = vec![
            PredictorWeight {
                name: HEAD_TO_HEAD.to_string(),
                weight: 0.5,
            },
            PredictorWeight {
                name: ELO_RATING.to_string(),
                weight: 0.5,
            },
            PredictorWeight {
                name: FORM_TABLE.to_string(),
                weight: 0.0,
            },
        ];
        let reg = PredictorRegistry::build(&cfg, None);
        assert_eq!(reg.names(), vec![ELO_RATING, HEAD_TO_HEAD]);
    }
}
