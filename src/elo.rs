use crate::config::RatingConfig;
use crate::error::Result;
use crate::features::{Feature, FeatureVector};
use crate::outcome::OutcomeDistribution;
use crate::predictor::{BasePredictor, ELO_RATING, PredictionInput};

/// Logistic link on the Elo gap; draw mass shrinks as the gap grows.
pub struct RatingDifference {
    cfg: RatingConfig,
}

impl RatingDifference {
    pub fn new(cfg: RatingConfig) -> Self {
        Self { cfg }
    }

    pub fn rating_gap(&self, features: &FeatureVector) -> f64 {
        let home_adv = if features.flag(Feature::NeutralVenue) {
            0.0
        } else {
            self.cfg.home_advantage_pts
        };
        features.get(Feature::HomeElo) + home_adv - features.get(Feature::AwayElo)
    }
}

impl BasePredictor for RatingDifference {
    fn name(&self) -> &'static str {
        ELO_RATING
    }

    fn predict(&self, input: &PredictionInput<'_>) -> Result<OutcomeDistribution> {
        let gap = self.rating_gap(input.features);
        let expected_home = expected_score(gap);
        let draw = self.cfg.draw_base * (-gap.abs() / self.cfg.draw_decay).exp();
        Ok(OutcomeDistribution::from_weights(
            (1.0 - draw) * expected_home,
            draw,
            (1.0 - draw) * (1.0 - expected_home),
        ))
    }
}

pub fn expected_score(gap: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-gap / 400.0))
}
