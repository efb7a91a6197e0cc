//! Closed-form context predictors: linear scores over normalized features, then softmax.

use crate::config::HeuristicConfig;
use crate::error::{EngineError, Result};
use crate::features::{FORM_POINTS_MAX, Feature, FeatureVector};
use crate::outcome::OutcomeDistribution;
use crate::predictor::{BasePredictor, FORM_TABLE, HEAD_TO_HEAD, MARKET_ODDS, PredictionInput};

pub struct FormTable {
    cfg: HeuristicConfig,
}

impl FormTable {
    pub fn new(cfg: HeuristicConfig) -> Self {
        Self { cfg }
    }

    /// Positive when the home side is stronger; roughly within [-2.2, 2.2].
    pub fn strength(&self, f: &FeatureVector) -> f64 {
        let form_diff =
            (f.get(Feature::HomeFormPoints) - f.get(Feature::AwayFormPoints)) / FORM_POINTS_MAX;
        let span = (f.get(Feature::LeagueSize) - 1.0).max(1.0);
        let pos_diff = ((f.get(Feature::AwayLeaguePosition) - f.get(Feature::HomeLeaguePosition))
            / span)
            .clamp(-1.0, 1.0);
        self.cfg.form_weight * form_diff + self.cfg.position_weight * pos_diff
    }
}

impl BasePredictor for FormTable {
    fn name(&self) -> &'static str {
        FORM_TABLE
    }

    fn predict(&self, input: &PredictionInput<'_>) -> Result<OutcomeDistribution> {
        let f = input.features;
        let strength = self.strength(f);
        let bias = if f.flag(Feature::NeutralVenue) {
            0.0
        } else {
            self.cfg.home_bias
        };
        let home = 0.5 * strength + bias;
        let away = -0.5 * strength;
        let draw = self.cfg.draw_score - self.cfg.draw_gap_penalty * (strength + bias).abs();
        Ok(OutcomeDistribution::from_scores(home, draw, away))
    }
}

pub struct MarketOdds {
    cfg: HeuristicConfig,
}

impl MarketOdds {
    pub fn new(cfg: HeuristicConfig) -> Self {
        Self { cfg }
    }
}

impl BasePredictor for MarketOdds {
    fn name(&self) -> &'static str {
        MARKET_ODDS
    }

    fn predict(&self, input: &PredictionInput<'_>) -> Result<OutcomeDistribution> {
        let f = input.features;
        let Some([home, draw, away]) = f.market_probs() else {
            return Err(EngineError::InputUnavailable {
                model: MARKET_ODDS.to_string(),
                reason: "no odds-implied probabilities".to_string(),
            });
        };
        let injury_edge = self.cfg.injury_weight
            * (f.get(Feature::AwayInjuries) - f.get(Feature::HomeInjuries));
        Ok(OutcomeDistribution::from_scores(
            home.ln() + injury_edge,
            draw.ln(),
            away.ln() - injury_edge,
        ))
    }
}

/// Record of previous meetings, shrunk toward a uniform prior.
pub struct HeadToHead {
    cfg: HeuristicConfig,
}

impl HeadToHead {
    pub fn new(cfg: HeuristicConfig) -> Self {
        Self { cfg }
    }
}

impl BasePredictor for HeadToHead {
    fn name(&self) -> &'static str {
        HEAD_TO_HEAD
    }

    fn predict(&self, input: &PredictionInput<'_>) -> Result<OutcomeDistribution> {
        let f = input.features;
        let prior = self.cfg.h2h_prior_matches.max(0.0) / 3.0;
        Ok(OutcomeDistribution::from_weights(
            f.get(Feature::H2hHomeWins) + prior,
            f.get(Feature::H2hDraws) + prior,
            f.get(Feature::H2hAwayWins) + prior,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal_rate::GoalRatePair;
    use crate::outcome::Outcome;

    fn run(p: &dyn BasePredictor, features: FeatureVector) -> Result<OutcomeDistribution> {
        let input = PredictionInput {
            features: &features,
            goal_rates: GoalRatePair {
                home: 1.3,
                away: 1.3,
            },
        };
        p.predict(&input)
    }

    #[test]
    fn form_table_is_symmetric_on_neutral_ground() {
        let p = run(
            &FormTable::new(HeuristicConfig::default()),
            FeatureVector::default().with(Feature::NeutralVenue, 1.0),
        )
        .unwrap();
        assert!((p.home - p.away).abs() < 1e-12);
        assert_eq!(p.argmax(), Outcome::Draw);
    }

    #[test]
    fn form_table_favors_top_side_in_form() {
        let f = FeatureVector::default()
            .with(Feature::HomeFormPoints, 13.0)
            .with(Feature::AwayFormPoints, 2.0)
            .with(Feature::HomeLeaguePosition, 2.0)
            .with(Feature::AwayLeaguePosition, 17.0);
        let p = run(&FormTable::new(HeuristicConfig::default()), f).unwrap();
        assert!(p.home > 0.6);
    }

    #[test]
    fn market_without_odds_is_unavailable() {
        let err = run(
            &MarketOdds::new(HeuristicConfig::default()),
            FeatureVector::default(),
        )
        .unwrap_err();
        assert!(err.is_predictor_local());
    }

    #[test]
    fn market_reproduces_odds_without_injuries() {
        let f = FeatureVector::default()
            .with(Feature::OddsHomeProb, 0.55)
            .with(Feature::OddsDrawProb, 0.25)
            .with(Feature::OddsAwayProb, 0.25);
        let p = run(&MarketOdds::new(HeuristicConfig::default()), f).unwrap();
        assert!((p.home - 0.55 / 1.05).abs() < 1e-9);

        let hurt = f.with(Feature::HomeInjuries, 6.0);
        let q = run(&MarketOdds::new(HeuristicConfig::default()), hurt).unwrap();
        assert!(q.home < p.home);
    }

    #[test]
    fn head_to_head_without_meetings_is_uniform() {
        let p = run(
            &HeadToHead::new(HeuristicConfig::default()),
            FeatureVector::default(),
        )
        .unwrap();
        assert!((p.home - 1.0 / 3.0).abs() < 1e-12);

        let f = FeatureVector::default()
            .with(Feature::H2hMatches, 6.0)
            .with(Feature::H2hHomeWins, 5.0)
            .with(Feature::H2hDraws, 1.0);
        let q = run(&HeadToHead::new(HeuristicConfig::default()), f).unwrap();
        assert!((q.home - 7.0 / 12.0).abs() < 1e-12);
    }
}
