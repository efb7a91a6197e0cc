use serde::{Deserialize, Serialize};

use crate::config::GoalRateConfig;
use crate::error::EngineError;
use crate::features::{FORM_POINTS_MAX, Feature, FeatureVector};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalRatePair {
    pub home: f64,
    pub away: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalRateEstimate {
    pub pair: GoalRatePair,
    pub raw_home: f64,
    pub raw_away: f64,
}

impl GoalRateEstimate {
    pub fn clamp_events(&self) -> Vec<EngineError> {
        let mut out = Vec::new();
        if self.raw_home != self.pair.home {
            out.push(EngineError::DegenerateGoalRate {
                side: "home",
                raw: self.raw_home,
                clamped: self.pair.home,
            });
        }
        if self.raw_away != self.pair.away {
            out.push(EngineError::DegenerateGoalRate {
                side: "away",
                raw: self.raw_away,
                clamped: self.pair.away,
            });
        }
        out
    }
}

/// Attack/defence ratios against the league average, home advantage, form and a
/// head-to-head blend. Feeds both the Poisson outcome predictor and the simulator.
pub fn estimate_goal_rates(features: &FeatureVector, cfg: &GoalRateConfig) -> GoalRateEstimate {
    let league_avg = features.get(Feature::LeagueAvgGoals).max(0.2);

    let home_attack = features.get(Feature::HomeGoalsForAvg) / league_avg;
    let away_defence = features.get(Feature::AwayGoalsAgainstAvg) / league_avg;
    let away_attack = features.get(Feature::AwayGoalsForAvg) / league_avg;
    let home_defence = features.get(Feature::HomeGoalsAgainstAvg) / league_avg;

    let mut lambda_home = league_avg * home_attack * away_defence;
    let mut lambda_away = league_avg * away_attack * home_defence;

    if !features.flag(Feature::NeutralVenue) {
        lambda_home *= cfg.home_advantage;
    }

    lambda_home *= form_multiplier(features.get(Feature::HomeFormPoints), cfg.form_sensitivity);
    lambda_away *= form_multiplier(features.get(Feature::AwayFormPoints), cfg.form_sensitivity);

    let meetings = features.get(Feature::H2hMatches);
    if meetings > 0.0 {
        let w = cfg.h2h_weight * (meetings / cfg.h2h_min_matches.max(1.0)).min(1.0);
        lambda_home = (1.0 - w) * lambda_home + w * features.get(Feature::H2hHomeGoalsAvg);
        lambda_away = (1.0 - w) * lambda_away + w * features.get(Feature::H2hAwayGoalsAvg);
    }

    let raw_home = if lambda_home.is_finite() { lambda_home } else { cfg.min_rate };
    let raw_away = if lambda_away.is_finite() { lambda_away } else { cfg.min_rate };

    GoalRateEstimate {
        pair: GoalRatePair {
            home: raw_home.clamp(cfg.min_rate, cfg.max_rate),
            away: raw_away.clamp(cfg.min_rate, cfg.max_rate),
        },
        raw_home,
        raw_away,
    }
}

fn form_multiplier(points: f64, sensitivity: f64) -> f64 {
    let mid = FORM_POINTS_MAX / 2.0;
    let rel = ((points - mid) / mid).clamp(-1.0, 1.0);
    1.0 + sensitivity * rel
}

/// Poisson pmf for 0..=max_k with the upper tail folded into the last cell.
pub fn poisson_pmf(lambda: f64, max_k: u32) -> Vec<f64> {
    let max_k = max_k as usize;
    let mut out = vec![0.0; max_k + 1];
    let lambda = lambda.max(0.0);

    out[0] = (-lambda).exp();
    for k in 1..=max_k {
        out[k] = out[k - 1] * lambda / k as f64;
    }

    let sum: f64 = out.iter().sum();
    if sum < 1.0 {
        out[max_k] += 1.0 - sum;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pmf_sums_to_one() {
        for lambda in [0.3, 1.4, 4.0] {
            let p = poisson_pmf(lambda, 10);
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn default_features_give_home_edge() {
        let est = estimate_goal_rates(&FeatureVector::default(), &GoalRateConfig::default());
        assert!(est.pair.home > est.pair.away);
        assert!((est.pair.away - 1.35).abs() < 1e-9);
        assert!(est.clamp_events().is_empty());
    }

    #[test]
    fn neutral_venue_with_equal_stats_is_symmetric() {
        let f = FeatureVector::default().with(Feature::NeutralVenue, 1.0);
        let est = estimate_goal_rates(&f, &GoalRateConfig::default());
        assert_eq!(est.pair.home, est.pair.away);
    }

    #[test]
    fn extreme_attack_is_clamped_with_event() {
        let f = FeatureVector::default()
            .with(Feature::HomeGoalsForAvg, 6.0)
            .with(Feature::AwayGoalsAgainstAvg, 5.0)
            .with(Feature::AwayGoalsForAvg, 0.1);
        let cfg = GoalRateConfig::default();
        let est = estimate_goal_rates(&f, &cfg);
        assert_eq!(est.pair.home, cfg.max_rate);
        assert_eq!(est.pair.away, cfg.min_rate);
        assert_eq!(est.clamp_events().len(), 2);
    }

    #[test]
    fn h2h_pulls_estimate_toward_history() {
        let base = FeatureVector::default().with(Feature::NeutralVenue, 1.0);
        let with_h2h = base
            .with(Feature::H2hMatches, 5.0)
            .with(Feature::H2hHomeGoalsAvg, 3.0);
        let cfg = GoalRateConfig::default();
        let a = estimate_goal_rates(&base, &cfg).pair.home;
        let b = estimate_goal_rates(&with_h2h, &cfg).pair.home;
        assert!((b - (0.8 * a + 0.2 * 3.0)).abs() < 1e-9);
    }
}
