use crate::config::PoissonConfig;
use crate::error::Result;
use crate::goal_rate::{GoalRatePair, poisson_pmf};
use crate::outcome::OutcomeDistribution;
use crate::predictor::{BasePredictor, POISSON_GOALS, PredictionInput};

pub struct PoissonGoals {
    cfg: PoissonConfig,
}

impl PoissonGoals {
    pub fn new(cfg: PoissonConfig) -> Self {
        Self { cfg }
    }
}

impl BasePredictor for PoissonGoals {
    fn name(&self) -> &'static str {
        POISSON_GOALS
    }

    fn predict(&self, input: &PredictionInput<'_>) -> Result<OutcomeDistribution> {
        Ok(outcome_probs_poisson(
            input.goal_rates,
            self.cfg.max_goals,
            self.cfg.dc_rho,
        ))
    }
}

/// Triangular sums over P(home=i) * P(away=j), optionally with the Dixon-Coles
/// low-score correction.
pub fn outcome_probs_poisson(rates: GoalRatePair, max_goals: u32, rho: f64) -> OutcomeDistribution {
    let max_goals = max_goals.max(1);
    let pmf_h = poisson_pmf(rates.home, max_goals);
    let pmf_a = poisson_pmf(rates.away, max_goals);

    let mut p_home = 0.0;
    let mut p_draw = 0.0;
    let mut p_away = 0.0;

    for (i, p_i) in pmf_h.iter().enumerate() {
        for (j, p_j) in pmf_a.iter().enumerate() {
            let tau = dc_tau(i, j, rates.home, rates.away, rho);
            let p = (p_i * p_j * tau).max(0.0);
            if i > j {
                p_home += p;
            } else if i < j {
                p_away += p;
            } else {
                p_draw += p;
            }
        }
    }

    // Guard against tiny float drift.
    OutcomeDistribution::from_weights(p_home, p_draw, p_away)
}

fn dc_tau(home_goals: usize, away_goals: usize, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    if rho == 0.0 {
        return 1.0;
    }
    match (home_goals, away_goals) {
        (0, 0) => 1.0 - lambda_home * lambda_away * rho,
        (0, 1) => 1.0 + lambda_home * rho,
        (1, 0) => 1.0 + lambda_away * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}
