use rand::Rng;
use serde::Serialize;

use crate::config::{ScorelineConfig, SimulationConfig};
use crate::goal_rate::{GoalRatePair, poisson_pmf};
use crate::outcome::{Outcome, OutcomeDistribution, classify_outcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Scoreline {
    pub home: u32,
    pub away: u32,
}

impl Scoreline {
    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    pub fn outcome(self) -> Outcome {
        classify_outcome(self.home, self.away)
    }

    pub fn both_scored(self) -> bool {
        self.home >= 1 && self.away >= 1
    }

    pub fn total(self) -> u32 {
        self.home + self.away
    }

    pub fn is_over(self, goal_line: f64) -> bool {
        self.total() as f64 > goal_line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScorelineCell {
    #[serde(flatten)]
    pub scoreline: Scoreline,
    pub probability: f64,
}

/// `cells` is sorted by (home, away) and only holds scorelines that were drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorelineDistribution {
    pub samples: usize,
    pub cells: Vec<ScorelineCell>,
    pub both_teams_score: f64,
    pub over_line: f64,
    pub goal_line: f64,
    pub simulated_outcomes: OutcomeDistribution,
}

impl ScorelineDistribution {
    pub fn probability(&self, scoreline: Scoreline) -> f64 {
        self.cells
            .binary_search_by(|c| c.scoreline.cmp(&scoreline))
            .map(|idx| self.cells[idx].probability)
            .unwrap_or(0.0)
    }

    pub fn total_mass(&self) -> f64 {
        self.cells.iter().map(|c| c.probability).sum()
    }

    /// Highest raw frequency; ties go to the lowest (home, away).
    pub fn most_frequent(&self) -> Option<Scoreline> {
        let mut best: Option<&ScorelineCell> = None;
        for cell in &self.cells {
            if best.is_none_or(|b| cell.probability > b.probability) {
                best = Some(cell);
            }
        }
        best.map(|c| c.scoreline)
    }
}

/// Draws `cfg.samples` independent (home, away) pairs from two Poisson processes.
///
/// Each side is sampled by inverting its CDF with one uniform draw, and the draws are
/// consumed in a fixed order, so for a fixed seed raising one side's rate never lowers
/// any of that side's sampled goal counts.
pub fn simulate<R: Rng + ?Sized>(
    rates: GoalRatePair,
    cfg: &SimulationConfig,
    rng: &mut R,
) -> ScorelineDistribution {
    let max_goals = cfg.max_goals.max(1);
    let cdf_home = cumulative(&poisson_pmf(rates.home, max_goals));
    let cdf_away = cumulative(&poisson_pmf(rates.away, max_goals));

    let side = max_goals as usize + 1;
    let mut counts = vec![0usize; side * side];
    let samples = cfg.samples.max(1);

    for _ in 0..samples {
        let u_home: f64 = rng.gen_range(0.0..1.0);
        let u_away: f64 = rng.gen_range(0.0..1.0);
        let h = inverse_cdf(&cdf_home, u_home);
        let a = inverse_cdf(&cdf_away, u_away);
        counts[h * side + a] += 1;
    }

    let n = samples as f64;
    let mut cells = Vec::new();
    let mut btts = 0usize;
    let mut over = 0usize;
    let mut outcomes = [0usize; 3];

    for h in 0..side {
        for a in 0..side {
            let count = counts[h * side + a];
            if count == 0 {
                continue;
            }
            let scoreline = Scoreline::new(h as u32, a as u32);
            if scoreline.both_scored() {
                btts += count;
            }
            if scoreline.is_over(cfg.goal_line) {
                over += count;
            }
            outcomes[scoreline.outcome().index()] += count;
            cells.push(ScorelineCell {
                scoreline,
                probability: count as f64 / n,
            });
        }
    }

    ScorelineDistribution {
        samples,
        cells,
        both_teams_score: btts as f64 / n,
        over_line: over as f64 / n,
        goal_line: cfg.goal_line,
        simulated_outcomes: OutcomeDistribution::from_weights(
            outcomes[0] as f64,
            outcomes[1] as f64,
            outcomes[2] as f64,
        ),
    }
}

fn cumulative(pmf: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    let mut out: Vec<f64> = pmf
        .iter()
        .map(|p| {
            acc += p;
            acc
        })
        .collect();
    if let Some(last) = out.last_mut() {
        *last = 1.0;
    }
    out
}

fn inverse_cdf(cdf: &[f64], u: f64) -> usize {
    cdf.partition_point(|c| *c < u).min(cdf.len() - 1)
}

/// Picks the reported scoreline by `frequency × bonuses`.
///
/// Candidates agreeing with the calibrated dominant outcome get `outcome_bonus`; those
/// whose both-teams-score / over-line status matches whether the aggregate probability
/// exceeds `agreement_threshold` get `btts_bonus` / `over_bonus`. Pure frequency can
/// otherwise report e.g. 1-0 next to a 55% both-teams-score market.
pub fn select_scoreline(
    dist: &ScorelineDistribution,
    calibrated: &OutcomeDistribution,
    cfg: &ScorelineConfig,
) -> Scoreline {
    let dominant = calibrated.argmax();
    let btts_expected = dist.both_teams_score > cfg.agreement_threshold;
    let over_expected = dist.over_line > cfg.agreement_threshold;

    let mut best: Option<(Scoreline, f64)> = None;
    for cell in &dist.cells {
        let s = cell.scoreline;
        let mut score = cell.probability;
        if s.outcome() == dominant {
            score *= cfg.outcome_bonus;
        }
        if s.both_scored() == btts_expected {
            score *= cfg.btts_bonus;
        }
        if s.is_over(dist.goal_line) == over_expected {
            score *= cfg.over_bonus;
        }
        if best.is_none_or(|(_, b)| score > b) {
            best = Some((s, score));
        }
    }
    best.map(|(s, _)| s).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn run(home: f64, away: f64, seed: u64) -> ScorelineDistribution {
        let cfg = SimulationConfig {
            samples: 4_000,
            ..SimulationConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(seed);
        simulate(GoalRatePair { home, away }, &cfg, &mut rng)
    }

    #[test]
    fn mass_sums_to_one() {
        let d = run(1.6, 1.1, 7);
        assert!((d.total_mass() - 1.0).abs() < 1e-3);
        assert!(d.simulated_outcomes.is_valid());
        assert!(d.both_teams_score > 0.0 && d.both_teams_score < 1.0);
    }

    #[test]
    fn same_seed_is_reproducible() {
        assert_eq!(run(1.4, 1.2, 42), run(1.4, 1.2, 42));
    }

    #[test]
    fn raising_home_rate_never_lowers_home_wins() {
        let mut last = 0.0;
        for step in 0..8 {
            let lambda = 0.3 + step as f64 * 0.5;
            let d = run(lambda, 1.2, 99);
            assert!(d.simulated_outcomes.home >= last);
            last = d.simulated_outcomes.home;
        }
    }

    #[test]
    fn inverse_cdf_hits_expected_cells() {
        let cdf = vec![0.2, 0.5, 1.0];
        assert_eq!(inverse_cdf(&cdf, 0.0), 0);
        assert_eq!(inverse_cdf(&cdf, 0.2), 0);
        assert_eq!(inverse_cdf(&cdf, 0.21), 1);
        assert_eq!(inverse_cdf(&cdf, 0.99), 2);
    }

    fn manual(cells: &[((u32, u32), f64)], btts: f64, over: f64) -> ScorelineDistribution {
        ScorelineDistribution {
            samples: 100,
            cells: cells
                .iter()
                .map(|((h, a), p)| ScorelineCell {
                    scoreline: Scoreline::new(*h, *a),
                    probability: *p,
                })
                .collect(),
            both_teams_score: btts,
            over_line: over,
            goal_line: 2.5,
            simulated_outcomes: OutcomeDistribution::uniform(),
        }
    }

    #[test]
    fn reconciliation_prefers_btts_scoreline_when_market_says_so() {
        // 1-0 is the raw mode, but 2-1 agrees with both 55% markets.
        let d = manual(&[((1, 0), 0.14), ((1, 1), 0.12), ((2, 1), 0.12)], 0.55, 0.55);
        assert_eq!(d.most_frequent(), Some(Scoreline::new(1, 0)));
        let calibrated = OutcomeDistribution::from_weights(0.5, 0.3, 0.2);
        let picked = select_scoreline(&d, &calibrated, &ScorelineConfig::default());
        assert_eq!(picked, Scoreline::new(2, 1));
    }

    #[test]
    fn reconciliation_follows_dominant_outcome() {
        let d = manual(&[((0, 1), 0.13), ((1, 0), 0.12)], 0.2, 0.2);
        let calibrated = OutcomeDistribution::from_weights(0.5, 0.25, 0.25);
        let picked = select_scoreline(&d, &calibrated, &ScorelineConfig::default());
        assert_eq!(picked, Scoreline::new(1, 0));
    }
}
