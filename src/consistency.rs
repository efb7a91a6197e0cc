//! Read-only cross-checks between the reported outputs. Findings are annotations only.

use std::fmt;

use serde::Serialize;

use crate::config::ConsistencyConfig;
use crate::ensemble::ModelContribution;
use crate::outcome::{Outcome, OutcomeDistribution};
use crate::simulate::{Scoreline, ScorelineDistribution};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyWarning {
    BttsContradiction {
        both_teams_score: f64,
        scoreline: Scoreline,
    },
    OverContradiction {
        over_line: f64,
        goal_line: f64,
        scoreline: Scoreline,
    },
    ScorelineOutcomeMismatch {
        dominant: Outcome,
        probability: f64,
        scoreline: Scoreline,
    },
    ModelConsensusMismatch {
        consensus: Outcome,
        models: usize,
        ensemble: Outcome,
    },
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BttsContradiction {
                both_teams_score,
                scoreline,
            } => write!(
                f,
                "both teams to score at {:.0}% but predicted {}-{} has a clean sheet",
                both_teams_score * 100.0,
                scoreline.home,
                scoreline.away
            ),
            Self::OverContradiction {
                over_line,
                goal_line,
                scoreline,
            } => write!(
                f,
                "over {goal_line} at {:.0}% but predicted {}-{} stays under",
                over_line * 100.0,
                scoreline.home,
                scoreline.away
            ),
            Self::ScorelineOutcomeMismatch {
                dominant,
                probability,
                scoreline,
            } => write!(
                f,
                "predicted {}-{} disagrees with low-confidence {} ({:.0}%)",
                scoreline.home,
                scoreline.away,
                dominant.label(),
                probability * 100.0
            ),
            Self::ModelConsensusMismatch {
                consensus,
                models,
                ensemble,
            } => write!(
                f,
                "{models} models favor {} but the ensemble favors {}",
                consensus.label(),
                ensemble.label()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConsistencyView<'a> {
    pub outcome: &'a OutcomeDistribution,
    pub scoreline: Scoreline,
    pub markets: &'a ScorelineDistribution,
    pub contributions: &'a [ModelContribution],
}

pub fn validate(view: ConsistencyView<'_>, cfg: &ConsistencyConfig) -> Vec<ConsistencyWarning> {
    let checks: [fn(&ConsistencyView<'_>, &ConsistencyConfig) -> Option<ConsistencyWarning>; 4] = [
        check_btts,
        check_over,
        check_scoreline_outcome,
        check_model_consensus,
    ];
    checks
        .iter()
        .filter_map(|check| check(&view, cfg))
        .inspect(|w| tracing::debug!(warning = %w, "consistency"))
        .collect()
}

fn check_btts(view: &ConsistencyView<'_>, cfg: &ConsistencyConfig) -> Option<ConsistencyWarning> {
    let btts = view.markets.both_teams_score;
    (btts > cfg.btts_threshold && !view.scoreline.both_scored()).then_some(
        ConsistencyWarning::BttsContradiction {
            both_teams_score: btts,
            scoreline: view.scoreline,
        },
    )
}

fn check_over(view: &ConsistencyView<'_>, cfg: &ConsistencyConfig) -> Option<ConsistencyWarning> {
    let over = view.markets.over_line;
    let goal_line = view.markets.goal_line;
    (over > cfg.over_threshold && (view.scoreline.total() as f64) < goal_line).then_some(
        ConsistencyWarning::OverContradiction {
            over_line: over,
            goal_line,
            scoreline: view.scoreline,
        },
    )
}

fn check_scoreline_outcome(
    view: &ConsistencyView<'_>,
    cfg: &ConsistencyConfig,
) -> Option<ConsistencyWarning> {
    let dominant = view.outcome.argmax();
    let probability = view.outcome.get(dominant);
    (view.scoreline.outcome() != dominant && probability < cfg.min_confidence).then_some(
        ConsistencyWarning::ScorelineOutcomeMismatch {
            dominant,
            probability,
            scoreline: view.scoreline,
        },
    )
}

fn check_model_consensus(
    view: &ConsistencyView<'_>,
    _cfg: &ConsistencyConfig,
) -> Option<ConsistencyWarning> {
    let total = view.contributions.len();
    if total == 0 {
        return None;
    }
    let mut votes = [0usize; 3];
    for c in view.contributions {
        votes[c.distribution.argmax().index()] += 1;
    }
    let ensemble = view.outcome.argmax();
    Outcome::ALL
        .into_iter()
        .find(|o| *o != ensemble && votes[o.index()] * 2 > total)
        .map(|consensus| ConsistencyWarning::ModelConsensusMismatch {
            consensus,
            models: votes[consensus.index()],
            ensemble,
        })
}
