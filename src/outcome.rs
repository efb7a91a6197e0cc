use serde::{Deserialize, Serialize};

pub const PROB_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];

    pub fn index(self) -> usize {
        match self {
            Outcome::Home => 0,
            Outcome::Draw => 1,
            Outcome::Away => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Home => "home win",
            Outcome::Draw => "draw",
            Outcome::Away => "away win",
        }
    }
}

pub fn classify_outcome(home_goals: u32, away_goals: u32) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

/// Probability triple over {home, draw, away}.
///
/// Values produced by the constructors in this module are always non-negative and sum
/// to one within [`PROB_EPS`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDistribution {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl OutcomeDistribution {
    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn one_hot(outcome: Outcome) -> Self {
        let mut out = [0.0; 3];
        out[outcome.index()] = 1.0;
        Self::from_array(out)
    }

    /// Builds a distribution from raw non-negative scores.
    ///
    /// Negative or non-finite entries count as zero; an all-zero vector becomes uniform.
    pub fn from_weights(home: f64, draw: f64, away: f64) -> Self {
        let clean = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        let (h, d, a) = (clean(home), clean(draw), clean(away));
        let sum = h + d + a;
        if sum <= 0.0 || !sum.is_finite() {
            return Self::uniform();
        }
        Self {
            home: h / sum,
            draw: d / sum,
            away: a / sum,
        }
    }

    pub fn from_scores(home: f64, draw: f64, away: f64) -> Self {
        let scores = [home, draw, away];
        if scores.iter().any(|s| !s.is_finite()) {
            return Self::uniform();
        }
        let mx = home.max(draw.max(away));
        let eh = (home - mx).exp();
        let ed = (draw - mx).exp();
        let ea = (away - mx).exp();
        Self::from_weights(eh, ed, ea)
    }

    pub fn from_array(values: [f64; 3]) -> Self {
        Self::from_weights(values[0], values[1], values[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.home, self.draw, self.away]
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    /// Ties resolve home, then draw, then away.
    pub fn argmax(&self) -> Outcome {
        if self.home >= self.draw && self.home >= self.away {
            Outcome::Home
        } else if self.draw >= self.away {
            Outcome::Draw
        } else {
            Outcome::Away
        }
    }

    pub fn renormalized(self) -> Self {
        Self::from_weights(self.home, self.draw, self.away)
    }

    pub fn is_valid(&self) -> bool {
        let parts = self.to_array();
        parts.iter().all(|p| p.is_finite() && *p >= 0.0)
            && (parts.iter().sum::<f64>() - 1.0).abs() <= PROB_EPS
    }
}
