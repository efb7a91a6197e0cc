use serde::Serialize;

use crate::config::UncertaintyConfig;
use crate::ensemble::ModelContribution;
use crate::outcome::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_agreement(agreement: f64, cfg: &UncertaintyConfig) -> Self {
        if agreement >= cfg.very_high {
            Self::VeryHigh
        } else if agreement >= cfg.high {
            Self::High
        } else if agreement >= cfg.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::VeryHigh => "very-high",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, p: f64) -> bool {
        p >= self.lower && p <= self.upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub home: Interval,
    pub draw: Interval,
    pub away: Interval,
    pub level: ConfidenceLevel,
    pub agreement: f64,
    pub models: usize,
}

impl ConfidenceInterval {
    pub fn get(&self, outcome: Outcome) -> Interval {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }
}

/// Spread of the per-model distributions before combination and calibration.
///
/// Each outcome gets `mean ± z·σ` (population σ) clamped to [0, 1]. With fewer than two
/// contributions there is no spread to measure, so every interval is the full [0, 1]
/// and the level is the lowest bucket.
pub fn estimate(contributions: &[ModelContribution], cfg: &UncertaintyConfig) -> ConfidenceInterval {
    let models = contributions.len();
    let intervals: [Interval; 3] = if models < 2 {
        [Interval {
            lower: 0.0,
            upper: 1.0,
        }; 3]
    } else {
        Outcome::ALL.map(|o| {
            let values: Vec<f64> = contributions.iter().map(|c| c.distribution.get(o)).collect();
            let (mean, std) = mean_std(&values);
            Interval {
                lower: (mean - cfg.z * std).clamp(0.0, 1.0),
                upper: (mean + cfg.z * std).clamp(0.0, 1.0),
            }
        })
    };

    let avg_width = intervals.iter().map(Interval::width).sum::<f64>() / 3.0;
    let agreement = (1.0 - avg_width).clamp(0.0, 1.0);
    let [home, draw, away] = intervals;
    ConfidenceInterval {
        home,
        draw,
        away,
        level: ConfidenceLevel::from_agreement(agreement, cfg),
        agreement,
        models,
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeDistribution;

    fn contrib(name: &str, h: f64, d: f64, a: f64) -> ModelContribution {
        ModelContribution {
            name: name.to_string(),
            distribution: OutcomeDistribution::from_weights(h, d, a),
            weight: 0.5,
        }
    }

    #[test]
    fn identical_models_agree_fully() {
        let cs = vec![contrib("a", 0.5, 0.3, 0.2), contrib("b", 0.5, 0.3, 0.2)];
        let ci = estimate(&cs, &UncertaintyConfig::default());
        assert!(ci.home.width() < 1e-12);
        assert!((ci.agreement - 1.0).abs() < 1e-12);
        assert_eq!(ci.level, ConfidenceLevel::VeryHigh);
        assert!(ci.home.contains(0.5));
    }

    #[test]
    fn disagreement_widens_intervals() {
        let cs = vec![contrib("a", 0.8, 0.1, 0.1), contrib("b", 0.1, 0.1, 0.8)];
        let ci = estimate(&cs, &UncertaintyConfig::default());
        // σ = 0.35 on home and away; both intervals clamp to [0, 1].
        assert_eq!(ci.home, Interval { lower: 0.0, upper: 1.0 });
        assert!(ci.draw.width() < 1e-9);
        assert!((ci.agreement - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(ci.level, ConfidenceLevel::Low);
    }

    #[test]
    fn moderate_spread_gives_unclamped_z_sigma_interval() {
        let cs = vec![
            contrib("a", 0.50, 0.30, 0.20),
            contrib("b", 0.45, 0.30, 0.25),
            contrib("c", 0.40, 0.30, 0.30),
        ];
        let cfg = UncertaintyConfig::default();
        let ci = estimate(&cs, &cfg);

        let homes: Vec<f64> = cs.iter().map(|c| c.distribution.home).collect();
        let mean = homes.iter().sum::<f64>() / 3.0;
        let sigma = (homes.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / 3.0).sqrt();
        assert!((ci.home.lower - (mean - 1.96 * sigma)).abs() < 1e-12);
        assert!((ci.home.upper - (mean + 1.96 * sigma)).abs() < 1e-12);
        assert!(ci.home.lower > 0.0 && ci.home.upper < 1.0);
        assert!(ci.home.contains(0.45));

        let avg_width = (ci.home.width() + ci.draw.width() + ci.away.width()) / 3.0;
        assert!((ci.agreement - (1.0 - avg_width)).abs() < 1e-12);
        assert_eq!(ci.models, 3);
        assert_eq!(ci.level, ConfidenceLevel::VeryHigh);
    }

    #[test]
    fn single_model_has_no_measurable_agreement() {
        let ci = estimate(&[contrib("a", 0.6, 0.2, 0.2)], &UncertaintyConfig::default());
        assert_eq!(ci.agreement, 0.0);
        assert_eq!(ci.level, ConfidenceLevel::Low);
        assert_eq!(ci.models, 1);
    }

    #[test]
    fn levels_follow_thresholds() {
        let cfg = UncertaintyConfig::default();
        assert_eq!(ConfidenceLevel::from_agreement(0.85, &cfg), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::from_agreement(0.70, &cfg), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_agreement(0.40, &cfg), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_agreement(0.39, &cfg), ConfidenceLevel::Low);
    }
}
