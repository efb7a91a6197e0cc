use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::predictor::KNOWN_PREDICTORS;

pub const MAX_SIM_SAMPLES: usize = 200_000;
pub const MAX_GOALS_CAP: u32 = 30;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ensemble: EnsembleConfig,
    pub calibration: CalibrationConfig,
    pub simulation: SimulationConfig,
    pub goal_rate: GoalRateConfig,
    pub rating: RatingConfig,
    pub poisson: PoissonConfig,
    pub heuristic: HeuristicConfig,
    pub scoreline: ScorelineConfig,
    pub uncertainty: UncertaintyConfig,
    pub consistency: ConsistencyConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationMode {
    WeightedMean,
    MetaOnly,
    Blend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorWeight {
    pub name: String,
    pub weight: f64,
}

impl PredictorWeight {
    fn new(name: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub weights: Vec<PredictorWeight>,
    pub mode: CombinationMode,
    pub meta_blend_weight: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            weights: vec![
                PredictorWeight::new("logistic_classifier", 0.25),
                PredictorWeight::new("poisson_goals", 0.25),
                PredictorWeight::new("elo_rating", 0.20),
                PredictorWeight::new("form_table", 0.10),
                PredictorWeight::new("market_odds", 0.15),
                PredictorWeight::new("head_to_head", 0.05),
            ],
            mode: CombinationMode::Blend,
            meta_blend_weight: 0.5,
        }
    }
}

impl EnsembleConfig {
    pub fn weight_of(&self, name: &str) -> f64 {
        self.weights
            .iter()
            .find(|w| w.name == name)
            .map(|w| w.weight)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// T > 1 flattens the distribution, T < 1 sharpens it, T = 1 is the identity.
    pub temperature: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { temperature: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub samples: usize,
    /// Fixed seed for reproducible runs; `None` seeds each request from OS entropy.
    pub seed: Option<u64>,
    pub max_goals: u32,
    pub goal_line: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            samples: 5_000,
            seed: None,
            max_goals: 10,
            goal_line: 2.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalRateConfig {
    pub min_rate: f64,
    pub max_rate: f64,
    /// Multiplier on the home side's expected goals (ignored on neutral venues).
    pub home_advantage: f64,
    /// Share of the head-to-head goal average in the final estimate.
    pub h2h_weight: f64,
    /// Meetings needed before the head-to-head average is blended in at full weight.
    pub h2h_min_matches: f64,
    /// Max relative swing from recent form (0.15 = ±15%).
    pub form_sensitivity: f64,
}

impl Default for GoalRateConfig {
    fn default() -> Self {
        Self {
            min_rate: 0.3,
            max_rate: 4.0,
            home_advantage: 1.25,
            h2h_weight: 0.20,
            h2h_min_matches: 3.0,
            form_sensitivity: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub home_advantage_pts: f64,
    pub draw_base: f64,
    /// Rating gap over which the draw probability decays by 1/e.
    pub draw_decay: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            home_advantage_pts: 60.0,
            draw_base: 0.30,
            draw_decay: 600.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoissonConfig {
    pub max_goals: u32,
    /// Dixon-Coles low-score correction (typically negative); 0 keeps sides independent.
    pub dc_rho: f64,
}

impl Default for PoissonConfig {
    fn default() -> Self {
        Self {
            max_goals: 10,
            dc_rho: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    pub form_weight: f64,
    pub position_weight: f64,
    pub home_bias: f64,
    pub draw_score: f64,
    pub draw_gap_penalty: f64,
    /// Log-score shift per injured player of difference.
    pub injury_weight: f64,
    pub h2h_prior_matches: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            form_weight: 1.2,
            position_weight: 1.0,
            home_bias: 0.25,
            draw_score: 0.10,
            draw_gap_penalty: 0.6,
            injury_weight: 0.04,
            h2h_prior_matches: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorelineConfig {
    /// Multiplier for candidates matching the calibrated dominant outcome.
    pub outcome_bonus: f64,
    pub btts_bonus: f64,
    pub over_bonus: f64,
    /// Aggregate market probability above which "yes" candidates get the bonus.
    pub agreement_threshold: f64,
}

impl Default for ScorelineConfig {
    fn default() -> Self {
        Self {
            outcome_bonus: 1.5,
            btts_bonus: 1.2,
            over_bonus: 1.2,
            agreement_threshold: 0.45,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintyConfig {
    pub z: f64,
    pub very_high: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for UncertaintyConfig {
    fn default() -> Self {
        Self {
            z: 1.96,
            very_high: 0.85,
            high: 0.65,
            medium: 0.40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    pub btts_threshold: f64,
    pub over_threshold: f64,
    /// Dominant-outcome probability below which a contradicting scoreline is flagged.
    pub min_confidence: f64,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            btts_threshold: 0.55,
            over_threshold: 0.55,
            min_confidence: 0.45,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read engine config {}", path.display()))?;
        let cfg = serde_json::from_str::<EngineConfig>(&raw)
            .with_context(|| format!("parse engine config {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("validate engine config {}", path.display()))?;
        Ok(cfg)
    }

    /// Applies `WC26_TEMPERATURE`, `WC26_SIM_SAMPLES` and `WC26_SEED`; unparsable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(t) = env::var("WC26_TEMPERATURE")
            .ok()
            .and_then(|val| val.trim().parse::<f64>().ok())
        {
            self.calibration.temperature = t;
        }
        if let Some(n) = env::var("WC26_SIM_SAMPLES")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
        {
            self.simulation.samples = n.clamp(100, MAX_SIM_SAMPLES);
        }
        if let Some(seed) = env::var("WC26_SEED")
            .ok()
            .and_then(|val| val.trim().parse::<u64>().ok())
        {
            self.simulation.seed = Some(seed);
        }
    }

    pub fn validate(&self) -> std::result::Result<(), EngineError> {
        let mut total = 0.0;
        for (i, w) in self.ensemble.weights.iter().enumerate() {
            if !KNOWN_PREDICTORS.contains(&w.name.as_str()) {
                return Err(EngineError::invalid_config(
                    format!("ensemble.weights[{i}].name"),
                    format!("unknown predictor {:?}", w.name),
                ));
            }
            if self.ensemble.weights[..i].iter().any(|o| o.name == w.name) {
                return Err(EngineError::invalid_config(
                    format!("ensemble.weights[{i}].name"),
                    format!("duplicate predictor {:?}", w.name),
                ));
            }
            if !w.weight.is_finite() || w.weight < 0.0 {
                return Err(EngineError::invalid_config(
                    format!("ensemble.weights[{i}].weight"),
                    "must be finite and non-negative",
                ));
            }
            total += w.weight;
        }
        if total <= 0.0 {
            return Err(EngineError::EnsembleNormalizationFailure { active: 0 });
        }
        check_unit("ensemble.meta_blend_weight", self.ensemble.meta_blend_weight)?;

        let t = self.calibration.temperature;
        if !t.is_finite() || t <= 0.0 {
            return Err(EngineError::invalid_config(
                "calibration.temperature",
                "must be finite and > 0",
            ));
        }

        if !(1..=MAX_SIM_SAMPLES).contains(&self.simulation.samples) {
            return Err(EngineError::invalid_config(
                "simulation.samples",
                format!("must be within 1..={MAX_SIM_SAMPLES}"),
            ));
        }
        check_goal_cap("simulation.max_goals", self.simulation.max_goals)?;
        check_goal_cap("poisson.max_goals", self.poisson.max_goals)?;
        if !self.simulation.goal_line.is_finite() || self.simulation.goal_line < 0.0 {
            return Err(EngineError::invalid_config(
                "simulation.goal_line",
                "must be finite and non-negative",
            ));
        }

        let g = &self.goal_rate;
        if !(g.min_rate.is_finite() && g.max_rate.is_finite())
            || g.min_rate <= 0.0
            || g.min_rate >= g.max_rate
        {
            return Err(EngineError::invalid_config(
                "goal_rate.min_rate",
                "need 0 < min_rate < max_rate",
            ));
        }
        if !g.home_advantage.is_finite() || g.home_advantage <= 0.0 {
            return Err(EngineError::invalid_config(
                "goal_rate.home_advantage",
                "must be > 0",
            ));
        }
        check_unit("goal_rate.h2h_weight", g.h2h_weight)?;
        check_unit("goal_rate.form_sensitivity", g.form_sensitivity)?;

        if self.rating.draw_decay <= 0.0 || !self.rating.draw_decay.is_finite() {
            return Err(EngineError::invalid_config("rating.draw_decay", "must be > 0"));
        }
        check_unit("rating.draw_base", self.rating.draw_base)?;

        let u = &self.uncertainty;
        if !u.z.is_finite() || u.z < 0.0 {
            return Err(EngineError::invalid_config(
                "uncertainty.z",
                "must be finite and non-negative",
            ));
        }
        if !(u.very_high >= u.high && u.high >= u.medium && u.medium >= 0.0 && u.very_high <= 1.0)
        {
            return Err(EngineError::invalid_config(
                "uncertainty",
                "thresholds must satisfy 1 >= very_high >= high >= medium >= 0",
            ));
        }

        let s = &self.scoreline;
        for (field, v) in [
            ("scoreline.outcome_bonus", s.outcome_bonus),
            ("scoreline.btts_bonus", s.btts_bonus),
            ("scoreline.over_bonus", s.over_bonus),
        ] {
            if !v.is_finite() || v < 1.0 {
                return Err(EngineError::invalid_config(field, "bonus must be >= 1"));
            }
        }
        check_unit("scoreline.agreement_threshold", s.agreement_threshold)?;

        let c = &self.consistency;
        check_unit("consistency.btts_threshold", c.btts_threshold)?;
        check_unit("consistency.over_threshold", c.over_threshold)?;
        check_unit("consistency.min_confidence", c.min_confidence)?;
        Ok(())
    }
}

fn check_unit(field: &str, v: f64) -> std::result::Result<(), EngineError> {
    if v.is_finite() && (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(EngineError::invalid_config(field, "must be within [0, 1]"))
    }
}

fn check_goal_cap(field: &str, v: u32) -> std::result::Result<(), EngineError> {
    if (1..=MAX_GOALS_CAP).contains(&v) {
        Ok(())
    } else {
        Err(EngineError::invalid_config(
            field,
            format!("must be within 1..={MAX_GOALS_CAP}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_and_weights_sum_to_one() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        let sum: f64 = cfg.ensemble.weights.iter().map(|w| w.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"calibration": {"temperature": 1.3}}"#).unwrap();
        assert_eq!(cfg.calibration.temperature, 1.3);
        assert_eq!(cfg.simulation, SimulationConfig::default());
    }

    #[test]
    fn all_zero_weights_is_normalization_failure() {
        let mut cfg = EngineConfig::default();
        for w in &mut cfg.ensemble.weights {
            w.weight = 0.0;
        }
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::EnsembleNormalizationFailure { .. })
        ));
    }

    #[test]
    fn rejects_unknown_predictor_and_bad_temperature() {
        let mut cfg = EngineConfig::default();
        cfg.ensemble.weights.push(PredictorWeight::new("lstm", 0.1));
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::InvalidConfig { .. })
        ));

        let mut cfg = EngineConfig::default();
        cfg.calibration.temperature = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unbounded_simulation_sizes() {
        let mut cfg = EngineConfig::default();
        cfg.simulation.max_goals = u32::MAX;
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::InvalidConfig { .. })
        ));

        let mut cfg = EngineConfig::default();
        cfg.poisson.max_goals = MAX_GOALS_CAP + 1;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.poisson.max_goals = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.simulation.max_goals = MAX_GOALS_CAP;
        cfg.poisson.max_goals = MAX_GOALS_CAP;
        cfg.validate().unwrap();
    }

    #[test]
    fn sample_count_must_be_in_range() {
        let mut cfg = EngineConfig::default();
        cfg.simulation.samples = usize::MAX;
        assert!(cfg.validate().is_err());

        cfg.simulation.samples = 0;
        assert!(cfg.validate().is_err());

        cfg.simulation.samples = MAX_SIM_SAMPLES;
        cfg.validate().unwrap();
    }

    #[test]
    fn negative_or_nan_z_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.uncertainty.z = -1.96;
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::InvalidConfig { .. })
        ));

        cfg.uncertainty.z = f64::NAN;
        assert!(cfg.validate().is_err());

        cfg.uncertainty.z = 0.0;
        cfg.validate().unwrap();
    }
}
