/// Failure modes of the prediction core.
///
/// Only `InvalidConfig` and `EnsembleNormalizationFailure` ever reach the caller of
/// `predict`. `ModelNotLoaded` and `InputUnavailable` are raised by individual base
/// predictors and absorbed by the ensemble, which drops the predictor and renormalizes
/// the remaining weights.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("model {model} is not loaded; publish its artifact and reload the snapshot")]
    ModelNotLoaded { model: String },

    #[error("model {model} has no usable input: {reason}")]
    InputUnavailable { model: String, reason: String },

    #[error("goal rate {side} {raw:.3} clamped to {clamped:.3}")]
    DegenerateGoalRate {
        side: &'static str,
        raw: f64,
        clamped: f64,
    },

    #[error(
        "ensemble weights sum to zero ({active} active predictors); check ensemble.weights"
    )]
    EnsembleNormalizationFailure { active: usize },

    #[error("invalid config {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("invalid artifact {name}: {reason}")]
    InvalidArtifact { name: String, reason: String },
}

impl EngineError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_artifact(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArtifact {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that only disqualify a single predictor.
    pub fn is_predictor_local(&self) -> bool {
        matches!(
            self,
            Self::ModelNotLoaded { .. } | Self::InputUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
