//! Trained-parameter files and the immutable snapshot every prediction reads from.
//!
//! Layout: `<dir>/<name>.json` holds an [`ArtifactEnvelope`], optionally next to a
//! `<name>.json.sha256` hex digest. A missing file leaves that model unloaded; a file
//! that is present but unreadable fails the whole load.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::{LogisticModel, LogitParams};
use crate::config::EngineConfig;
use crate::ensemble::MetaModel;
use crate::error::EngineError;
use crate::predictor::{LOGISTIC_CLASSIFIER, PredictorRegistry};

pub const CLASSIFIER_ARTIFACT: &str = LOGISTIC_CLASSIFIER;
pub const META_ARTIFACT: &str = "meta_model";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEnvelope<P> {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub generated_at: String,
    pub params: P,
}

impl<P> ArtifactEnvelope<P> {
    pub fn new(name: &str, version: &str, params: P) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            params,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelArtifacts {
    pub classifier: Option<Arc<LogisticModel>>,
    pub meta: Option<Arc<MetaModel>>,
    pub versions: Vec<(String, String)>,
}

impl ModelArtifacts {
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut out = Self::default();

        if let Some(env) = read_envelope(dir, CLASSIFIER_ARTIFACT)? {
            let model = LogisticModel::from_params(CLASSIFIER_ARTIFACT, &env.params)?;
            out.classifier = Some(Arc::new(model));
            out.versions.push((env.name, env.version));
        }
        if let Some(env) = read_envelope(dir, META_ARTIFACT)? {
            let model = MetaModel::from_params(META_ARTIFACT, &env.params)?;
            out.meta = Some(Arc::new(model));
            out.versions.push((env.name, env.version));
        }

        tracing::info!(dir = %dir.display(), loaded = out.versions.len(), "model artifacts");
        Ok(out)
    }

    /// e.g. `logistic_classifier@3+meta_model@1`, or `heuristic` when nothing is loaded.
    pub fn version_tag(&self) -> String {
        if self.versions.is_empty() {
            return "heuristic".to_string();
        }
        self.versions
            .iter()
            .map(|(name, version)| format!("{name}@{version}"))
            .collect::<Vec<_>>()
            .join("+")
    }
}

pub fn artifact_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

fn read_envelope(dir: &Path, name: &str) -> Result<Option<ArtifactEnvelope<LogitParams>>> {
    let path = artifact_path(dir, name);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "artifact absent");
        return Ok(None);
    }
    let raw = fs::read(&path).with_context(|| format!("read artifact {}", path.display()))?;
    verify_digest(&path, name, &raw)?;
    let env = serde_json::from_slice::<ArtifactEnvelope<LogitParams>>(&raw)
        .with_context(|| format!("parse artifact {}", path.display()))?;
    if env.name != name {
        return Err(EngineError::invalid_artifact(
            name,
            format!("envelope is named {:?}", env.name),
        )
        .into());
    }
    if !env.generated_at.is_empty() {
        DateTime::parse_from_rfc3339(&env.generated_at)
            .with_context(|| format!("artifact {name} generated_at"))?;
    }
    Ok(Some(env))
}

fn verify_digest(path: &Path, name: &str, raw: &[u8]) -> Result<()> {
    let sidecar = path.with_extension("json.sha256");
    if !sidecar.exists() {
        return Ok(());
    }
    let expected = fs::read_to_string(&sidecar)
        .with_context(|| format!("read digest {}", sidecar.display()))?;
    let expected = expected
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let actual = sha256_hex(raw);
    if expected != actual {
        return Err(EngineError::invalid_artifact(
            name,
            format!("sha256 mismatch: expected {expected}, got {actual}"),
        )
        .into());
    }
    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Writes `<dir>/<name>.json` and its digest sidecar via tmp + rename.
pub fn save_artifact<P: Serialize>(dir: &Path, envelope: &ArtifactEnvelope<P>) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create artifact dir {}", dir.display()))?;
    let path = artifact_path(dir, &envelope.name);
    let json = serde_json::to_string_pretty(envelope).context("serialize artifact")?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json).context("write artifact")?;

    let sidecar = path.with_extension("json.sha256");
    let sidecar_tmp = path.with_extension("json.sha256.tmp");
    fs::write(&sidecar_tmp, sha256_hex(json.as_bytes())).context("write artifact digest")?;
    fs::rename(&sidecar_tmp, &sidecar).context("swap artifact digest")?;
    fs::rename(&tmp, &path).context("swap artifact")?;
    Ok(path)
}

/// Everything a prediction reads: config, built predictors and the meta-model.
///
/// Never mutated after construction; a reload builds a new snapshot.
pub struct ModelSnapshot {
    pub config: EngineConfig,
    pub registry: PredictorRegistry,
    pub meta: Option<Arc<MetaModel>>,
    pub version: String,
    pub loaded_at: DateTime<Utc>,
}

impl ModelSnapshot {
    pub fn new(
        config: EngineConfig,
        artifacts: ModelArtifacts,
    ) -> std::result::Result<Self, EngineError> {
        config.validate()?;
        let registry = PredictorRegistry::build(&config, artifacts.classifier.clone());
        if registry.is_empty() {
            return Err(EngineError::EnsembleNormalizationFailure { active: 0 });
        }
        Ok(Self {
            registry,
            meta: artifacts.meta.clone(),
            version: artifacts.version_tag(),
            loaded_at: Utc::now(),
            config,
        })
    }

    pub fn heuristic(config: EngineConfig) -> std::result::Result<Self, EngineError> {
        Self::new(config, ModelArtifacts::default())
    }

    pub fn load(config: EngineConfig, dir: &Path) -> Result<Self> {
        let artifacts = ModelArtifacts::load_from_dir(dir)?;
        Ok(Self::new(config, artifacts)?)
    }
}

/// Shared pointer to the current snapshot. Readers clone the `Arc` and keep using it
/// even if a reload swaps in a new one mid-request.
pub struct ModelHandle {
    current: RwLock<Arc<ModelSnapshot>>,
}

impl ModelHandle {
    pub fn new(snapshot: ModelSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn current(&self) -> Arc<ModelSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn swap(&self, next: ModelSnapshot) -> Arc<ModelSnapshot> {
        let next = Arc::new(next);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(from = %guard.version, to = %next.version, "model snapshot swapped");
        std::mem::replace(&mut *guard, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_matches_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn version_tag_lists_loaded_artifacts() {
        let mut a = ModelArtifacts::default();
        assert_eq!(a.version_tag(), "heuristic");
        a.versions.push(("logistic_classifier".into(), "3".into()));
        a.versions.push(("meta_model".into(), "1".into()));
        assert_eq!(a.version_tag(), "logistic_classifier@3+meta_model@1");
    }

    #[test]
    fn heuristic_snapshot_builds_every_weighted_predictor() {
        let snap = ModelSnapshot::heuristic(EngineConfig::default()).unwrap();
        assert_eq!(snap.registry.len(), 6);
        assert!(snap.meta.is_none());
    }
}
