use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;

use wc26_engine::artifacts::ModelSnapshot;
use wc26_engine::config::EngineConfig;
use wc26_engine::engine::Engine;
use wc26_engine::logging;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_tracing(has_flag("--verbose"));

    let path = std::env::args()
        .skip(1)
        .find(|arg| !arg.starts_with("--") && !is_flag_value(arg))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/fixture.json"));

    let mut config = match parse_path_arg("--config") {
        Some(p) => EngineConfig::load(&p)?,
        None => EngineConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(seed) = parse_u64_arg("--seed") {
        config.simulation.seed = Some(seed);
    }

    let snapshot = match parse_path_arg("--artifacts")
        .or_else(|| std::env::var("WC26_ARTIFACT_DIR").ok().map(PathBuf::from))
    {
        Some(dir) => ModelSnapshot::load(config, &dir)
            .with_context(|| format!("load model snapshot from {}", dir.display()))?,
        None => ModelSnapshot::heuristic(config)?,
    };
    let engine = Engine::new(snapshot);

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("read fixture {}", path.display()))?;
    let payload: Value = serde_json::from_str(&raw)
        .with_context(|| format!("parse fixture {}", path.display()))?;

    let out = match payload {
        Value::Array(fixtures) => {
            let mut results = Vec::with_capacity(fixtures.len());
            for result in engine.predict_batch(&fixtures) {
                results.push(result?);
            }
            serde_json::to_string_pretty(&results)?
        }
        single => serde_json::to_string_pretty(&engine.predict(&single)?)?,
    };
    println!("{out}");
    Ok(())
}

const VALUE_FLAGS: &[&str] = &["--config", "--artifacts", "--seed"];

fn is_flag_value(arg: &str) -> bool {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    args.windows(2)
        .any(|w| VALUE_FLAGS.contains(&w[0].as_str()) && w[1] == arg)
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(&format!("{name}=")) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
        {
            return Some(PathBuf::from(next.trim()));
        }
    }
    None
}

fn parse_u64_arg(name: &str) -> Option<u64> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && let Ok(v) = raw.trim().parse::<u64>()
        {
            return Some(v);
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && let Ok(v) = next.trim().parse::<u64>()
        {
            return Some(v);
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}
