use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use wc26_engine::calibration::{self, LabelledPrediction, Metrics};
use wc26_engine::config::EngineConfig;
use wc26_engine::logging;
use wc26_engine::outcome::Outcome;

const DEFAULT_VAL_FRACTION: f64 = 0.2;
const DEFAULT_BINS: usize = 10;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init_tracing(false);

    let samples_path = std::env::args()
        .nth(1)
        .filter(|arg| !arg.starts_with("--"))
        .map(PathBuf::from)
        .context("usage: fit_temperature <samples.json> [--val-fraction F] [--apply CONFIG]")?;

    let raw = fs::read_to_string(&samples_path)
        .with_context(|| format!("read samples {}", samples_path.display()))?;
    let samples: Vec<LabelledPrediction> = serde_json::from_str(&raw)
        .with_context(|| format!("parse samples {}", samples_path.display()))?;
    if samples.len() < 10 {
        return Err(anyhow!("need at least 10 samples, got {}", samples.len()));
    }

    let val_fraction = parse_f64_arg("--val-fraction")
        .unwrap_or(DEFAULT_VAL_FRACTION)
        .clamp(0.0, 0.5);
    let split = samples.len() - (samples.len() as f64 * val_fraction).round() as usize;
    let (train, val) = samples.split_at(split);

    let (temperature, train_fit) = calibration::fit_temperature(train);
    let train_raw = calibration::evaluate_probs(train);

    println!("Temperature fit");
    println!("samples: {} train / {} validation", train.len(), val.len());
    println!("best T={temperature:.2}");
    print_metrics("train raw", &train_raw);
    print_metrics("train cal", &train_fit);

    if !val.is_empty() {
        let val_cal = scaled(val, temperature);
        let val_raw = calibration::evaluate_probs(val);
        let val_fit = calibration::evaluate_probs(&val_cal);
        print_metrics("val raw", &val_raw);
        print_metrics("val cal", &val_fit);
        println!("val_gain={:+.6}", val_raw.log_loss - val_fit.log_loss);
    }

    println!();
    let all_cal = scaled(&samples, temperature);
    for class in Outcome::ALL {
        let raw_bins = calibration::calibration_bins(&samples, class, DEFAULT_BINS);
        let cal_bins = calibration::calibration_bins(&all_cal, class, DEFAULT_BINS);
        println!(
            "{:<9} ece_raw={:.4} ece_cal={:.4}",
            class.label(),
            calibration::expected_calibration_error(&raw_bins),
            calibration::expected_calibration_error(&cal_bins)
        );
    }

    if let Some(config_path) = parse_path_arg("--apply") {
        let mut config = if config_path.exists() {
            EngineConfig::load(&config_path)?
        } else {
            EngineConfig::default()
        };
        config.calibration.temperature = temperature;
        config.validate()?;
        let json = serde_json::to_string_pretty(&config).context("serialize engine config")?;
        let tmp = config_path.with_extension("json.tmp");
        fs::write(&tmp, json).context("write engine config")?;
        fs::rename(&tmp, &config_path).context("swap engine config")?;
        println!("Applied T={temperature:.2} to {}", config_path.display());
    }

    Ok(())
}

fn scaled(samples: &[LabelledPrediction], temperature: f64) -> Vec<LabelledPrediction> {
    samples
        .iter()
        .map(|s| LabelledPrediction {
            prediction: calibration::apply_temperature(s.prediction, temperature),
            outcome: s.outcome,
        })
        .collect()
}

fn print_metrics(label: &str, m: &Metrics) {
    println!(
        "{label:<9} n={} ll={:.4} brier={:.4} acc={:.3}",
        m.samples, m.log_loss, m.brier, m.accuracy
    );
}

fn parse_f64_arg(name: &str) -> Option<f64> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && let Ok(v) = raw.trim().parse::<f64>()
        {
            return Some(v);
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && let Ok(v) = next.trim().parse::<f64>()
        {
            return Some(v);
        }
    }
    None
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
