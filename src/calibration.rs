use serde::{Deserialize, Serialize};

use crate::outcome::{Outcome, OutcomeDistribution};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub samples: usize,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelledPrediction {
    pub prediction: OutcomeDistribution,
    pub outcome: Outcome,
}

/// Temperature scaling: `p_i^(1/T)` renormalized.
///
/// T > 1 flattens the distribution toward uniform, T < 1 sharpens it toward its
/// mode, T = 1 leaves a normalized distribution unchanged.
pub fn apply_temperature(prob: OutcomeDistribution, temperature: f64) -> OutcomeDistribution {
    if !temperature.is_finite() || temperature <= 0.0 {
        return prob.renormalized();
    }
    let inv = 1.0 / temperature;
    OutcomeDistribution::from_weights(
        prob.home.max(0.0).powf(inv),
        prob.draw.max(0.0).powf(inv),
        prob.away.max(0.0).powf(inv),
    )
}

pub fn evaluate_probs(samples: &[LabelledPrediction]) -> Metrics {
    if samples.is_empty() {
        return Metrics::default();
    }

    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;

    for s in samples {
        let p = s.prediction;
        let y = OutcomeDistribution::one_hot(s.outcome);
        brier_sum +=
            (p.home - y.home).powi(2) + (p.draw - y.draw).powi(2) + (p.away - y.away).powi(2);
        log_loss_sum += -p.get(s.outcome).clamp(1e-12, 1.0).ln();
        if p.argmax() == s.outcome {
            correct += 1;
        }
    }

    let n = samples.len() as f64;
    Metrics {
        samples: samples.len(),
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

/// Grid search over T in [0.50, 2.50] minimizing log-loss. Returns (T, metrics at T).
pub fn fit_temperature(samples: &[LabelledPrediction]) -> (f64, Metrics) {
    if samples.is_empty() {
        return (1.0, Metrics::default());
    }

    let mut best_t = 1.0;
    let mut best_metrics = evaluate_probs(samples);

    for step in 25..=125 {
        let t = step as f64 / 50.0; // 0.50..2.50
        let scaled: Vec<LabelledPrediction> = samples
            .iter()
            .map(|s| LabelledPrediction {
                prediction: apply_temperature(s.prediction, t),
                outcome: s.outcome,
            })
            .collect();
        let metrics = evaluate_probs(&scaled);
        if metrics.log_loss < best_metrics.log_loss {
            best_metrics = metrics;
            best_t = t;
        }
    }

    (best_t, best_metrics)
}

pub fn calibration_bins(
    samples: &[LabelledPrediction],
    class: Outcome,
    bins: usize,
) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for s in samples {
        let class_prob = s.prediction.get(class).clamp(0.0, 1.0);
        let idx = ((class_prob * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += class_prob;
        if s.outcome == class {
            actual_sum[idx] += 1.0;
        }
    }

    (0..bins)
        .map(|i| {
            let count = counts[i];
            let (avg_pred, actual_rate) = if count > 0 {
                (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
            } else {
                (0.0, 0.0)
            };
            CalibrationBin {
                bucket_start: i as f64 / bins as f64,
                bucket_end: (i + 1) as f64 / bins as f64,
                count,
                avg_pred,
                actual_rate,
            }
        })
        .collect()
}

pub fn expected_calibration_error(bins: &[CalibrationBin]) -> f64 {
    let total: usize = bins.iter().map(|b| b.count).sum();
    if total == 0 {
        return 0.0;
    }
    bins.iter()
        .map(|b| (b.count as f64 / total as f64) * (b.avg_pred - b.actual_rate).abs())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(home: f64, draw: f64, away: f64) -> OutcomeDistribution {
        OutcomeDistribution::from_weights(home, draw, away)
    }

    #[test]
    fn unit_temperature_is_identity() {
        let q = p(0.44, 0.27, 0.29);
        let r = apply_temperature(q, 1.0);
        assert!((r.home - q.home).abs() < 1e-12);
        assert!((r.draw - q.draw).abs() < 1e-12);
        assert!((r.away - q.away).abs() < 1e-12);
    }

    #[test]
    fn high_temperature_flattens_low_sharpens() {
        let q = p(0.60, 0.25, 0.15);
        let soft = apply_temperature(q, 2.0);
        let sharp = apply_temperature(q, 0.5);
        assert!(soft.home < q.home && soft.away > q.away);
        assert!(sharp.home > q.home && sharp.away < q.away);
        assert!(soft.is_valid() && sharp.is_valid());
    }

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let samples: Vec<LabelledPrediction> = Outcome::ALL
            .iter()
            .map(|o| LabelledPrediction {
                prediction: OutcomeDistribution::one_hot(*o),
                outcome: *o,
            })
            .collect();
        let m = evaluate_probs(&samples);
        assert_eq!(m.samples, 3);
        assert!(m.brier < 1e-12);
        assert_eq!(m.accuracy, 1.0);
    }

    #[test]
    fn overconfident_model_fits_temperature_above_one() {
        // Says 90% home, but home only wins half the time.
        let pred = p(0.90, 0.05, 0.05);
        let mut samples = Vec::new();
        for i in 0..40 {
            let outcome = match i % 4 {
                0 | 1 => Outcome::Home,
                2 => Outcome::Draw,
                _ => Outcome::Away,
            };
            samples.push(LabelledPrediction {
                prediction: pred,
                outcome,
            });
        }
        let (t, m) = fit_temperature(&samples);
        assert!(t > 1.0);
        assert!(m.log_loss < evaluate_probs(&samples).log_loss);
    }

    #[test]
    fn bins_cover_unit_interval() {
        let samples = vec![LabelledPrediction {
            prediction: p(0.72, 0.18, 0.10),
            outcome: Outcome::Home,
        }];
        let bins = calibration_bins(&samples, Outcome::Home, 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[7].count, 1);
        assert!((expected_calibration_error(&bins) - 0.28).abs() < 1e-9);
    }
}
