//! Per-metric baseline statistics
//!
//! A baseline is the (mean, std) pair fitted over a batch of historical
//! values, replaced wholesale on retraining. Variance is population
//! variance (divisor `n`); tests rely on this convention.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};

/// Per-metric statistical summary used for z-score anomaly scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineModel {
    pub metric_name: String,
    pub mean: f64,
    pub std: f64,
}

impl BaselineModel {
    /// Fit a baseline over a batch of historical values
    ///
    /// An empty training set is an error, not a silently-zeroed model;
    /// callers that want a cold-start default must supply one explicitly.
    pub fn fit(metric_name: impl Into<String>, values: &[f64]) -> Result<Self> {
        let metric_name = metric_name.into();
        if values.is_empty() {
            return Err(MonitorError::InsufficientData {
                metric: metric_name,
            });
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Ok(Self {
            metric_name,
            mean,
            std: variance.sqrt(),
        })
    }

    /// Absolute z-score of a value against this baseline
    ///
    /// For a constant history (std == 0) any deviation from the mean is
    /// maximally far away. Reported as `f64::MAX` rather than infinity;
    /// JSON has no infinity, and a serialized verdict must keep a
    /// numeric z-score.
    pub fn z_score(&self, value: f64) -> f64 {
        if self.std < f64::EPSILON {
            if value == self.mean {
                0.0
            } else {
                f64::MAX
            }
        } else {
            (value - self.mean).abs() / self.std
        }
    }

    /// Whether a value exceeds the z-score threshold
    pub fn is_anomalous(&self, value: f64, z_threshold: f64) -> bool {
        if self.std < f64::EPSILON {
            value != self.mean
        } else {
            self.z_score(value) > z_threshold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_population_variance() {
        // mean = 11, variance = 2/3 (divisor n), std ≈ 0.8165
        let model = BaselineModel::fit("cpu_usage", &[10.0, 11.0, 12.0]).unwrap();
        assert_eq!(model.mean, 11.0);
        assert!((model.std - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_fit_empty_history_is_error() {
        let err = BaselineModel::fit("cpu_usage", &[]).unwrap_err();
        assert!(matches!(err, MonitorError::InsufficientData { .. }));
    }

    #[test]
    fn test_z_score_matches_independent_computation() {
        let values = [100.0, 98.0, 102.0];
        let model = BaselineModel::fit("memory_usage", &values).unwrap();

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

        let value = 103.0;
        let expected = (value - mean).abs() / std;
        assert!((model.z_score(value) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_scenarios() {
        let cpu = BaselineModel::fit("cpu_usage", &[10.0, 11.0, 12.0]).unwrap();
        // z ≈ 17.3
        assert!(cpu.is_anomalous(25.0, 3.0));
        // z ≈ 0.61
        assert!(!cpu.is_anomalous(11.5, 3.0));

        let mem = BaselineModel::fit("memory_usage", &[100.0, 98.0, 102.0]).unwrap();
        // z ≈ 1.84
        assert!(!mem.is_anomalous(103.0, 3.0));
        // z ≈ 36.8
        assert!(mem.is_anomalous(160.0, 3.0));
    }

    #[test]
    fn test_constant_history_zero_std() {
        let model = BaselineModel::fit("disk_usage", &[42.0, 42.0, 42.0]).unwrap();
        assert_eq!(model.std, 0.0);

        // Any deviation from the constant is anomalous, equality is not
        assert!(model.is_anomalous(42.0001, 3.0));
        assert!(!model.is_anomalous(42.0, 3.0));
        assert_eq!(model.z_score(42.0), 0.0);
        assert_eq!(model.z_score(43.0), f64::MAX);
    }

    #[test]
    fn test_zero_std_z_score_stays_numeric_in_json() {
        let model = BaselineModel::fit("disk_usage", &[42.0, 42.0, 42.0]).unwrap();

        let json = serde_json::to_value(model.z_score(1000.0)).unwrap();
        assert!(json.is_f64(), "z-score must serialize as a number, got {json}");
    }

    #[test]
    fn test_single_value_history() {
        let model = BaselineModel::fit("queue_depth", &[5.0]).unwrap();
        assert_eq!(model.mean, 5.0);
        assert_eq!(model.std, 0.0);
    }
}
