//! Stateless anomaly evaluation
//!
//! Combines trained per-metric models against a current reading.
//! Metrics in the reading without a trained model are skipped silently,
//! tolerating partial model coverage while metric sets evolve.

use super::{BaselineModel, IsolationModel};
use crate::models::AnomalyVerdict;
use std::collections::HashMap;

/// Default z-score threshold (3 sigma)
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// Evaluates current readings against trained models
#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector {
    pub z_threshold: f64,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_Z_THRESHOLD,
        }
    }
}

impl AnomalyDetector {
    pub fn new(z_threshold: f64) -> Self {
        Self { z_threshold }
    }

    /// Evaluate one reading per metric against the trained models
    ///
    /// When an isolation model exists for a metric, the verdict is the
    /// logical OR of the z-score flag and the isolation flag; either
    /// one is enough to report an anomaly.
    pub fn detect(
        &self,
        baselines: &HashMap<String, BaselineModel>,
        isolation: &HashMap<String, IsolationModel>,
        current: &HashMap<String, f64>,
    ) -> HashMap<String, AnomalyVerdict> {
        let mut verdicts = HashMap::new();

        for (metric, &value) in current {
            let Some(baseline) = baselines.get(metric) else {
                // No model yet for this metric; skip, not an error
                continue;
            };

            let z_score = baseline.z_score(value);
            let z_flag = baseline.is_anomalous(value, self.z_threshold);

            let isolation_flag = isolation.get(metric).map(|model| model.predict(value));
            let is_anomaly = z_flag || isolation_flag.unwrap_or(false);

            verdicts.insert(
                metric.clone(),
                AnomalyVerdict {
                    metric_name: metric.clone(),
                    is_anomaly,
                    z_score,
                    isolation_flag,
                },
            );
        }

        verdicts
    }
}
