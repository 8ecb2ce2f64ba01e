//! Train/persist/load/evaluate pipeline
//!
//! Ties model training and evaluation into one reusable unit. Training
//! loads history through a [`HistorySource`], fits baseline and
//! isolation models, and writes a versioned artifact atomically (temp
//! file + rename) so readers never observe a half-written model.
//! Retraining fully replaces the artifact; there is no merge.

use super::{AnomalyDetector, BaselineModel, IsolationConfig, IsolationModel};
use crate::error::{MonitorError, Result};
use crate::models::AnomalyVerdict;
use crate::store::{HistorySource, MetricStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const ARTIFACT_VERSION: u32 = 1;

/// Pipeline configuration, supplied by the caller at construction
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Z-score threshold for the detector
    pub z_threshold: f64,
    /// Train isolation models alongside baselines
    pub with_isolation: bool,
    /// Cap training history at the most recent N samples per metric
    pub history_limit: Option<usize>,
    /// Isolation forest training parameters
    pub isolation: IsolationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            z_threshold: super::detector::DEFAULT_Z_THRESHOLD,
            with_isolation: true,
            history_limit: None,
            isolation: IsolationConfig::default(),
        }
    }
}

/// Persisted model artifact, keyed by metric name
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelArtifact {
    version: u32,
    created_at: i64,
    baselines: HashMap<String, BaselineModel>,
    isolation: HashMap<String, IsolationModel>,
}

/// Anomaly pipeline holding trained models as an immutable snapshot
///
/// Evaluation never mutates the snapshot; retraining swaps it wholesale.
pub struct AnomalyPipeline {
    artifact_path: PathBuf,
    config: PipelineConfig,
    detector: AnomalyDetector,
    artifact: Option<ModelArtifact>,
}

impl AnomalyPipeline {
    pub fn new(artifact_path: impl Into<PathBuf>, config: PipelineConfig) -> Self {
        let detector = AnomalyDetector::new(config.z_threshold);
        Self {
            artifact_path: artifact_path.into(),
            config,
            detector,
            artifact: None,
        }
    }

    /// Whether trained models are currently held in memory
    pub fn is_trained(&self) -> bool {
        self.artifact.is_some()
    }

    /// Names of metrics with trained models
    pub fn trained_metrics(&self) -> Vec<String> {
        match &self.artifact {
            Some(artifact) => {
                let mut names: Vec<String> = artifact.baselines.keys().cloned().collect();
                names.sort();
                names
            }
            None => Vec::new(),
        }
    }

    /// Unix timestamp of the held artifact, if any
    pub fn trained_at(&self) -> Option<i64> {
        self.artifact.as_ref().map(|a| a.created_at)
    }

    /// Train models over historical data and persist the artifact
    ///
    /// A metric with zero history fails the whole training run with
    /// `InsufficientData`; silently substituting fake history would
    /// produce misleading verdicts.
    pub fn train(&mut self, source: &dyn HistorySource, metrics: &[String]) -> Result<()> {
        let mut baselines = HashMap::new();
        let mut isolation = HashMap::new();

        for metric in metrics {
            let history = source.load_history(metric, self.config.history_limit)?;
            let baseline = BaselineModel::fit(metric.clone(), &history)?;
            debug!(
                metric = %metric,
                samples = history.len(),
                mean = baseline.mean,
                std = baseline.std,
                "fitted baseline model"
            );
            baselines.insert(metric.clone(), baseline);

            if self.config.with_isolation {
                let model = IsolationModel::fit(metric.clone(), &history, &self.config.isolation)?;
                isolation.insert(metric.clone(), model);
            }
        }

        let artifact = ModelArtifact {
            version: ARTIFACT_VERSION,
            created_at: chrono::Utc::now().timestamp(),
            baselines,
            isolation,
        };
        self.save_artifact(&artifact)?;

        info!(
            metrics = metrics.len(),
            path = %self.artifact_path.display(),
            "trained anomaly models and persisted artifact"
        );
        self.artifact = Some(artifact);
        Ok(())
    }

    /// Restore models from the persisted artifact
    ///
    /// Fails with `ModelNotAvailable` when no artifact exists at the
    /// configured path.
    pub fn load(&mut self) -> Result<()> {
        if !self.artifact_path.exists() {
            return Err(MonitorError::ModelNotAvailable);
        }

        let file = File::open(&self.artifact_path)?;
        let artifact: ModelArtifact = serde_json::from_reader(file)?;

        if artifact.version != ARTIFACT_VERSION {
            warn!(
                found = artifact.version,
                expected = ARTIFACT_VERSION,
                "model artifact version mismatch, retraining required"
            );
            return Err(MonitorError::ModelNotAvailable);
        }

        info!(
            metrics = artifact.baselines.len(),
            path = %self.artifact_path.display(),
            "loaded model artifact"
        );
        self.artifact = Some(artifact);
        Ok(())
    }

    /// Evaluate a current reading against the trained models
    ///
    /// If the pipeline is untrained, transparently attempts `load()`
    /// first; `ModelNotAvailable` when no artifact exists either.
    pub fn evaluate(
        &mut self,
        current: &HashMap<String, f64>,
    ) -> Result<HashMap<String, AnomalyVerdict>> {
        if self.artifact.is_none() {
            self.load()?;
        }
        // load() either populated the artifact or returned above
        let artifact = self.artifact.as_ref().ok_or(MonitorError::ModelNotAvailable)?;

        Ok(self
            .detector
            .detect(&artifact.baselines, &artifact.isolation, current))
    }

    /// Evaluate and append each verdict to the anomaly log
    ///
    /// Recording is best-effort: a storage failure on this write path is
    /// logged and skipped, never propagated to the caller.
    pub fn evaluate_and_record(
        &mut self,
        store: &MetricStore,
        current: &HashMap<String, f64>,
    ) -> Result<HashMap<String, AnomalyVerdict>> {
        let verdicts = self.evaluate(current)?;

        for verdict in verdicts.values() {
            let value = current.get(&verdict.metric_name).copied().unwrap_or(0.0);
            if let Err(err) = store.record_anomaly(
                &verdict.metric_name,
                value,
                verdict.z_score,
                verdict.is_anomaly,
                None,
            ) {
                warn!(
                    metric = %verdict.metric_name,
                    error = %err,
                    "failed to record anomaly verdict, continuing"
                );
            }
        }

        Ok(verdicts)
    }

    /// Write the artifact atomically using a temp file and rename
    fn save_artifact(&self, artifact: &ModelArtifact) -> Result<()> {
        if let Some(parent) = self.artifact_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec(artifact)?;
        let temp_path = self.artifact_path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, &self.artifact_path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory history source for tests
    struct FixedHistory(HashMap<String, Vec<f64>>);

    impl HistorySource for FixedHistory {
        fn load_history(&self, metric_name: &str, limit: Option<usize>) -> Result<Vec<f64>> {
            let values = self.0.get(metric_name).cloned().unwrap_or_default();
            match limit {
                Some(n) if values.len() > n => Ok(values[values.len() - n..].to_vec()),
                _ => Ok(values),
            }
        }
    }

    fn cpu_mem_history() -> FixedHistory {
        FixedHistory(HashMap::from([
            ("cpu".to_string(), vec![10.0, 12.0, 11.0]),
            ("mem".to_string(), vec![100.0, 98.0, 102.0]),
        ]))
    }

    fn seeded_config() -> PipelineConfig {
        PipelineConfig {
            isolation: IsolationConfig {
                seed: Some(42),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn artifact_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("models.json")
    }

    #[test]
    fn test_evaluate_before_training_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AnomalyPipeline::new(artifact_path(&dir), seeded_config());

        let err = pipeline
            .evaluate(&HashMap::from([("cpu".to_string(), 11.0)]))
            .unwrap_err();
        assert!(matches!(err, MonitorError::ModelNotAvailable));
    }

    #[test]
    fn test_train_then_evaluate() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AnomalyPipeline::new(artifact_path(&dir), seeded_config());

        pipeline
            .train(&cpu_mem_history(), &["cpu".to_string(), "mem".to_string()])
            .unwrap();
        assert!(pipeline.is_trained());
        assert_eq!(pipeline.trained_metrics(), vec!["cpu", "mem"]);

        let verdicts = pipeline
            .evaluate(&HashMap::from([
                ("cpu".to_string(), 25.0),
                ("mem".to_string(), 103.0),
            ]))
            .unwrap();

        assert!(verdicts["cpu"].is_anomaly);
        assert!(!verdicts["mem"].is_anomaly);
    }

    #[test]
    fn test_train_with_empty_history_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = AnomalyPipeline::new(artifact_path(&dir), seeded_config());

        let source = FixedHistory(HashMap::new());
        let err = pipeline.train(&source, &["cpu".to_string()]).unwrap_err();
        assert!(matches!(err, MonitorError::InsufficientData { .. }));
        assert!(!pipeline.is_trained());
    }

    #[test]
    fn test_save_load_round_trip_agrees_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(&dir);

        let mut trained = AnomalyPipeline::new(&path, seeded_config());
        trained
            .train(&cpu_mem_history(), &["cpu".to_string(), "mem".to_string()])
            .unwrap();

        let mut reloaded = AnomalyPipeline::new(&path, seeded_config());
        reloaded.load().unwrap();

        for reading in [
            HashMap::from([("cpu".to_string(), 25.0), ("mem".to_string(), 103.0)]),
            HashMap::from([("cpu".to_string(), 11.0), ("mem".to_string(), 160.0)]),
            HashMap::from([("cpu".to_string(), -3.0)]),
        ] {
            let fresh = trained.evaluate(&reading).unwrap();
            let restored = reloaded.evaluate(&reading).unwrap();
            assert_eq!(fresh, restored);
        }
    }

    #[test]
    fn test_evaluate_transparently_loads_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(&dir);

        let mut trained = AnomalyPipeline::new(&path, seeded_config());
        trained
            .train(&cpu_mem_history(), &["cpu".to_string()])
            .unwrap();

        // Fresh pipeline, never trained or explicitly loaded
        let mut fresh = AnomalyPipeline::new(&path, seeded_config());
        let verdicts = fresh
            .evaluate(&HashMap::from([("cpu".to_string(), 25.0)]))
            .unwrap();
        assert!(verdicts["cpu"].is_anomaly);
    }

    #[test]
    fn test_retrain_replaces_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(&dir);

        let mut pipeline = AnomalyPipeline::new(&path, seeded_config());
        pipeline
            .train(&cpu_mem_history(), &["cpu".to_string()])
            .unwrap();

        // Retrain against a shifted history; old model must be gone
        let shifted = FixedHistory(HashMap::from([(
            "cpu".to_string(),
            vec![1000.0, 1001.0, 999.0],
        )]));
        pipeline.train(&shifted, &["cpu".to_string()]).unwrap();

        let mut reloaded = AnomalyPipeline::new(&path, seeded_config());
        let verdicts = reloaded
            .evaluate(&HashMap::from([("cpu".to_string(), 1000.0)]))
            .unwrap();
        assert!(!verdicts["cpu"].is_anomaly);
    }

    #[test]
    fn test_evaluate_and_record_appends_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetricStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();

        let mut pipeline = AnomalyPipeline::new(artifact_path(&dir), seeded_config());
        pipeline
            .train(&cpu_mem_history(), &["cpu".to_string()])
            .unwrap();

        pipeline
            .evaluate_and_record(&store, &HashMap::from([("cpu".to_string(), 25.0)]))
            .unwrap();

        let log = store.recent_anomalies(10).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].metric_name, "cpu");
        assert!(log[0].is_anomaly);
    }
}
