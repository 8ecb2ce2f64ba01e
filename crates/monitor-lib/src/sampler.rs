//! Background health sampling loop
//!
//! Periodically gathers one system health snapshot, feeds the resource
//! gauges, and evaluates the sampled metrics against trained anomaly
//! models. Runs until a shutdown signal arrives; errors inside an
//! iteration are logged and never abort the loop.

use crate::anomaly::AnomalyPipeline;
use crate::error::MonitorError;
use crate::health::HealthMonitor;
use crate::models::AnomalySeverity;
use crate::observability::{EventLogger, MonitorMetrics};
use crate::store::MetricStore;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Metric names under which sampled resource readings are stored
pub const CPU_METRIC: &str = "system.cpu_percent";
pub const MEMORY_METRIC: &str = "system.memory_percent";
pub const DISK_METRIC: &str = "system.disk_percent";

/// Configuration for the sampling loop
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Base sampling interval (default: 30 seconds)
    pub interval: Duration,
    /// Maximum jitter added to each interval (default: 1 second)
    pub jitter: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            jitter: Duration::from_secs(1),
        }
    }
}

/// Periodic sampler that drives health collection and anomaly evaluation
pub struct HealthSampler {
    monitor: Arc<HealthMonitor>,
    store: Arc<MetricStore>,
    pipeline: Arc<Mutex<AnomalyPipeline>>,
    metrics: MonitorMetrics,
    logger: EventLogger,
    config: SamplerConfig,
}

impl HealthSampler {
    pub fn new(
        monitor: Arc<HealthMonitor>,
        store: Arc<MetricStore>,
        pipeline: Arc<Mutex<AnomalyPipeline>>,
        metrics: MonitorMetrics,
        logger: EventLogger,
        config: SamplerConfig,
    ) -> Self {
        Self {
            monitor,
            store,
            pipeline,
            metrics,
            logger,
            config,
        }
    }

    /// Run until the shutdown channel fires
    ///
    /// Stops within one interval of the signal; the in-flight cycle
    /// completes before the loop exits.
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting health sampling loop"
        );

        let mut cycle_count = 0u64;

        // One jittered sleep per cycle; the first sample lands a full
        // interval after startup.
        loop {
            tokio::select! {
                _ = sleep(self.jittered_interval()) => {
                    let start = Instant::now();
                    self.run_cycle();
                    cycle_count += 1;

                    if cycle_count % 10 == 0 {
                        debug!(
                            cycles = cycle_count,
                            elapsed_ms = start.elapsed().as_millis(),
                            "Sampling cycle complete"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down health sampling loop");
                    break;
                }
            }
        }
    }

    /// One sampling cycle: snapshot, persist, gauge, evaluate
    fn run_cycle(&self) {
        let (sample, alerts) = self.monitor.sample_and_check();

        self.metrics.inc_health_samples();
        self.metrics.set_resource_gauges(
            sample.cpu_percent,
            sample.memory_percent,
            sample.disk_percent,
        );
        self.metrics.set_health_alert_active(alerts.any());

        let thresholds = self.monitor.thresholds();
        if alerts.cpu {
            self.logger
                .log_health_alert("cpu", sample.cpu_percent, thresholds.cpu_percent);
        }
        if alerts.memory {
            self.logger
                .log_health_alert("memory", sample.memory_percent, thresholds.memory_percent);
        }
        if alerts.disk {
            self.logger
                .log_health_alert("disk", sample.disk_percent, thresholds.disk_percent);
        }

        let reading = HashMap::from([
            (CPU_METRIC.to_string(), sample.cpu_percent),
            (MEMORY_METRIC.to_string(), sample.memory_percent),
            (DISK_METRIC.to_string(), sample.disk_percent),
        ]);

        // Grow per-metric history so the pipeline can be (re)trained
        for (name, value) in &reading {
            if let Err(err) = self.store.append_sample(name, *value, Some(sample.timestamp)) {
                self.metrics.inc_storage_errors();
                warn!(metric = %name, error = %err, "failed to persist metric sample, continuing");
            }
        }

        self.evaluate_reading(&reading);
    }

    /// Score the reading against trained models, if any exist
    fn evaluate_reading(&self, reading: &HashMap<String, f64>) {
        let mut pipeline = match self.pipeline.lock() {
            Ok(pipeline) => pipeline,
            Err(_) => {
                warn!("anomaly pipeline lock poisoned, skipping evaluation");
                return;
            }
        };

        let start = Instant::now();
        match pipeline.evaluate_and_record(&self.store, reading) {
            Ok(verdicts) => {
                self.metrics.inc_evaluations();
                self.metrics
                    .observe_evaluation_latency(start.elapsed().as_secs_f64());

                for verdict in verdicts.values() {
                    if verdict.is_anomaly {
                        self.metrics.inc_anomalies_detected();
                        let value = reading.get(&verdict.metric_name).copied().unwrap_or(0.0);
                        let severity = match verdict.severity() {
                            AnomalySeverity::Critical => "critical",
                            AnomalySeverity::High => "high",
                            AnomalySeverity::Warning => "warning",
                        };
                        self.logger
                            .log_anomaly(&verdict.metric_name, value, verdict.z_score, severity);
                    }
                }
            }
            // Expected until the first training pass completes
            Err(MonitorError::ModelNotAvailable) => {
                debug!("no trained models yet, skipping evaluation");
            }
            Err(err) => {
                warn!(error = %err, "anomaly evaluation failed, continuing");
            }
        }
    }

    fn jittered_interval(&self) -> Duration {
        let max_ms = self.config.jitter.as_millis() as u64;
        if max_ms == 0 {
            return self.config.interval;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..max_ms);
        self.config.interval + Duration::from_millis(jitter_ms)
    }
}
