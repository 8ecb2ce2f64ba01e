//! Observability infrastructure for the monitoring agent
//!
//! Provides:
//! - Prometheus metrics (sample counters, evaluation latency, live
//!   resource gauges, alert flags)
//! - Structured JSON event logging with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_gauge, Gauge,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    health_samples_total: IntCounter,
    anomalies_detected_total: IntCounter,
    evaluations_total: IntCounter,
    storage_errors_total: IntCounter,
    evaluation_latency_seconds: Histogram,
    cpu_percent: Gauge,
    memory_percent: Gauge,
    disk_percent: Gauge,
    health_alert_active: IntGauge,
    model_trained_metrics: IntGauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            health_samples_total: register_int_counter!(
                "monitor_agent_health_samples_total",
                "Total number of system health samples collected"
            )
            .expect("Failed to register health_samples_total"),

            anomalies_detected_total: register_int_counter!(
                "monitor_agent_anomalies_detected_total",
                "Total number of metric anomalies detected"
            )
            .expect("Failed to register anomalies_detected_total"),

            evaluations_total: register_int_counter!(
                "monitor_agent_evaluations_total",
                "Total number of anomaly evaluations performed"
            )
            .expect("Failed to register evaluations_total"),

            storage_errors_total: register_int_counter!(
                "monitor_agent_storage_errors_total",
                "Total number of best-effort storage write failures"
            )
            .expect("Failed to register storage_errors_total"),

            evaluation_latency_seconds: register_histogram!(
                "monitor_agent_evaluation_latency_seconds",
                "Time spent evaluating a reading against trained models",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register evaluation_latency_seconds"),

            cpu_percent: register_gauge!(
                "monitor_agent_cpu_percent",
                "CPU utilization from the latest health sample"
            )
            .expect("Failed to register cpu_percent"),

            memory_percent: register_gauge!(
                "monitor_agent_memory_percent",
                "Memory utilization from the latest health sample"
            )
            .expect("Failed to register memory_percent"),

            disk_percent: register_gauge!(
                "monitor_agent_disk_percent",
                "Disk utilization from the latest health sample"
            )
            .expect("Failed to register disk_percent"),

            health_alert_active: register_int_gauge!(
                "monitor_agent_health_alert_active",
                "1 when any health threshold is currently exceeded"
            )
            .expect("Failed to register health_alert_active"),

            model_trained_metrics: register_int_gauge!(
                "monitor_agent_model_trained_metrics",
                "Number of metrics with trained anomaly models"
            )
            .expect("Failed to register model_trained_metrics"),
        }
    }
}

/// Lightweight handle to the global Prometheus metrics
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_health_samples(&self) {
        self.inner().health_samples_total.inc();
    }

    pub fn inc_anomalies_detected(&self) {
        self.inner().anomalies_detected_total.inc();
    }

    pub fn inc_evaluations(&self) {
        self.inner().evaluations_total.inc();
    }

    pub fn inc_storage_errors(&self) {
        self.inner().storage_errors_total.inc();
    }

    pub fn observe_evaluation_latency(&self, duration_secs: f64) {
        self.inner().evaluation_latency_seconds.observe(duration_secs);
    }

    pub fn set_resource_gauges(&self, cpu: f64, memory: f64, disk: f64) {
        self.inner().cpu_percent.set(cpu);
        self.inner().memory_percent.set(memory);
        self.inner().disk_percent.set(disk);
    }

    pub fn set_health_alert_active(&self, active: bool) {
        self.inner().health_alert_active.set(active as i64);
    }

    pub fn set_model_trained_metrics(&self, count: i64) {
        self.inner().model_trained_metrics.set(count);
    }
}

/// Structured logger for significant agent events
#[derive(Clone)]
pub struct EventLogger {
    instance: String,
}

impl EventLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            "Monitoring agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Monitoring agent shutting down"
        );
    }

    pub fn log_anomaly(&self, metric: &str, value: f64, z_score: f64, severity: &str) {
        match severity {
            "critical" => {
                warn!(
                    event = "anomaly_detected",
                    instance = %self.instance,
                    metric = %metric,
                    value = value,
                    z_score = z_score,
                    severity = %severity,
                    "Critical anomaly detected"
                );
            }
            _ => {
                info!(
                    event = "anomaly_detected",
                    instance = %self.instance,
                    metric = %metric,
                    value = value,
                    z_score = z_score,
                    severity = %severity,
                    "Anomaly detected"
                );
            }
        }
    }

    pub fn log_health_alert(&self, indicator: &str, value: f64, threshold: f64) {
        warn!(
            event = "health_alert",
            instance = %self.instance,
            indicator = %indicator,
            value = value,
            threshold = threshold,
            "Health threshold exceeded"
        );
    }

    pub fn log_training_complete(&self, metric_count: usize) {
        info!(
            event = "models_trained",
            instance = %self.instance,
            metrics = metric_count,
            "Anomaly models trained"
        );
    }
}
