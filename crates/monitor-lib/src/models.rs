//! Core data models for the monitoring agent

use serde::{Deserialize, Serialize};

/// One observation of a named metric at a point in time
///
/// Immutable once stored; samples are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric_name: String,
    pub value: f64,
    pub timestamp: i64,
}

/// Result of evaluating one metric reading against trained models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    pub metric_name: String,
    pub is_anomaly: bool,
    /// Informational; number of standard deviations from the trained mean
    pub z_score: f64,
    /// Present only when an isolation model was consulted for this metric
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isolation_flag: Option<bool>,
}

impl AnomalyVerdict {
    /// Severity classification from z-score magnitude
    pub fn severity(&self) -> AnomalySeverity {
        if self.z_score >= 5.0 {
            AnomalySeverity::Critical
        } else if self.z_score >= 4.0 {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Warning
        }
    }
}

/// Severity levels for detected anomalies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Warning,
    High,
    Critical,
}

/// Persisted anomaly-evaluation record for audit and dashboard consumption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub metric_name: String,
    pub value: f64,
    pub z_score: f64,
    pub is_anomaly: bool,
    pub timestamp: i64,
}

/// One tracked operation invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub operation_name: String,
    pub duration_ms: f64,
    pub is_error: bool,
    pub timestamp: i64,
}

/// Rolling performance aggregate with alert flags
///
/// Computed over the full stored history; error records are excluded
/// from the response-time average but count toward the error rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub avg_response_time_ms: f64,
    pub error_rate: f64,
    pub response_time_alert: bool,
    pub error_rate_alert: bool,
}

/// One OS-resource snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealthSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub net_bytes_sent: u64,
    pub net_bytes_recv: u64,
    pub timestamp: i64,
}

/// Rolling averages over the last N health samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthAverages {
    pub avg_cpu_percent: f64,
    pub avg_memory_percent: f64,
    pub avg_disk_percent: f64,
    pub avg_net_bytes_sent: f64,
    pub avg_net_bytes_recv: f64,
}

/// Threshold-exceedance flags for one health sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAlerts {
    pub cpu: bool,
    pub memory: bool,
    pub disk: bool,
}

impl HealthAlerts {
    pub fn any(&self) -> bool {
        self.cpu || self.memory || self.disk
    }
}
