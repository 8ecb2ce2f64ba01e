//! Agent configuration

use anyhow::Result;
use serde::Deserialize;

/// Monitoring agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Instance name reported in structured log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for the dashboard read API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Trained model artifact path
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,

    /// Health sampling interval in seconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    /// Z-score threshold for the anomaly detector
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,

    /// Response-time alert threshold in milliseconds
    #[serde(default = "default_response_time_ms")]
    pub response_time_ms: f64,

    /// Error-rate alert threshold
    #[serde(default = "default_error_rate")]
    pub error_rate: f64,

    /// CPU utilization alert threshold (percent)
    #[serde(default = "default_resource_threshold")]
    pub cpu_threshold_percent: f64,

    /// Memory utilization alert threshold (percent)
    #[serde(default = "default_resource_threshold")]
    pub memory_threshold_percent: f64,

    /// Disk utilization alert threshold (percent)
    #[serde(default = "default_resource_threshold")]
    pub disk_threshold_percent: f64,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "monitor.db".to_string()
}

fn default_artifact_path() -> String {
    "anomaly_models.json".to_string()
}

fn default_sample_interval() -> u64 {
    30
}

fn default_z_threshold() -> f64 {
    3.0
}

fn default_response_time_ms() -> f64 {
    50.0
}

fn default_error_rate() -> f64 {
    0.01
}

fn default_resource_threshold() -> f64 {
    90.0
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            db_path: default_db_path(),
            artifact_path: default_artifact_path(),
            sample_interval_secs: default_sample_interval(),
            z_threshold: default_z_threshold(),
            response_time_ms: default_response_time_ms(),
            error_rate: default_error_rate(),
            cpu_threshold_percent: default_resource_threshold(),
            memory_threshold_percent: default_resource_threshold(),
            disk_threshold_percent: default_resource_threshold(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from `MONITOR_`-prefixed environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MONITOR"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}
