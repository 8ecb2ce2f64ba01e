//! Monitoring agent - metric anomaly detection and health tracking
//!
//! This binary samples system health, evaluates readings against
//! trained anomaly models, and serves the dashboard read API.

use anyhow::Result;
use monitor_lib::{
    anomaly::{AnomalyPipeline, PipelineConfig},
    health::{HealthMonitor, HealthThresholds},
    observability::{EventLogger, MonitorMetrics},
    performance::{PerformanceThresholds, PerformanceTracker},
    sampler::{HealthSampler, SamplerConfig},
    store::MetricStore,
    MonitorError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting monitor-agent");

    let config = config::MonitorConfig::load()?;
    info!(instance = %config.instance_name, db_path = %config.db_path, "Agent configured");

    let store = Arc::new(MetricStore::open(&config.db_path)?);
    store.ensure_schema()?;

    let mut pipeline = AnomalyPipeline::new(
        &config.artifact_path,
        PipelineConfig {
            z_threshold: config.z_threshold,
            ..PipelineConfig::default()
        },
    );
    match pipeline.load() {
        Ok(()) => info!(
            metrics = ?pipeline.trained_metrics(),
            "Loaded trained anomaly models"
        ),
        Err(MonitorError::ModelNotAvailable) => {
            info!("No model artifact found, starting untrained")
        }
        Err(err) => return Err(err.into()),
    }
    let pipeline = Arc::new(Mutex::new(pipeline));

    let monitor = Arc::new(HealthMonitor::new(
        store.clone(),
        HealthThresholds {
            cpu_percent: config.cpu_threshold_percent,
            memory_percent: config.memory_threshold_percent,
            disk_percent: config.disk_threshold_percent,
        },
    ));

    let tracker = Arc::new(PerformanceTracker::new(
        store.clone(),
        PerformanceThresholds {
            response_time_ms: config.response_time_ms,
            error_rate: config.error_rate,
        },
    ));

    let metrics = MonitorMetrics::new();
    if let Ok(pipeline) = pipeline.lock() {
        metrics.set_model_trained_metrics(pipeline.trained_metrics().len() as i64);
    }

    let logger = EventLogger::new(&config.instance_name);
    logger.log_startup(AGENT_VERSION);

    let (shutdown_tx, _) = broadcast::channel(1);

    let sampler = HealthSampler::new(
        monitor.clone(),
        store.clone(),
        pipeline.clone(),
        metrics.clone(),
        logger.clone(),
        SamplerConfig {
            interval: Duration::from_secs(config.sample_interval_secs),
            ..SamplerConfig::default()
        },
    );
    let sampler_handle = tokio::spawn(sampler.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(api::AppState::new(store, pipeline, monitor, tracker));
    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    let _ = sampler_handle.await;
    info!("Shutdown complete");

    Ok(())
}
