//! Monitoring library for metric anomaly detection
//!
//! This crate provides the core functionality for:
//! - Durable metric, performance, and health storage
//! - Statistical anomaly detection (z-score baseline + isolation forest)
//! - Operation performance tracking with threshold alerts
//! - System resource health monitoring
//! - Background sampling and observability

pub mod anomaly;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod performance;
pub mod sampler;
pub mod store;

pub use anomaly::{
    AnomalyDetector, AnomalyPipeline, BaselineModel, IsolationConfig, IsolationModel,
    PipelineConfig,
};
pub use error::{MonitorError, Result};
pub use health::{HealthMonitor, HealthThresholds, ResourceProbe};
pub use models::*;
pub use observability::{EventLogger, MonitorMetrics};
pub use performance::{AlertNotifier, PerformanceThresholds, PerformanceTracker};
pub use sampler::{HealthSampler, SamplerConfig};
pub use store::{HistorySource, MetricStore};
