//! Statistical anomaly detection over metric histories
//!
//! This module provides:
//! - Baseline (mean/std) models with z-score scoring
//! - Isolation-forest outlier models for non-Gaussian metrics
//! - A stateless detector combining both per metric
//! - A train/persist/load/evaluate pipeline with an on-disk artifact

mod baseline;
mod detector;
mod isolation;
mod pipeline;

pub use baseline::BaselineModel;
pub use detector::AnomalyDetector;
pub use isolation::{IsolationConfig, IsolationModel};
pub use pipeline::{AnomalyPipeline, PipelineConfig};
