//! Error taxonomy for the monitoring core
//!
//! Write-path storage failures are meant to be caught and logged at the
//! call site so that metrics recording never takes down the monitored
//! process. Read-path failures and programming errors (invalid values,
//! empty training sets) propagate.

use thiserror::Error;

/// Errors produced by the monitoring core
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Non-finite or otherwise malformed sample value, rejected before I/O
    #[error("invalid value {value} for metric '{metric}'")]
    InvalidMetric { metric: String, value: f64 },

    /// Training requested with zero historical samples and no fallback
    #[error("no historical samples for metric '{metric}'")]
    InsufficientData { metric: String },

    /// Underlying persistence unreachable or I/O failure
    #[error("metric storage failure: {0}")]
    Storage(String),

    /// Evaluation requested with no trained or loadable model
    #[error("no trained model available; train or load a pipeline first")]
    ModelNotAvailable,

    /// Model artifact could not be serialized or deserialized
    #[error("model artifact serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Model artifact file I/O failed
    #[error("model artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for MonitorError {
    fn from(err: rusqlite::Error) -> Self {
        MonitorError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
