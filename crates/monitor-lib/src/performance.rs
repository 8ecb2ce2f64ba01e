//! Operation performance tracking with threshold alerting
//!
//! Records per-operation response times and errors into the metric
//! store and recomputes rolling aggregates on every write. Aggregates
//! cover the full stored history: the response-time average is the mean
//! over non-error records, the error rate counts errors against all
//! records.

use crate::error::Result;
use crate::models::PerformanceSummary;
use crate::store::MetricStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default response-time alert threshold in milliseconds
const DEFAULT_RESPONSE_TIME_MS: f64 = 50.0;

/// Default error-rate alert threshold
const DEFAULT_ERROR_RATE: f64 = 0.01;

/// Alert thresholds for performance aggregates
#[derive(Debug, Clone, Copy)]
pub struct PerformanceThresholds {
    pub response_time_ms: f64,
    pub error_rate: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            response_time_ms: DEFAULT_RESPONSE_TIME_MS,
            error_rate: DEFAULT_ERROR_RATE,
        }
    }
}

/// Fire-and-forget notification hook for alert transitions
///
/// Notification failures must not affect the tracked metric, so the
/// hook returns nothing; implementations log their own errors.
pub trait AlertNotifier: Send + Sync {
    fn notify(&self, indicator: &str, summary: &PerformanceSummary);
}

/// Records operation timings and errors, exposing rolling aggregates
pub struct PerformanceTracker {
    store: Arc<MetricStore>,
    thresholds: PerformanceThresholds,
    notifier: Option<Arc<dyn AlertNotifier>>,
    response_time_alerting: AtomicBool,
    error_rate_alerting: AtomicBool,
}

impl PerformanceTracker {
    pub fn new(store: Arc<MetricStore>, thresholds: PerformanceThresholds) -> Self {
        Self {
            store,
            thresholds,
            notifier: None,
            response_time_alerting: AtomicBool::new(false),
            error_rate_alerting: AtomicBool::new(false),
        }
    }

    /// Attach a dashboard notification hook
    pub fn with_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Record a successful operation invocation and return the fresh aggregate
    ///
    /// Invalid durations (negative or non-finite) propagate; a storage
    /// failure on the append is logged and the aggregate is still
    /// computed from whatever history exists.
    pub fn track(&self, operation_name: &str, duration_ms: f64) -> Result<PerformanceSummary> {
        // Validation errors must surface even though storage errors do not
        crate::store::validate_duration(operation_name, duration_ms)?;

        if let Err(err) = self
            .store
            .append_performance(operation_name, duration_ms, false, None)
        {
            warn!(
                operation = %operation_name,
                error = %err,
                "failed to record performance sample, continuing"
            );
        }
        self.summary()
    }

    /// Record a failed operation invocation and return the fresh aggregate
    ///
    /// The error's duration is excluded from the response-time average
    /// but counts toward the error rate.
    pub fn record_error(&self, operation_name: &str) -> Result<PerformanceSummary> {
        if let Err(err) = self
            .store
            .append_performance(operation_name, 0.0, true, None)
        {
            warn!(
                operation = %operation_name,
                error = %err,
                "failed to record error sample, continuing"
            );
        }
        self.summary()
    }

    /// Current aggregate over the full stored history
    ///
    /// Zero recorded operations yield zero aggregates, never a division
    /// by zero.
    pub fn summary(&self) -> Result<PerformanceSummary> {
        let (total, errors, avg_ms) = self.store.performance_totals()?;

        let error_rate = if total > 0 {
            errors as f64 / total as f64
        } else {
            0.0
        };

        let summary = PerformanceSummary {
            avg_response_time_ms: avg_ms,
            error_rate,
            response_time_alert: avg_ms > self.thresholds.response_time_ms,
            error_rate_alert: error_rate > self.thresholds.error_rate,
        };

        self.fire_on_transition(&summary);
        Ok(summary)
    }

    /// Notify when an alert flag flips from false to true
    fn fire_on_transition(&self, summary: &PerformanceSummary) {
        let was_alerting = self
            .response_time_alerting
            .swap(summary.response_time_alert, Ordering::Relaxed);
        if summary.response_time_alert && !was_alerting {
            debug!(
                avg_response_time_ms = summary.avg_response_time_ms,
                "response time alert raised"
            );
            if let Some(notifier) = &self.notifier {
                notifier.notify("response_time", summary);
            }
        }

        let was_alerting = self
            .error_rate_alerting
            .swap(summary.error_rate_alert, Ordering::Relaxed);
        if summary.error_rate_alert && !was_alerting {
            debug!(error_rate = summary.error_rate, "error rate alert raised");
            if let Some(notifier) = &self.notifier {
                notifier.notify("error_rate", summary);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;
    use std::sync::Mutex;

    fn tracker() -> PerformanceTracker {
        let store = Arc::new(MetricStore::open_in_memory().unwrap());
        store.ensure_schema().unwrap();
        PerformanceTracker::new(store, PerformanceThresholds::default())
    }

    #[test]
    fn test_zero_operations_yield_zero_aggregates() {
        let summary = tracker().summary().unwrap();
        assert_eq!(summary.avg_response_time_ms, 0.0);
        assert_eq!(summary.error_rate, 0.0);
        assert!(!summary.response_time_alert);
        assert!(!summary.error_rate_alert);
    }

    #[test]
    fn test_slow_calls_then_error_raise_both_alerts() {
        let tracker = tracker();

        // Five calls at 60 ms each; threshold is 50 ms
        let mut summary = tracker.track("db_query", 60.0).unwrap();
        for _ in 0..4 {
            summary = tracker.track("db_query", 60.0).unwrap();
        }
        assert_eq!(summary.avg_response_time_ms, 60.0);
        assert!(summary.response_time_alert);
        assert!(!summary.error_rate_alert);

        // One error: rate 1/6 ≈ 0.167 against the 0.01 threshold
        let summary = tracker.record_error("db_query").unwrap();
        assert!((summary.error_rate - 1.0 / 6.0).abs() < 1e-9);
        assert!(summary.error_rate_alert);
        // Error excluded from the average
        assert_eq!(summary.avg_response_time_ms, 60.0);
    }

    #[test]
    fn test_fast_calls_do_not_alert() {
        let tracker = tracker();
        for _ in 0..10 {
            tracker.track("cache_get", 2.0).unwrap();
        }
        let summary = tracker.summary().unwrap();
        assert_eq!(summary.avg_response_time_ms, 2.0);
        assert!(!summary.response_time_alert);
        assert!(!summary.error_rate_alert);
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let tracker = tracker();
        let err = tracker.track("db_query", -5.0).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidMetric { .. }));

        let err = tracker.track("db_query", f64::NAN).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidMetric { .. }));
    }

    #[test]
    fn test_notifier_fires_once_per_transition() {
        struct Recording(Mutex<Vec<String>>);
        impl AlertNotifier for Recording {
            fn notify(&self, indicator: &str, _summary: &PerformanceSummary) {
                self.0.lock().unwrap().push(indicator.to_string());
            }
        }

        let store = Arc::new(MetricStore::open_in_memory().unwrap());
        store.ensure_schema().unwrap();
        let notifier = Arc::new(Recording(Mutex::new(Vec::new())));
        let tracker = PerformanceTracker::new(store, PerformanceThresholds::default())
            .with_notifier(notifier.clone());

        // Three slow calls; alert flips true on the first, stays true after
        tracker.track("op", 80.0).unwrap();
        tracker.track("op", 80.0).unwrap();
        tracker.track("op", 80.0).unwrap();

        let fired = notifier.0.lock().unwrap().clone();
        assert_eq!(fired, vec!["response_time"]);
    }
}
