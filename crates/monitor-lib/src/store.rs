//! Durable append-only metric storage
//!
//! Backed by embedded SQLite. The store owns all persisted samples:
//! time-series metric samples for training, performance records,
//! system-health snapshots, and the anomaly audit log. Writers only
//! append; historical rows are never updated.

use crate::error::{MonitorError, Result};
use crate::models::{AnomalyRecord, PerformanceRecord, SystemHealthSample};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS metric_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    metric_name TEXT NOT NULL,
    value REAL NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metric_samples_name
    ON metric_samples(metric_name, id);

CREATE TABLE IF NOT EXISTS performance_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_name TEXT NOT NULL,
    duration_ms REAL NOT NULL,
    is_error INTEGER NOT NULL DEFAULT 0,
    timestamp INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS health_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cpu_percent REAL NOT NULL,
    memory_percent REAL NOT NULL,
    disk_percent REAL NOT NULL,
    net_bytes_sent INTEGER NOT NULL,
    net_bytes_recv INTEGER NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS anomaly_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    metric_name TEXT NOT NULL,
    value REAL NOT NULL,
    z_score REAL NOT NULL,
    is_anomaly INTEGER NOT NULL,
    timestamp INTEGER NOT NULL
);
"#;

/// Named-metric history source consumed by pipeline training
///
/// Implemented by [`MetricStore`]; tests substitute in-memory sources.
pub trait HistorySource {
    /// Historical values in insertion order (oldest first), optionally
    /// capped at the most recent `limit` values.
    fn load_history(&self, metric_name: &str, limit: Option<usize>) -> Result<Vec<f64>>;
}

/// Reject malformed durations before any I/O
pub(crate) fn validate_duration(operation: &str, duration_ms: f64) -> Result<()> {
    if !duration_ms.is_finite() || duration_ms < 0.0 {
        return Err(MonitorError::InvalidMetric {
            metric: operation.to_string(),
            value: duration_ms,
        });
    }
    Ok(())
}

/// SQLite-backed metric store shared by the tracker, detector pipeline,
/// and dashboard readers
pub struct MetricStore {
    conn: Mutex<Connection>,
}

impl MetricStore {
    /// Open (or create) a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store, used by tests and ephemeral agents
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MonitorError::Storage("connection lock poisoned".to_string()))
    }

    /// Idempotently create the underlying tables; existing data is untouched
    pub fn ensure_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(SCHEMA_SQL)?;
        debug!("metric store schema ensured");
        Ok(())
    }

    /// Append one metric sample
    ///
    /// Non-finite values are rejected with `InvalidMetric` before any I/O.
    pub fn append_sample(
        &self,
        metric_name: &str,
        value: f64,
        timestamp: Option<i64>,
    ) -> Result<()> {
        if !value.is_finite() {
            return Err(MonitorError::InvalidMetric {
                metric: metric_name.to_string(),
                value,
            });
        }
        let ts = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
        self.conn()?.execute(
            "INSERT INTO metric_samples (metric_name, value, timestamp) VALUES (?1, ?2, ?3)",
            params![metric_name, value, ts],
        )?;
        Ok(())
    }

    /// Append one performance record
    pub fn append_performance(
        &self,
        operation_name: &str,
        duration_ms: f64,
        is_error: bool,
        timestamp: Option<i64>,
    ) -> Result<()> {
        validate_duration(operation_name, duration_ms)?;
        let ts = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
        self.conn()?.execute(
            "INSERT INTO performance_records (operation_name, duration_ms, is_error, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![operation_name, duration_ms, is_error, ts],
        )?;
        Ok(())
    }

    /// Append one system-health snapshot
    pub fn append_health(&self, sample: &SystemHealthSample) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO health_samples
             (cpu_percent, memory_percent, disk_percent, net_bytes_sent, net_bytes_recv, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sample.cpu_percent,
                sample.memory_percent,
                sample.disk_percent,
                sample.net_bytes_sent as i64,
                sample.net_bytes_recv as i64,
                sample.timestamp
            ],
        )?;
        Ok(())
    }

    /// Append one anomaly-evaluation record
    pub fn record_anomaly(
        &self,
        metric_name: &str,
        value: f64,
        z_score: f64,
        is_anomaly: bool,
        timestamp: Option<i64>,
    ) -> Result<()> {
        let ts = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
        self.conn()?.execute(
            "INSERT INTO anomaly_log (metric_name, value, z_score, is_anomaly, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![metric_name, value, z_score, is_anomaly, ts],
        )?;
        Ok(())
    }

    /// Last `n` performance records in chronological order
    ///
    /// Returns fewer if fewer exist; never errors on insufficient data.
    pub fn recent_performance(&self, n: usize) -> Result<Vec<PerformanceRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT operation_name, duration_ms, is_error, timestamp FROM
             (SELECT id, operation_name, duration_ms, is_error, timestamp
              FROM performance_records ORDER BY id DESC LIMIT ?1)
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![n as i64], |row| {
            Ok(PerformanceRecord {
                operation_name: row.get(0)?,
                duration_ms: row.get(1)?,
                is_error: row.get(2)?,
                timestamp: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Last `n` health snapshots in chronological order
    pub fn recent_health(&self, n: usize) -> Result<Vec<SystemHealthSample>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT cpu_percent, memory_percent, disk_percent,
                    net_bytes_sent, net_bytes_recv, timestamp FROM
             (SELECT id, cpu_percent, memory_percent, disk_percent,
                     net_bytes_sent, net_bytes_recv, timestamp
              FROM health_samples ORDER BY id DESC LIMIT ?1)
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![n as i64], |row| {
            Ok(SystemHealthSample {
                cpu_percent: row.get(0)?,
                memory_percent: row.get(1)?,
                disk_percent: row.get(2)?,
                net_bytes_sent: row.get::<_, i64>(3)? as u64,
                net_bytes_recv: row.get::<_, i64>(4)? as u64,
                timestamp: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most recent anomaly records, newest first, for dashboard consumption
    pub fn recent_anomalies(&self, limit: usize) -> Result<Vec<AnomalyRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT metric_name, value, z_score, is_anomaly, timestamp
             FROM anomaly_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(AnomalyRecord {
                metric_name: row.get(0)?,
                value: row.get(1)?,
                z_score: row.get(2)?,
                is_anomaly: row.get(3)?,
                timestamp: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Aggregate totals over the full performance history
    ///
    /// Returns `(total_count, error_count, avg_non_error_duration_ms)`.
    /// The average is 0.0 when no non-error records exist.
    pub fn performance_totals(&self) -> Result<(u64, u64, f64)> {
        let conn = self.conn()?;
        let (total, errors, avg): (i64, i64, Option<f64>) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(is_error), 0),
                    AVG(CASE WHEN is_error = 0 THEN duration_ms END)
             FROM performance_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok((total as u64, errors as u64, avg.unwrap_or(0.0)))
    }
}

impl HistorySource for MetricStore {
    fn load_history(&self, metric_name: &str, limit: Option<usize>) -> Result<Vec<f64>> {
        let conn = self.conn()?;
        let values = match limit {
            Some(n) => {
                let mut stmt = conn.prepare(
                    "SELECT value FROM
                     (SELECT id, value FROM metric_samples
                      WHERE metric_name = ?1 ORDER BY id DESC LIMIT ?2)
                     ORDER BY id ASC",
                )?;
                let rows = stmt.query_map(params![metric_name, n as i64], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<f64>>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT value FROM metric_samples WHERE metric_name = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt.query_map(params![metric_name], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<f64>>>()?
            }
        };
        Ok(values)
    }
}
