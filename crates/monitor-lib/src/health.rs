//! System resource health monitoring
//!
//! Samples CPU/memory/disk/network counters, persists them, and
//! computes rolling averages and threshold alerts. Gathering is
//! best-effort: an unreadable counter degrades to zero rather than
//! raising, so monitoring can never take the monitored system down.

use crate::error::Result;
use crate::models::{HealthAlerts, HealthAverages, SystemHealthSample};
use crate::store::MetricStore;
use std::sync::{Arc, Mutex};
use sysinfo::{Disks, Networks, System};
use tracing::warn;

/// Default rolling-average window
pub const DEFAULT_ROLLING_WINDOW: usize = 10;

/// Alert thresholds for resource utilization percentages
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 90.0,
            memory_percent: 90.0,
            disk_percent: 90.0,
        }
    }
}

/// Source of OS resource snapshots
///
/// Infallible by contract; implementations degrade missing counters to
/// zero. Tests substitute fixed probes.
pub trait ResourceProbe: Send + Sync {
    fn snapshot(&self) -> SystemHealthSample;
}

/// `sysinfo`-backed probe
///
/// Keeps a persistent [`System`] so successive CPU refreshes measure
/// usage between samples rather than since boot.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn snapshot(&self) -> SystemHealthSample {
        let (cpu_percent, memory_percent) = match self.system.lock() {
            Ok(mut system) => {
                system.refresh_cpu();
                system.refresh_memory();

                let cpu = system.global_cpu_info().cpu_usage() as f64;
                let memory = if system.total_memory() > 0 {
                    system.used_memory() as f64 / system.total_memory() as f64 * 100.0
                } else {
                    0.0
                };
                (cpu, memory)
            }
            Err(_) => {
                warn!("system probe lock poisoned, reporting zeroed cpu/memory");
                (0.0, 0.0)
            }
        };

        // Report the fullest filesystem; a single full disk is what pages
        let disks = Disks::new_with_refreshed_list();
        let disk_percent = disks
            .iter()
            .filter(|disk| disk.total_space() > 0)
            .map(|disk| {
                let used = disk.total_space() - disk.available_space();
                used as f64 / disk.total_space() as f64 * 100.0
            })
            .fold(0.0, f64::max);

        let networks = Networks::new_with_refreshed_list();
        let (net_bytes_sent, net_bytes_recv) = networks.iter().fold(
            (0u64, 0u64),
            |(sent, recv), (_name, data)| {
                (
                    sent.saturating_add(data.total_transmitted()),
                    recv.saturating_add(data.total_received()),
                )
            },
        );

        SystemHealthSample {
            cpu_percent,
            memory_percent,
            disk_percent,
            net_bytes_sent,
            net_bytes_recv,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Periodic resource sampler with rolling averages and threshold alerts
pub struct HealthMonitor {
    store: Arc<MetricStore>,
    probe: Box<dyn ResourceProbe>,
    thresholds: HealthThresholds,
}

impl HealthMonitor {
    pub fn new(store: Arc<MetricStore>, thresholds: HealthThresholds) -> Self {
        Self {
            store,
            probe: Box::new(SysinfoProbe::new()),
            thresholds,
        }
    }

    /// Substitute the OS probe, used by tests
    pub fn with_probe(mut self, probe: Box<dyn ResourceProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn thresholds(&self) -> HealthThresholds {
        self.thresholds
    }

    /// Gather and persist one snapshot
    ///
    /// Persisting is best-effort; a storage failure is logged and the
    /// snapshot is still returned to the caller.
    pub fn sample(&self) -> SystemHealthSample {
        let sample = self.probe.snapshot();
        if let Err(err) = self.store.append_health(&sample) {
            warn!(error = %err, "failed to persist health sample, continuing");
        }
        sample
    }

    /// Averages over the last `n` persisted snapshots
    ///
    /// An empty store yields zeros so a cold-start dashboard renders
    /// zeros instead of crashing.
    pub fn rolling_average(&self, n: usize) -> Result<HealthAverages> {
        let samples = self.store.recent_health(n)?;
        if samples.is_empty() {
            return Ok(HealthAverages::default());
        }

        let count = samples.len() as f64;
        Ok(HealthAverages {
            avg_cpu_percent: samples.iter().map(|s| s.cpu_percent).sum::<f64>() / count,
            avg_memory_percent: samples.iter().map(|s| s.memory_percent).sum::<f64>() / count,
            avg_disk_percent: samples.iter().map(|s| s.disk_percent).sum::<f64>() / count,
            avg_net_bytes_sent: samples.iter().map(|s| s.net_bytes_sent as f64).sum::<f64>()
                / count,
            avg_net_bytes_recv: samples.iter().map(|s| s.net_bytes_recv as f64).sum::<f64>()
                / count,
        })
    }

    /// Sample, persist, and flag threshold exceedances in one step
    pub fn sample_and_check(&self) -> (SystemHealthSample, HealthAlerts) {
        let sample = self.sample();
        let alerts = check_alerts(&sample, &self.thresholds);
        (sample, alerts)
    }
}

/// Compare one snapshot against thresholds
///
/// Pure function with no I/O so it stays trivially unit-testable.
pub fn check_alerts(sample: &SystemHealthSample, thresholds: &HealthThresholds) -> HealthAlerts {
    HealthAlerts {
        cpu: sample.cpu_percent > thresholds.cpu_percent,
        memory: sample.memory_percent > thresholds.memory_percent,
        disk: sample.disk_percent > thresholds.disk_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(SystemHealthSample);

    impl ResourceProbe for FixedProbe {
        fn snapshot(&self) -> SystemHealthSample {
            self.0.clone()
        }
    }

    fn sample(cpu: f64, memory: f64, disk: f64) -> SystemHealthSample {
        SystemHealthSample {
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
            net_bytes_sent: 1_000,
            net_bytes_recv: 2_000,
            timestamp: 0,
        }
    }

    fn monitor_with(probe_sample: SystemHealthSample) -> HealthMonitor {
        let store = Arc::new(MetricStore::open_in_memory().unwrap());
        store.ensure_schema().unwrap();
        HealthMonitor::new(store, HealthThresholds::default())
            .with_probe(Box::new(FixedProbe(probe_sample)))
    }

    #[test]
    fn test_check_alerts_flags_only_exceedances() {
        let alerts = check_alerts(&sample(95.0, 10.0, 10.0), &HealthThresholds::default());
        assert!(alerts.cpu);
        assert!(!alerts.memory);
        assert!(!alerts.disk);
        assert!(alerts.any());
    }

    #[test]
    fn test_check_alerts_threshold_is_exclusive() {
        // Exactly at the threshold is not an exceedance
        let alerts = check_alerts(&sample(90.0, 90.0, 90.0), &HealthThresholds::default());
        assert!(!alerts.any());
    }

    #[test]
    fn test_check_alerts_custom_thresholds() {
        let thresholds = HealthThresholds {
            cpu_percent: 50.0,
            memory_percent: 50.0,
            disk_percent: 50.0,
        };
        let alerts = check_alerts(&sample(60.0, 40.0, 70.0), &thresholds);
        assert!(alerts.cpu);
        assert!(!alerts.memory);
        assert!(alerts.disk);
    }

    #[test]
    fn test_rolling_average_empty_store_is_zero() {
        let monitor = monitor_with(sample(0.0, 0.0, 0.0));
        let avg = monitor.rolling_average(10).unwrap();
        assert_eq!(avg, HealthAverages::default());
    }

    #[test]
    fn test_sample_persists_and_rolling_average_windows() {
        let monitor = monitor_with(sample(40.0, 60.0, 30.0));
        for _ in 0..5 {
            monitor.sample();
        }

        let avg = monitor.rolling_average(10).unwrap();
        assert_eq!(avg.avg_cpu_percent, 40.0);
        assert_eq!(avg.avg_memory_percent, 60.0);
        assert_eq!(avg.avg_net_bytes_sent, 1_000.0);
    }

    #[test]
    fn test_rolling_average_uses_last_n() {
        let store = Arc::new(MetricStore::open_in_memory().unwrap());
        store.ensure_schema().unwrap();

        // Two old heavy samples, then three light ones
        for cpu in [100.0, 100.0, 10.0, 10.0, 10.0] {
            store.append_health(&sample(cpu, 0.0, 0.0)).unwrap();
        }

        let monitor = HealthMonitor::new(store, HealthThresholds::default());
        let avg = monitor.rolling_average(3).unwrap();
        assert_eq!(avg.avg_cpu_percent, 10.0);
    }

    #[test]
    fn test_sample_and_check() {
        let monitor = monitor_with(sample(95.0, 10.0, 10.0));
        let (snapshot, alerts) = monitor.sample_and_check();
        assert_eq!(snapshot.cpu_percent, 95.0);
        assert!(alerts.cpu);
        assert!(!alerts.memory);
    }
}
