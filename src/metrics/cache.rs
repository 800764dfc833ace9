//! TTL-gated cache of host health metrics.
//!
//! There is no background task: the cache refreshes itself on read when the
//! previous refresh attempt is older than the TTL. All four metrics share one
//! refresh timestamp, which is advanced even when some of them fail, so a
//! metric that failed stays at its fallback value until the next window.

use super::probe::{HostProbe, SysinfoProbe};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// How long host metrics are served before being recomputed.
pub const DEFAULT_METRICS_TTL: Duration = Duration::from_secs(60);

/// Copy of the cached host metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemMetricsSnapshot {
    /// CPU temperature in whole degrees Celsius (0.0 when unavailable)
    pub cpu_temperature: f64,
    /// CPU usage percentage (0.0 when unavailable)
    pub cpu_usage: f64,
    /// Memory usage percentage (0.0 when unavailable)
    pub memory_usage: f64,
    /// Free disk space in MB (0.0 when unavailable)
    pub free_disk_mb: f64,
    /// When the four fields were last recomputed
    #[serde(skip)]
    pub refreshed_at: Instant,
}

/// Host metrics cache with a single owner.
///
/// Reads take `&mut self`: the foreground path is the only user, so no lock
/// is needed.
pub struct SystemMetricsCache<P: HostProbe = SysinfoProbe> {
    probe: P,
    ttl: Duration,
    current: Option<SystemMetricsSnapshot>,
}

impl SystemMetricsCache<SysinfoProbe> {
    /// Cache over the local host with the default TTL.
    pub fn with_defaults() -> Self {
        Self::new(SysinfoProbe::new(), DEFAULT_METRICS_TTL)
    }
}

impl<P: HostProbe> SystemMetricsCache<P> {
    pub fn new(probe: P, ttl: Duration) -> Self {
        Self {
            probe,
            ttl,
            current: None,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached metrics, recomputing them first if the TTL expired.
    pub fn snapshot(&mut self) -> SystemMetricsSnapshot {
        let now = Instant::now();
        match self.current {
            Some(snapshot) if now.duration_since(snapshot.refreshed_at) < self.ttl => snapshot,
            _ => {
                let snapshot = self.refresh(now);
                self.current = Some(snapshot);
                snapshot
            }
        }
    }

    fn refresh(&mut self, now: Instant) -> SystemMetricsSnapshot {
        // Whole degrees, like the Pi's own thermal readout
        let cpu_temperature = fallback("cpu_temperature", self.probe.cpu_temperature()).round();
        let cpu_usage = fallback("cpu_usage", self.probe.cpu_usage());
        let memory_usage = fallback("memory_usage", self.probe.memory_usage());
        let free_disk_mb = fallback("free_disk_mb", self.probe.free_disk_mb());

        debug!(
            cpu_temperature,
            cpu_usage, memory_usage, free_disk_mb, "System metrics cache refreshed"
        );

        SystemMetricsSnapshot {
            cpu_temperature,
            cpu_usage,
            memory_usage,
            free_disk_mb,
            refreshed_at: now,
        }
    }
}

fn fallback(metric: &'static str, value: crate::Result<f64>) -> f64 {
    value.unwrap_or_else(|err| {
        warn!(metric, error = %err, "Host metric unavailable, using 0");
        0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TelemetryError;

    #[derive(Default)]
    struct ScriptedProbe {
        calls: u32,
        fail_memory: bool,
        fraction: f64,
    }

    impl HostProbe for ScriptedProbe {
        fn cpu_temperature(&mut self) -> crate::Result<f64> {
            self.calls += 1;
            Ok(40.0 + self.calls as f64 + self.fraction)
        }

        fn cpu_usage(&mut self) -> crate::Result<f64> {
            Ok(12.5)
        }

        fn memory_usage(&mut self) -> crate::Result<f64> {
            if self.fail_memory {
                Err(TelemetryError::metric_error("meminfo unreadable"))
            } else {
                Ok(33.3)
            }
        }

        fn free_disk_mb(&mut self) -> crate::Result<f64> {
            Ok(2048.0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_within_ttl_share_timestamp() {
        let mut cache = SystemMetricsCache::new(ScriptedProbe::default(), DEFAULT_METRICS_TTL);
        let first = cache.snapshot();
        tokio::time::advance(Duration::from_secs(30)).await;
        let second = cache.snapshot();

        assert_eq!(first.refreshed_at, second.refreshed_at);
        assert_eq!(first.cpu_temperature, second.cpu_temperature);
        assert_eq!(cache.probe.calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_after_ttl_refreshes() {
        let mut cache = SystemMetricsCache::new(ScriptedProbe::default(), DEFAULT_METRICS_TTL);
        let first = cache.snapshot();
        tokio::time::advance(Duration::from_secs(61)).await;
        let second = cache.snapshot();

        assert!(second.refreshed_at > first.refreshed_at);
        assert_eq!(second.cpu_temperature, 42.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_keeps_other_metrics() {
        let probe = ScriptedProbe {
            fail_memory: true,
            ..Default::default()
        };
        let mut cache = SystemMetricsCache::new(probe, DEFAULT_METRICS_TTL);
        let snapshot = cache.snapshot();

        assert_eq!(snapshot.memory_usage, 0.0);
        assert_eq!(snapshot.cpu_usage, 12.5);
        assert_eq!(snapshot.free_disk_mb, 2048.0);

        // the failed metric stays at its fallback for the whole window
        cache.probe.fail_memory = false;
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.snapshot().memory_usage, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cpu_temperature_cached_in_whole_degrees() {
        let probe = ScriptedProbe {
            fraction: 0.4,
            ..Default::default()
        };
        let mut cache = SystemMetricsCache::new(probe, DEFAULT_METRICS_TTL);
        assert_eq!(cache.snapshot().cpu_temperature, 41.0);

        cache.probe.fraction = 0.6;
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.snapshot().cpu_temperature, 43.0);
    }
}
