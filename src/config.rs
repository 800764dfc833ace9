//! Streaming configuration.

use crate::error::{Result, TelemetryError};
use crate::sensor::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Inter-record delay used in fast mode, regardless of the batch interval.
pub const FAST_MODE_SPACING: Duration = Duration::from_millis(50);

/// Lower bound on inter-record spacing outside fast mode.
pub const MIN_RECORD_SPACING: Duration = Duration::from_millis(500);

/// Top-level configuration for a streaming run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Number of records per batch
    pub batch_size: usize,
    /// Target period between batch submissions in milliseconds
    pub interval_ms: u64,
    /// Collect records back to back with a minimal fixed delay
    pub fast_mode: bool,
    /// Time-to-live of the host metrics cache in milliseconds
    pub metrics_ttl_ms: u64,
    /// Background sensor polling settings
    pub sensor: SensorCacheConfig,
    /// Where accepted batches are written
    pub sink: SinkConfig,
}

/// Settings for the background sensor cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorCacheConfig {
    /// Period between hardware polls in milliseconds
    pub refresh_interval_ms: u64,
    /// Granularity at which the poller checks for a stop request
    pub tick_ms: u64,
    /// Maximum time `stop` waits for the poller to exit
    pub stop_timeout_ms: u64,
    /// What the cache holds after a failed poll
    pub failure_policy: FailurePolicy,
}

/// Settings for the JSON lines sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Output file (appended to); stdout when unset
    pub output: Option<PathBuf>,
}

/// How records inside one batch are spaced in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Wait the given delay between consecutive records
    Spaced(Duration),
    /// Wait [`FAST_MODE_SPACING`] between consecutive records
    Fast,
}

impl Pacing {
    /// Delay inserted between two consecutive records.
    pub fn spacing(&self) -> Duration {
        match self {
            Pacing::Spaced(delay) => *delay,
            Pacing::Fast => FAST_MODE_SPACING,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            interval_ms: 5_000,
            fast_mode: false,
            metrics_ttl_ms: 60_000,
            sensor: SensorCacheConfig::default(),
            sink: SinkConfig::default(),
        }
    }
}

impl Default for SensorCacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 3_000,
            tick_ms: 100,
            stop_timeout_ms: 2_000,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl StreamConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TelemetryError::config_error(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: StreamConfig = serde_json::from_str(&raw).map_err(|e| {
            TelemetryError::config_error(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(TelemetryError::config_error("batch_size must be at least 1"));
        }
        if u32::try_from(self.batch_size).is_err() {
            return Err(TelemetryError::config_error(format!(
                "batch_size must be at most {}",
                u32::MAX
            )));
        }
        if self.interval_ms == 0 {
            return Err(TelemetryError::config_error("interval_ms must be positive"));
        }
        if self.metrics_ttl_ms == 0 {
            return Err(TelemetryError::config_error("metrics_ttl_ms must be positive"));
        }
        self.sensor.validate()
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the batch interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = interval.as_millis() as u64;
        self
    }

    /// Enable or disable fast mode.
    pub fn with_fast_mode(mut self, fast_mode: bool) -> Self {
        self.fast_mode = fast_mode;
        self
    }

    /// Set the sink output file.
    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.sink.output = output;
        self
    }

    /// Set the sensor cache settings.
    pub fn with_sensor(mut self, sensor: SensorCacheConfig) -> Self {
        self.sensor = sensor;
        self
    }

    /// Target cadence between batch submissions.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Host metrics cache TTL.
    pub fn metrics_ttl(&self) -> Duration {
        Duration::from_millis(self.metrics_ttl_ms)
    }

    /// Per-record pacing derived from the cadence and batch size.
    ///
    /// Outside fast mode the batch is spread over the cadence window, but
    /// never tighter than [`MIN_RECORD_SPACING`]. Batch sizes beyond `u32`
    /// saturate, which only matters for configs that skipped [`validate`].
    ///
    /// [`validate`]: StreamConfig::validate
    pub fn record_pacing(&self) -> Pacing {
        if self.fast_mode {
            return Pacing::Fast;
        }
        let divisor = u32::try_from(self.batch_size.max(1)).unwrap_or(u32::MAX);
        let per_record = self.interval() / divisor;
        Pacing::Spaced(per_record.max(MIN_RECORD_SPACING))
    }
}

impl SensorCacheConfig {
    /// Reject zero-length polling periods.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_ms == 0 {
            return Err(TelemetryError::config_error(
                "sensor.refresh_interval_ms must be positive",
            ));
        }
        if self.tick_ms == 0 {
            return Err(TelemetryError::config_error("sensor.tick_ms must be positive"));
        }
        Ok(())
    }

    /// Set the refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the stop-check tick.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick_ms = tick.as_millis() as u64;
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Age beyond which a snapshot is reported as stale.
    pub fn stale_after(&self) -> Duration {
        self.refresh_interval() * 3
    }
}
