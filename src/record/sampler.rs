//! Live record source combining the sensor cache and host metrics.

use super::builder::{CaptureWindow, RecordBuilder};
use super::data::TelemetryRecord;
use crate::batch::RecordSource;
use crate::error::Result;
use crate::metrics::{HostProbe, SysinfoProbe, SystemMetricsCache};
use crate::sensor::SensorCache;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Produces records from cached state only; never touches the hardware.
pub struct Sampler<P: HostProbe = SysinfoProbe> {
    sensor: Arc<SensorCache>,
    metrics: SystemMetricsCache<P>,
    builder: RecordBuilder,
    stale_after: Duration,
}

impl<P: HostProbe> Sampler<P> {
    pub fn new(sensor: Arc<SensorCache>, metrics: SystemMetricsCache<P>, builder: RecordBuilder) -> Self {
        let stale_after = sensor.config().stale_after();
        Self {
            sensor,
            metrics,
            builder,
            stale_after,
        }
    }

    pub fn sensor(&self) -> &Arc<SensorCache> {
        &self.sensor
    }

    pub fn builder(&self) -> &RecordBuilder {
        &self.builder
    }

    /// Read both caches and build one record.
    pub fn sample(&mut self) -> TelemetryRecord {
        let started_at = Utc::now();

        let sensor = self.sensor.snapshot();
        if sensor.is_stale(self.stale_after) {
            warn!(
                staleness_ms = sensor.staleness.map(|age| age.as_millis() as u64),
                sequence = sensor.sequence,
                "Sensor cache is stale; serving last known values"
            );
        }
        let metrics = self.metrics.snapshot();

        let window = CaptureWindow {
            started_at,
            finished_at: Utc::now(),
        };
        self.builder.build(&sensor, &metrics, window)
    }
}

#[async_trait]
impl<P: HostProbe + Send> RecordSource for Sampler<P> {
    fn next_record(&mut self) -> TelemetryRecord {
        self.sample()
    }

    async fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        self.sensor.stop(timeout).await
    }
}
