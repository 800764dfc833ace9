//! Fixed-size, time-spaced batch collection.

use crate::config::Pacing;
use crate::error::Result;
use crate::record::{Batch, TelemetryRecord};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Anything that can hand out one record at a time.
#[async_trait]
pub trait RecordSource: Send {
    /// Produce the next record. Must not block on hardware.
    fn next_record(&mut self) -> TelemetryRecord;

    /// Release background resources. Called once during shutdown.
    async fn shutdown(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

/// Collects batches with a fixed spacing between records.
#[derive(Debug, Clone, Copy)]
pub struct BatchCollector {
    pacing: Pacing,
}

impl BatchCollector {
    pub fn new(pacing: Pacing) -> Self {
        Self { pacing }
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Collect exactly `count` records, sleeping between consecutive records
    /// but not after the last one.
    pub async fn collect<S>(&self, source: &mut S, count: usize) -> Batch
    where
        S: RecordSource + ?Sized,
    {
        let spacing = self.pacing.spacing();
        let mut batch = Batch::with_capacity(count);

        for index in 0..count {
            batch.push(source.next_record());
            if index + 1 < count {
                tokio::time::sleep(spacing).await;
            }
        }

        debug!(
            records = batch.len(),
            spacing_ms = spacing.as_millis() as u64,
            "Batch collected"
        );
        batch
    }
}
