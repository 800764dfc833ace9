//! Ingestion sinks.
//!
//! The sink owns its transport, channel lifecycle and statistics. The
//! orchestrator only drives the lifecycle and asks for statistics snapshots.

pub mod jsonl;

pub use jsonl::JsonLinesSink;

use crate::error::Result;
use crate::record::Batch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Destination for telemetry batches.
#[async_trait]
pub trait IngestionSink: Send {
    /// Locate the ingestion endpoint and return a description of it.
    async fn discover(&mut self) -> Result<String>;

    /// Open the channel batches are written to.
    async fn open(&mut self) -> Result<()>;

    /// Submit one batch; returns the number of rows accepted.
    async fn insert(&mut self, batch: &Batch) -> Result<usize>;

    /// Flush and close the channel.
    async fn close(&mut self) -> Result<()>;

    /// Snapshot of cumulative statistics.
    fn statistics(&self) -> IngestionStatistics;
}

/// Cumulative counters kept by a sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestionStatistics {
    /// Batches accepted
    pub batches_sent: u64,
    /// Rows accepted
    pub rows_sent: u64,
    /// Batches rejected
    pub failed_batches: u64,
    /// Payload bytes written
    pub bytes_sent: u64,
    /// When the channel was opened
    pub opened_at: Option<DateTime<Utc>>,
}

impl IngestionStatistics {
    /// Average accepted rows per second since the channel was opened.
    pub fn rows_per_second(&self, now: DateTime<Utc>) -> Option<f64> {
        let opened_at = self.opened_at?;
        let elapsed = (now - opened_at).num_milliseconds() as f64 / 1000.0;
        (elapsed > 0.0).then(|| self.rows_sent as f64 / elapsed)
    }
}

impl fmt::Display for IngestionStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ingestion statistics:")?;
        writeln!(f, "  Batches sent:   {}", self.batches_sent)?;
        writeln!(f, "  Rows sent:      {}", self.rows_sent)?;
        writeln!(f, "  Failed batches: {}", self.failed_batches)?;
        write!(f, "  Bytes sent:     {}", self.bytes_sent)?;
        if let Some(rate) = self.rows_per_second(Utc::now()) {
            write!(f, "\n  Throughput:     {:.2} rows/sec", rate)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_second() {
        let opened = Utc::now();
        let stats = IngestionStatistics {
            rows_sent: 100,
            opened_at: Some(opened),
            ..Default::default()
        };
        let rate = stats
            .rows_per_second(opened + chrono::Duration::seconds(20))
            .unwrap();
        assert!((rate - 5.0).abs() < 1e-9);
        assert_eq!(IngestionStatistics::default().rows_per_second(opened), None);
    }

    #[test]
    fn test_display_lists_counters() {
        let stats = IngestionStatistics {
            batches_sent: 3,
            rows_sent: 30,
            failed_batches: 1,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("Batches sent:   3"));
        assert!(text.contains("Rows sent:      30"));
        assert!(text.contains("Failed batches: 1"));
        assert!(!text.contains("Throughput"));
    }
}
