//! JSON lines sink writing one record per line to stdout or a file.

use super::{IngestionSink, IngestionStatistics};
use crate::error::{Result, TelemetryError};
use crate::record::Batch;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

type Channel = Box<dyn AsyncWrite + Unpin + Send>;

/// Sink appending newline-delimited JSON records.
pub struct JsonLinesSink {
    path: Option<PathBuf>,
    channel: Option<Channel>,
    stats: IngestionStatistics,
}

impl JsonLinesSink {
    /// Sink writing to `path`, or to stdout when `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            channel: None,
            stats: IngestionStatistics::default(),
        }
    }

    pub fn stdout() -> Self {
        Self::new(None)
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Some(path.into()))
    }

    fn endpoint(&self) -> String {
        match &self.path {
            Some(path) => format!("file://{}", path.display()),
            None => "stdout".to_string(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }
}

#[async_trait]
impl IngestionSink for JsonLinesSink {
    async fn discover(&mut self) -> Result<String> {
        if let Some(parent) = self.path.as_ref().and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(TelemetryError::initialization_error(format!(
                    "Output directory {} does not exist",
                    parent.display()
                )));
            }
        }
        Ok(self.endpoint())
    }

    async fn open(&mut self) -> Result<()> {
        if self.channel.is_some() {
            return Ok(());
        }
        let channel: Channel = match &self.path {
            Some(path) => Box::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|e| {
                        TelemetryError::initialization_error(format!(
                            "Failed to open {}: {}",
                            path.display(),
                            e
                        ))
                    })?,
            ),
            None => Box::new(tokio::io::stdout()),
        };
        self.channel = Some(channel);
        self.stats.opened_at = Some(Utc::now());
        info!(endpoint = %self.endpoint(), "Ingestion channel opened");
        Ok(())
    }

    async fn insert(&mut self, batch: &Batch) -> Result<usize> {
        let Some(channel) = self.channel.as_mut() else {
            self.stats.failed_batches += 1;
            return Err(TelemetryError::ingestion_error("channel is not open"));
        };

        let mut payload = Vec::new();
        for record in batch {
            if let Err(e) = serde_json::to_writer(&mut payload, record) {
                self.stats.failed_batches += 1;
                return Err(e.into());
            }
            payload.push(b'\n');
        }

        let written = async {
            channel.write_all(&payload).await?;
            channel.flush().await
        }
        .await;

        if let Err(e) = written {
            self.stats.failed_batches += 1;
            return Err(TelemetryError::ingestion_error(format!(
                "Failed to write batch: {}",
                e
            )));
        }

        self.stats.batches_sent += 1;
        self.stats.rows_sent += batch.len() as u64;
        self.stats.bytes_sent += payload.len() as u64;
        debug!(rows = batch.len(), bytes = payload.len(), "Batch written");
        Ok(batch.len())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut channel) = self.channel.take() {
            channel
                .shutdown()
                .await
                .map_err(|e| TelemetryError::shutdown_error(format!("Failed to close channel: {}", e)))?;
            info!(endpoint = %self.endpoint(), "Ingestion channel closed");
        }
        Ok(())
    }

    fn statistics(&self) -> IngestionStatistics {
        self.stats.clone()
    }
}
