//! Top-level control loop: batch cadence, failure containment and ordered
//! shutdown.

use crate::batch::{BatchCollector, RecordSource};
use crate::config::StreamConfig;
use crate::error::{Result, TelemetryError};
use crate::shutdown::ShutdownSignal;
use crate::sink::IngestionSink;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// A statistics snapshot is logged after every this many cycles.
pub const STATISTICS_EVERY: u64 = 10;

/// Orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Initializing,
    Running,
    Stopping,
    Stopped,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Batch cycles started
    pub cycles: u64,
    /// Batches the sink rejected
    pub failed_batches: u64,
    /// Rows the sink reported as accepted
    pub rows_accepted: u64,
}

/// Drives collection and submission until a stop is requested.
pub struct Orchestrator<K, R> {
    sink: K,
    source: R,
    collector: BatchCollector,
    batch_size: usize,
    cadence: Duration,
    stop_timeout: Duration,
    shutdown: ShutdownSignal,
    phase: Phase,
}

impl<K: IngestionSink, R: RecordSource> Orchestrator<K, R> {
    pub fn new(sink: K, source: R, config: &StreamConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            sink,
            source,
            collector: BatchCollector::new(config.record_pacing()),
            batch_size: config.batch_size,
            cadence: config.interval(),
            stop_timeout: config.sensor.stop_timeout(),
            shutdown,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    /// Initialize the sink, loop until stopped, then release everything.
    ///
    /// Only initialization failures are returned; per-batch failures are
    /// logged and counted in the summary.
    pub async fn run(&mut self) -> Result<RunSummary> {
        if let Err(err) = self.initialize().await {
            error!(error = %err, "Initialization failed, exiting");
            self.phase = Phase::Stopping;
            if let Err(e) = self.source.shutdown(self.stop_timeout).await {
                error!(error = %e, "Failed to stop sample source");
            }
            self.phase = Phase::Stopped;
            return Err(err);
        }

        let summary = self.run_cycles().await;
        self.stop().await;

        info!(
            cycles = summary.cycles,
            failed_batches = summary.failed_batches,
            rows = summary.rows_accepted,
            "Run finished"
        );
        Ok(summary)
    }

    async fn initialize(&mut self) -> Result<()> {
        self.phase = Phase::Initializing;
        info!("Setting up ingestion channel...");

        let endpoint = self.sink.discover().await.map_err(into_initialization)?;
        info!(%endpoint, "Ingestion endpoint discovered");

        self.sink.open().await.map_err(into_initialization)?;
        info!("Ingestion channel ready");
        Ok(())
    }

    async fn run_cycles(&mut self) -> RunSummary {
        self.phase = Phase::Running;
        info!(
            batch_size = self.batch_size,
            cadence_ms = self.cadence.as_millis() as u64,
            spacing_ms = self.collector.pacing().spacing().as_millis() as u64,
            "Starting telemetry collection"
        );

        let mut summary = RunSummary::default();
        while !self.shutdown.is_requested() {
            summary.cycles += 1;
            let cycle = summary.cycles;
            let started = Instant::now();

            debug!(batch = cycle, "Collecting batch");
            let batch = self.collector.collect(&mut self.source, self.batch_size).await;

            if let Some(sample) = batch.first() {
                info!(
                    batch = cycle,
                    temperature_f = sample.temperature,
                    humidity = sample.humidity,
                    pressure_hpa = sample.pressure,
                    lux = sample.lux,
                    host = %sample.hostname,
                    "Sample reading"
                );
            }

            match self.sink.insert(&batch).await {
                Ok(rows) => {
                    summary.rows_accepted += rows as u64;
                    info!(batch = cycle, rows, "Batch sent");
                }
                Err(err) => {
                    summary.failed_batches += 1;
                    error!(batch = cycle, error = %err, "Failed to insert batch; dropping it");
                }
            }

            if cycle % STATISTICS_EVERY == 0 {
                info!("{}", self.sink.statistics());
            }

            let pause = self.cadence.saturating_sub(started.elapsed());
            if !pause.is_zero() && !self.shutdown.is_requested() {
                debug!(wait_ms = pause.as_millis() as u64, "Waiting until next batch");
                tokio::time::sleep(pause).await;
            }
        }
        summary
    }

    /// Release resources in order: final statistics, sink channel, sample
    /// source. A failing step does not prevent the next one.
    async fn stop(&mut self) {
        self.phase = Phase::Stopping;
        info!("Shutting down...");

        info!("{}", self.sink.statistics());

        if let Err(err) = self.sink.close().await {
            error!(error = %err, "Failed to close ingestion channel");
        }

        if let Err(err) = self.source.shutdown(self.stop_timeout).await {
            error!(error = %err, "Failed to stop sample source");
        }

        self.phase = Phase::Stopped;
        info!("Shutdown complete");
    }
}

fn into_initialization(err: TelemetryError) -> TelemetryError {
    match err {
        TelemetryError::Initialization(_) => err,
        other => TelemetryError::initialization_error(other.to_string()),
    }
}
