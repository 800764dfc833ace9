//! # weather_pi - Raspberry Pi Weather HAT telemetry streamer
//!
//! Samples the Weather HAT environmental sensors and host health metrics,
//! builds normalized telemetry records and submits them in paced batches to
//! an ingestion sink.
//!
//! ## Architecture
//!
//! - **Sensor cache**: a background task polls the hardware every few
//!   seconds; record production only ever reads the cached copy
//! - **Host metrics cache**: CPU temperature/usage, memory and disk, refreshed
//!   on read once a minute
//! - **Record builder**: unit conversion, rounding and identifiers
//! - **Batch collector + orchestrator**: fixed-size batches on a target
//!   cadence, with failed batches dropped rather than retried
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weather_pi::{
//!     HostIdentity, JsonLinesSink, Orchestrator, RecordBuilder, Sampler, SensorCache,
//!     ShutdownSignal, SimulatedSource, StreamConfig, SystemMetricsCache,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StreamConfig::default();
//!     let sensor = Arc::new(SensorCache::new(SimulatedSource::new(), config.sensor.clone()));
//!     sensor.start()?;
//!
//!     let sampler = Sampler::new(
//!         sensor,
//!         SystemMetricsCache::with_defaults(),
//!         RecordBuilder::new(HostIdentity::resolve()),
//!     );
//!     let shutdown = ShutdownSignal::new();
//!     shutdown.listen_for_os_signals();
//!
//!     let mut app = Orchestrator::new(JsonLinesSink::stdout(), sampler, &config, shutdown);
//!     app.run().await?;
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod record;
pub mod sensor;
pub mod shutdown;
pub mod sink;

// Re-export public API
pub use batch::{BatchCollector, RecordSource};
pub use config::{Pacing, SensorCacheConfig, SinkConfig, StreamConfig};
pub use error::{Result, TelemetryError};
pub use metrics::{HostIdentity, HostProbe, SysinfoProbe, SystemMetricsCache, SystemMetricsSnapshot};
pub use orchestrator::{Orchestrator, Phase, RunSummary};
pub use record::{Batch, CaptureWindow, RecordBuilder, Sampler, TelemetryRecord};
pub use sensor::{
    CacheStatus, FailurePolicy, IioSource, SampleSource, SensorCache, SensorReading,
    SensorSnapshot, SimulatedSource,
};
pub use shutdown::ShutdownSignal;
pub use sink::{IngestionSink, IngestionStatistics, JsonLinesSink};
