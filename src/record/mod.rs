//! Telemetry records: data shape, construction, and the live sampler.

pub mod builder;
pub mod data;
pub mod sampler;

// Re-export commonly used items
pub use builder::{
    celsius_to_fahrenheit, cpu_temperature_fahrenheit, round_to, CaptureWindow, RecordBuilder,
};
pub use data::{Batch, TelemetryRecord};
pub use sampler::Sampler;
