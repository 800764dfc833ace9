//! Environmental sensor sampling.
//!
//! Hardware polls can take a second or more (the BME280 needs a measurement
//! cycle, I2C can stall), so readings are never taken on the record path.
//! A [`SensorCache`] owns a background poller and hands out copies of the
//! latest reading instead.

pub mod cache;
pub mod iio;
pub mod simulated;
pub mod source;

// Re-export commonly used items
pub use cache::{CacheStatus, FailurePolicy, SensorCache, SensorSnapshot};
pub use iio::IioSource;
pub use simulated::SimulatedSource;
pub use source::{dewpoint_celsius, SampleSource, SensorReading};
