//! Sample source abstraction over the Weather HAT sensors.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One instantaneous reading from the environmental sensors.
///
/// Temperatures are in Celsius, pressure in hPa, humidity in percent and
/// illuminance in lux.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Ambient temperature, compensated for board heating
    pub temperature: f64,
    /// Relative humidity
    pub humidity: f64,
    /// Barometric pressure
    pub pressure: f64,
    /// Raw temperature at the sensor die
    pub device_temperature: f64,
    /// Dewpoint
    pub dewpoint: f64,
    /// Ambient light level
    pub illuminance: f64,
}

/// A device (or simulator) that can produce one reading on demand.
///
/// `poll` may block for as long as the hardware needs; callers run it off
/// the async runtime. Implementations do not retry internally.
pub trait SampleSource: Send + 'static {
    /// Short human-readable name used in logs.
    fn name(&self) -> &str;

    /// Take one reading.
    fn poll(&mut self) -> Result<SensorReading>;
}

/// Dewpoint approximation used by the Weather HAT library.
///
/// Accurate to about 1 °C above 50 % relative humidity.
pub fn dewpoint_celsius(temperature: f64, humidity: f64) -> f64 {
    temperature - (100.0 - humidity) / 5.0
}
