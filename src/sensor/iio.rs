//! Weather HAT sensors exposed through the Linux IIO sysfs interface.
//!
//! With `dtoverlay=i2c-sensor,bme280` and the `ltr501` driver loaded, the
//! kernel publishes the BME280 and LTR-559 as directories under
//! `/sys/bus/iio/devices/`. Reading those files needs no I2C access from
//! userspace.

use super::source::{dewpoint_celsius, SampleSource, SensorReading};
use crate::error::{Result, TelemetryError};
use std::fs;
use std::path::{Path, PathBuf};

/// Default BME280 device directory on a Pi with a single IIO device.
pub const DEFAULT_IIO_DEVICE: &str = "/sys/bus/iio/devices/iio:device0";

/// Default heat offset subtracted from the die temperature.
pub const DEFAULT_TEMPERATURE_OFFSET: f64 = 7.5;

const TEMPERATURE_FILE: &str = "in_temp_input";
const HUMIDITY_FILE: &str = "in_humidityrelative_input";
const PRESSURE_FILE: &str = "in_pressure_input";
const ILLUMINANCE_FILE: &str = "in_illuminance_input";

/// Sample source backed by IIO sysfs attribute files.
#[derive(Debug, Clone)]
pub struct IioSource {
    device_dir: PathBuf,
    light_dir: Option<PathBuf>,
    temperature_offset: f64,
}

impl IioSource {
    /// Create a source reading the BME280 attributes from `device_dir`.
    pub fn new(device_dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: device_dir.into(),
            light_dir: None,
            temperature_offset: DEFAULT_TEMPERATURE_OFFSET,
        }
    }

    /// Read illuminance from a separate light sensor device.
    pub fn with_light_device(mut self, light_dir: impl Into<PathBuf>) -> Self {
        self.light_dir = Some(light_dir.into());
        self
    }

    /// Set the board heating compensation in °C.
    pub fn with_temperature_offset(mut self, offset: f64) -> Self {
        self.temperature_offset = offset;
        self
    }

    /// Check that every attribute this source needs is present.
    ///
    /// Used at startup when real sensors are mandatory.
    pub fn verify(&self) -> Result<()> {
        let mut required = vec![
            self.device_dir.join(TEMPERATURE_FILE),
            self.device_dir.join(HUMIDITY_FILE),
            self.device_dir.join(PRESSURE_FILE),
        ];
        if let Some(light_dir) = &self.light_dir {
            required.push(light_dir.join(ILLUMINANCE_FILE));
        }

        for path in required {
            if !path.exists() {
                return Err(TelemetryError::initialization_error(format!(
                    "Sensor attribute {} not found",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    fn read_value(dir: &Path, attribute: &str) -> Result<f64> {
        let path = dir.join(attribute);
        let raw = fs::read_to_string(&path).map_err(|e| {
            TelemetryError::sensor_error(format!("Failed to read {}: {}", path.display(), e))
        })?;
        raw.trim().parse::<f64>().map_err(|e| {
            TelemetryError::sensor_error(format!(
                "Unparseable value {:?} in {}: {}",
                raw.trim(),
                path.display(),
                e
            ))
        })
    }
}

impl SampleSource for IioSource {
    fn name(&self) -> &str {
        "iio"
    }

    fn poll(&mut self) -> Result<SensorReading> {
        // milli-°C, milli-percent and kPa respectively
        let device_temperature = Self::read_value(&self.device_dir, TEMPERATURE_FILE)? / 1000.0;
        let humidity = Self::read_value(&self.device_dir, HUMIDITY_FILE)? / 1000.0;
        let pressure = Self::read_value(&self.device_dir, PRESSURE_FILE)? * 10.0;

        let illuminance = match &self.light_dir {
            Some(dir) => Self::read_value(dir, ILLUMINANCE_FILE)?,
            None => 0.0,
        };

        let temperature = device_temperature - self.temperature_offset;

        Ok(SensorReading {
            temperature,
            humidity,
            pressure,
            device_temperature,
            dewpoint: dewpoint_celsius(temperature, humidity),
            illuminance,
        })
    }
}
