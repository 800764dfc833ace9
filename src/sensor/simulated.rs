//! Simulated Weather HAT for development machines without the hardware.

use super::source::{dewpoint_celsius, SampleSource, SensorReading};
use crate::error::Result;
use rand::Rng;

/// Heat the board adds on top of ambient, as seen by the sensor die.
const BOARD_HEATING_CELSIUS: f64 = 7.5;

/// Random-walk generator around typical indoor conditions.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    temperature: f64,
    humidity: f64,
    pressure: f64,
    illuminance: f64,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self {
            temperature: 25.0,
            humidity: 15.0,
            pressure: 1020.0,
            illuminance: 24.0,
        }
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    fn poll(&mut self) -> Result<SensorReading> {
        let mut rng = rand::rng();

        self.temperature = (self.temperature + rng.random_range(-0.2..=0.2)).clamp(15.0, 35.0);
        self.humidity = (self.humidity + rng.random_range(-0.5..=0.5)).clamp(5.0, 95.0);
        self.pressure = (self.pressure + rng.random_range(-0.3..=0.3)).clamp(980.0, 1050.0);
        self.illuminance = (self.illuminance + rng.random_range(-2.0..=2.0)).clamp(0.0, 2000.0);

        Ok(SensorReading {
            temperature: self.temperature,
            humidity: self.humidity,
            pressure: self.pressure,
            device_temperature: self.temperature + BOARD_HEATING_CELSIUS,
            dewpoint: dewpoint_celsius(self.temperature, self.humidity),
            illuminance: self.illuminance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_values_stay_in_range() {
        let mut source = SimulatedSource::new();
        for _ in 0..500 {
            let reading = source.poll().unwrap();
            assert!((15.0..=35.0).contains(&reading.temperature));
            assert!((5.0..=95.0).contains(&reading.humidity));
            assert!((980.0..=1050.0).contains(&reading.pressure));
            assert!(reading.illuminance >= 0.0);
            assert!(reading.device_temperature > reading.temperature);
        }
    }
}
