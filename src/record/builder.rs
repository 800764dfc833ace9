//! Merging cached sensor and host data into telemetry records.

use super::data::TelemetryRecord;
use crate::metrics::{HostIdentity, SystemMetricsSnapshot};
use crate::sensor::SensorSnapshot;
use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

/// Prefix of every correlation id.
pub const CORRELATION_PREFIX: &str = "wthr";

const ID_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const DISPLAY_TIME_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Convert Celsius to Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Whole-degree Fahrenheit CPU temperature.
///
/// The Celsius value is rounded to a whole degree first, then the converted
/// value is rounded again.
pub fn cpu_temperature_fahrenheit(celsius: f64) -> i64 {
    celsius_to_fahrenheit(celsius.round()).round() as i64
}

/// Start and end of one record capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureWindow {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CaptureWindow {
    /// A zero-length window at `at`.
    pub fn instant(at: DateTime<Utc>) -> Self {
        Self {
            started_at: at,
            finished_at: at,
        }
    }

    fn elapsed_secs(&self) -> f64 {
        let micros = (self.finished_at - self.started_at)
            .num_microseconds()
            .unwrap_or_default()
            .max(0);
        micros as f64 / 1_000_000.0
    }
}

/// Builds records for one host. Holds only the static identity.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    identity: HostIdentity,
}

impl RecordBuilder {
    pub fn new(identity: HostIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    /// Combine one sensor snapshot and one metrics snapshot into a record.
    ///
    /// Only the identifiers are random; every other field is a deterministic
    /// function of the inputs.
    pub fn build(
        &self,
        sensor: &SensorSnapshot,
        metrics: &SystemMetricsSnapshot,
        window: CaptureWindow,
    ) -> TelemetryRecord {
        let reading = &sensor.reading;
        let started = window.started_at;
        let elapsed = window.elapsed_secs();
        let stamp = started.format(ID_TIMESTAMP_FORMAT).to_string();

        let unique_id = Uuid::new_v4();
        let correlation_id = format!("{}_{}_{}", CORRELATION_PREFIX, random_token(), stamp);
        let row_id = format!("{}_{}", stamp, unique_id);

        let end_epoch = window.finished_at.timestamp_micros() as f64 / 1_000_000.0;
        let display_time = started.format(DISPLAY_TIME_FORMAT).to_string();

        TelemetryRecord {
            unique_id,
            captured_at: started,
            correlation_id,
            ip_address: self.identity.ip_address.clone(),
            cpu_temperature_f: cpu_temperature_fahrenheit(metrics.cpu_temperature),
            runtime: elapsed.round() as i64,
            host: self.identity.hostname.clone(),
            hostname: self.identity.hostname.clone(),
            mac_address: self.identity.mac_address.clone(),
            end_time: end_epoch.to_string(),
            elapsed: elapsed.to_string(),
            cpu_usage: round_to(metrics.cpu_usage, 1),
            disk_usage: format!("{:.1} MB", metrics.free_disk_mb),
            memory_usage: round_to(metrics.memory_usage, 1),
            row_id,
            system_time: display_time.clone(),
            ts: started.timestamp(),
            start_time: display_time,
            pressure: round_to(reading.pressure, 2),
            temperature: round_to(celsius_to_fahrenheit(reading.temperature), 2),
            humidity: round_to(reading.humidity, 2),
            device_temperature: round_to(celsius_to_fahrenheit(reading.device_temperature), 2),
            dewpoint: round_to(celsius_to_fahrenheit(reading.dewpoint), 2),
            lux: round_to(reading.illuminance, 2),
        }
    }
}

/// Three random lowercase ASCII letters.
fn random_token() -> String {
    let mut rng = rand::rng();
    (0..3)
        .map(|_| char::from(b'a' + rng.random_range(0..26u8)))
        .collect()
}
