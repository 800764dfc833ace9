//! Telemetry record and batch structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One normalized telemetry row, in the shape the ingestion table expects.
///
/// Temperatures are Fahrenheit. The JSON keys are fixed by the downstream
/// table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Random per-record id; embedded in `row_id`
    #[serde(skip)]
    pub unique_id: Uuid,
    /// When the capture started; `ts`/`systemtime` are derived from it
    #[serde(skip)]
    pub captured_at: DateTime<Utc>,
    /// Compact correlation id (`wthr_<token>_<YYYYMMDDHHMMSS>`)
    #[serde(rename = "uuid")]
    pub correlation_id: String,
    #[serde(rename = "ipaddress")]
    pub ip_address: String,
    #[serde(rename = "cputempf")]
    pub cpu_temperature_f: i64,
    /// Capture duration, whole seconds
    pub runtime: i64,
    pub host: String,
    pub hostname: String,
    #[serde(rename = "macaddress")]
    pub mac_address: String,
    /// Capture end, epoch seconds as text
    #[serde(rename = "endtime")]
    pub end_time: String,
    /// Capture duration, fractional seconds as text
    #[serde(rename = "te")]
    pub elapsed: String,
    #[serde(rename = "cpu")]
    pub cpu_usage: f64,
    /// Free disk space, `"<value> MB"`
    #[serde(rename = "diskusage")]
    pub disk_usage: String,
    #[serde(rename = "memory")]
    pub memory_usage: f64,
    /// `<YYYYMMDDHHMMSS>_<unique_id>`, sorts by capture time
    #[serde(rename = "rowid")]
    pub row_id: String,
    /// `MM/DD/YYYY HH:MM:SS`
    #[serde(rename = "systemtime")]
    pub system_time: String,
    pub ts: i64,
    /// `MM/DD/YYYY HH:MM:SS`
    #[serde(rename = "starttime")]
    pub start_time: String,
    pub pressure: f64,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(rename = "devicetemperature")]
    pub device_temperature: f64,
    pub dewpoint: f64,
    pub lux: f64,
}

/// An ordered group of records submitted to the sink together.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Batch {
    records: Vec<TelemetryRecord>,
}

impl Batch {
    pub fn new(records: Vec<TelemetryRecord>) -> Self {
        Self { records }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: TelemetryRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub fn first(&self) -> Option<&TelemetryRecord> {
        self.records.first()
    }

    pub fn into_records(self) -> Vec<TelemetryRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a TelemetryRecord;
    type IntoIter = std::slice::Iter<'a, TelemetryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
