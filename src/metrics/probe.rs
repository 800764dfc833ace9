//! Host metric probes using sysinfo and direct /sys access.

use crate::error::{Result, TelemetryError};
use std::fs;
use std::path::{Path, PathBuf};
use sysinfo::{Disks, System};

/// Raspberry Pi SoC thermal zone.
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of the four host metrics. Each read fails independently.
pub trait HostProbe {
    /// CPU temperature in Celsius.
    fn cpu_temperature(&mut self) -> Result<f64>;

    /// CPU usage percentage (0.0 to 100.0) since the previous call.
    fn cpu_usage(&mut self) -> Result<f64>;

    /// Used memory percentage (0.0 to 100.0).
    fn memory_usage(&mut self) -> Result<f64>;

    /// Free space on the root filesystem in MB.
    fn free_disk_mb(&mut self) -> Result<f64>;
}

/// Probe reading the local host.
pub struct SysinfoProbe {
    system: System,
    disks: Disks,
    thermal_zone: PathBuf,
    mount_point: PathBuf,
}

impl SysinfoProbe {
    /// Create a probe for the root filesystem and the default thermal zone.
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta; prime it so the first real read is meaningful.
        system.refresh_cpu_usage();
        let disks = Disks::new_with_refreshed_list();

        Self {
            system,
            disks,
            thermal_zone: PathBuf::from(DEFAULT_THERMAL_ZONE),
            mount_point: PathBuf::from("/"),
        }
    }

    /// Read CPU temperature from a different thermal zone file.
    pub fn with_thermal_zone(mut self, path: impl Into<PathBuf>) -> Self {
        self.thermal_zone = path.into();
        self
    }

    /// Report free space for a different mount point.
    pub fn with_mount_point(mut self, path: impl Into<PathBuf>) -> Self {
        self.mount_point = path.into();
        self
    }

    fn read_thermal_zone(path: &Path) -> Result<f64> {
        let raw = fs::read_to_string(path).map_err(|e| {
            TelemetryError::metric_error(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let millicelsius = raw.trim().parse::<f64>().map_err(|e| {
            TelemetryError::metric_error(format!("Bad thermal zone value {:?}: {}", raw.trim(), e))
        })?;
        Ok(millicelsius / 1000.0)
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoProbe {
    fn cpu_temperature(&mut self) -> Result<f64> {
        Self::read_thermal_zone(&self.thermal_zone)
    }

    fn cpu_usage(&mut self) -> Result<f64> {
        self.system.refresh_cpu_usage();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(TelemetryError::metric_error("No CPU information available"));
        }
        let total: f32 = cpus.iter().map(|cpu| cpu.cpu_usage()).sum();
        Ok(f64::from(total / cpus.len() as f32))
    }

    fn memory_usage(&mut self) -> Result<f64> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return Err(TelemetryError::metric_error("Total memory reported as zero"));
        }
        Ok(self.system.used_memory() as f64 / total as f64 * 100.0)
    }

    fn free_disk_mb(&mut self) -> Result<f64> {
        self.disks.refresh();
        self.disks
            .iter()
            .find(|disk| disk.mount_point() == self.mount_point.as_path())
            .map(|disk| disk.available_space() as f64 / BYTES_PER_MB)
            .ok_or_else(|| {
                TelemetryError::metric_error(format!(
                    "No disk mounted at {}",
                    self.mount_point.display()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thermal_zone_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let zone = dir.path().join("temp");
        fs::write(&zone, "48312\n").unwrap();

        let mut probe = SysinfoProbe::new().with_thermal_zone(&zone);
        let celsius = probe.cpu_temperature().unwrap();
        assert!((celsius - 48.312).abs() < 1e-9);
    }

    #[test]
    fn test_missing_thermal_zone_is_metric_error() {
        let mut probe = SysinfoProbe::new().with_thermal_zone("/nonexistent/thermal/temp");
        assert!(matches!(probe.cpu_temperature(), Err(TelemetryError::Metric(_))));
    }

    #[test]
    fn test_unknown_mount_point_is_metric_error() {
        let mut probe = SysinfoProbe::new().with_mount_point("/definitely/not/mounted");
        assert!(matches!(probe.free_disk_mb(), Err(TelemetryError::Metric(_))));
    }

    #[test]
    fn test_memory_usage_is_percentage() {
        let mut probe = SysinfoProbe::new();
        let usage = probe.memory_usage().unwrap();
        assert!((0.0..=100.0).contains(&usage));
    }
}
