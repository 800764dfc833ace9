//! Host health metrics and static host identity.
//!
//! This module provides the TTL-gated cache of CPU temperature, CPU usage,
//! memory usage and free disk space attached to every telemetry record, along
//! with the host name and network addresses resolved once at startup.

pub mod cache;
pub mod identity;
pub mod probe;

// Re-export commonly used items
pub use cache::{SystemMetricsCache, SystemMetricsSnapshot, DEFAULT_METRICS_TTL};
pub use identity::HostIdentity;
pub use probe::{HostProbe, SysinfoProbe};
