//! Static host identity, resolved once at startup.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use sysinfo::{Networks, System};
use tracing::debug;

/// Interfaces tried first when picking the hardware address, in order.
const PREFERRED_INTERFACES: [&str; 2] = ["wlan0", "eth0"];

const FALLBACK_MAC: &str = "00:00:00:00:00:00";

/// Name and addresses stamped on every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIdentity {
    pub hostname: String,
    pub mac_address: String,
    pub ip_address: String,
}

impl HostIdentity {
    pub fn new(
        hostname: impl Into<String>,
        mac_address: impl Into<String>,
        ip_address: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            mac_address: mac_address.into(),
            ip_address: ip_address.into(),
        }
    }

    /// Look up the identity of the local host. Never fails; each field falls
    /// back to a placeholder.
    pub fn resolve() -> Self {
        let hostname = System::host_name().unwrap_or_else(|| "unknown".to_string());
        let mac_address = primary_mac_address().unwrap_or_else(|| FALLBACK_MAC.to_string());
        let ip_address = outbound_ip_address()
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .to_string();

        debug!(%hostname, %mac_address, %ip_address, "Resolved host identity");
        Self {
            hostname,
            mac_address,
            ip_address,
        }
    }
}

fn primary_mac_address() -> Option<String> {
    let networks = Networks::new_with_refreshed_list();

    for preferred in PREFERRED_INTERFACES {
        if let Some((_, data)) = networks.iter().find(|(name, _)| name.as_str() == preferred) {
            if !data.mac_address().is_unspecified() {
                return Some(data.mac_address().to_string());
            }
        }
    }

    networks
        .iter()
        .map(|(_, data)| data.mac_address())
        .find(|mac| !mac.is_unspecified())
        .map(|mac| mac.to_string())
}

/// Address of the interface the kernel would route external traffic through.
///
/// Connecting a UDP socket sends no packets; it only selects a route.
fn outbound_ip_address() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(("8.8.8.8", 80)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
