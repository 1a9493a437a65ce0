//! Serial port discovery.
//!
//! Discovery produces an ordered list of candidate device identifiers. The
//! list is advisory: the link manager always starts with the configured port
//! and only falls back to discovered ports when access to it is denied.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::{debug, info};

/// Numbered ports probed on Windows.
pub const NUMBERED_PORTS: RangeInclusive<u8> = 1..=19;

/// Device files checked on Unix-like hosts.
pub const WELL_KNOWN_PATHS: [&str; 4] = [
    "/dev/ttyACM0",
    "/dev/ttyACM1",
    "/dev/ttyUSB0",
    "/dev/ttyUSB1",
];

/// Enumerate candidate ports on this host. Never fails; an empty list simply
/// means no candidates were found.
pub fn discover() -> Vec<String> {
    #[cfg(windows)]
    let ports = probe_numbered(NUMBERED_PORTS, |name| {
        // Opening and immediately dropping the handle proves the port is claimable.
        serialport::new(name, crate::DEFAULT_BAUD_RATE).open().is_ok()
    });

    #[cfg(not(windows))]
    let ports = existing_paths(&WELL_KNOWN_PATHS, |path| std::path::Path::new(path).exists());

    if ports.is_empty() {
        info!("No candidate serial ports found");
    } else {
        info!("Discovered serial ports: {:?}", ports);
    }
    ports
}

/// Probe `COM<n>` for every `n` in `range`, keeping the ones `claimable` accepts.
pub fn probe_numbered(
    range: RangeInclusive<u8>,
    claimable: impl Fn(&str) -> bool,
) -> Vec<String> {
    range
        .map(|n| format!("COM{}", n))
        .filter(|name| {
            let ok = claimable(name);
            debug!("Probe {}: {}", name, if ok { "available" } else { "unavailable" });
            ok
        })
        .collect()
}

/// Keep the candidate paths that `exists` reports as present.
pub fn existing_paths(candidates: &[&str], exists: impl Fn(&str) -> bool) -> Vec<String> {
    candidates
        .iter()
        .filter(|path| exists(path))
        .map(|path| path.to_string())
        .collect()
}

/// A serial port as enumerated by the operating system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortDescription {
    /// Device identifier
    pub name: String,
    /// Bus type (USB, Bluetooth, PCI, Unknown)
    pub kind: String,
    /// USB vendor id, if known
    pub vid: Option<u16>,
    /// USB product id, if known
    pub pid: Option<u16>,
    /// USB product string, if reported
    pub product: Option<String>,
}

/// Describe every serial port the OS reports, regardless of the well-known
/// candidate list. Returns an empty list if enumeration fails.
pub fn list_host_ports() -> Vec<PortDescription> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!("Serial port enumeration failed: {}", e);
            return Vec::new();
        }
    };

    ports
        .into_iter()
        .map(|port| match port.port_type {
            serialport::SerialPortType::UsbPort(info) => PortDescription {
                name: port.port_name,
                kind: "USB".to_string(),
                vid: Some(info.vid),
                pid: Some(info.pid),
                product: info.product,
            },
            other => PortDescription {
                name: port.port_name,
                kind: port_type_name(&other).to_string(),
                vid: None,
                pid: None,
                product: None,
            },
        })
        .collect()
}

fn port_type_name(port_type: &serialport::SerialPortType) -> &'static str {
    match port_type {
        serialport::SerialPortType::UsbPort(_) => "USB",
        serialport::SerialPortType::BluetoothPort => "Bluetooth",
        serialport::SerialPortType::PciPort => "PCI",
        serialport::SerialPortType::Unknown => "Unknown",
    }
}
