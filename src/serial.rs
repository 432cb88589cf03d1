//! Serial port discovery
//!
//! Lists the devices a host can pass to `RadioBridge::open`.

use crate::error::{BridgeError, Result};
use serialport::{SerialPortInfo, SerialPortType};
use std::fmt;

/// One serial device seen by the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub kind: String,
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<20} {}", self.name, self.kind)
    }
}

impl From<&SerialPortInfo> for PortInfo {
    fn from(info: &SerialPortInfo) -> Self {
        Self {
            name: info.port_name.clone(),
            kind: describe(&info.port_type),
        }
    }
}

/// Enumerate serial ports, sorted by name
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(|e| BridgeError::SerialEnumerate {
        reason: e.to_string(),
    })?;
    let mut ports: Vec<PortInfo> = ports.iter().map(PortInfo::from).collect();
    ports.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ports)
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial");
            format!("{} [{:04x}:{:04x}]", product, usb.vid, usb.pid)
        }
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}
