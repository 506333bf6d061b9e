//! Serial port enumeration.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use serialport::{SerialPortInfo, SerialPortType};

/// A serial device visible on the host.
///
/// Everything except `path` depends on what the driver reports; absent fields
/// are left out of the JSON rendering entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
}

impl PortInfo {
    /// A port with no metadata.
    pub fn bare(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            manufacturer: None,
            serial_number: None,
            product_id: None,
            vendor_id: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                path: info.port_name,
                manufacturer: usb.manufacturer,
                serial_number: usb.serial_number,
                product_id: Some(format!("{:04x}", usb.pid)),
                vendor_id: Some(format!("{:04x}", usb.vid)),
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Source of the host's serial port listing.
#[cfg_attr(test, mockall::automock)]
pub trait PortDirectory: Send + Sync {
    /// List visible ports. An empty list is not an error.
    fn list(&self) -> Result<Vec<PortInfo>, PortError>;
}

/// Queries the operating system through `serialport::available_ports`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortDirectory;

impl PortDirectory for SystemPortDirectory {
    fn list(&self) -> Result<Vec<PortInfo>, PortError> {
        let ports = serialport::available_ports()?;
        Ok(ports.into_iter().map(PortInfo::from).collect())
    }
}

/// A fixed listing, useful when no real hardware should be touched.
#[derive(Debug, Clone, Default)]
pub struct StaticPortDirectory {
    ports: Vec<PortInfo>,
}

impl StaticPortDirectory {
    pub fn new(ports: Vec<PortInfo>) -> Self {
        Self { ports }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl PortDirectory for StaticPortDirectory {
    fn list(&self) -> Result<Vec<PortInfo>, PortError> {
        Ok(self.ports.clone())
    }
}
