//! Synchronous serial port implementation.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own
//! `SerialPortAdapter` trait so the registry can be driven by mocks in tests.

use super::error::PortError;
use super::traits::{PortConfiguration, PortOpener, SerialPortAdapter};
use std::io::{Read, Write};

/// Synchronous serial port implementation wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
}

impl SyncSerialPort {
    /// Open a serial port with the given configuration.
    ///
    /// # Example
    /// ```no_run
    /// use arduino_serial_mcp::port::{PortConfiguration, SyncSerialPort};
    ///
    /// let port = SyncSerialPort::open("/dev/ttyACM0", &PortConfiguration::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        let port = serialport::new(port_name, config.baud_rate)
            .timeout(config.timeout)
            .open()
            .map_err(|e| map_open_error(port_name, e))?;

        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }
}

fn map_open_error(port_name: &str, e: serialport::Error) -> PortError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
        serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => PortError::not_found(port_name),
        _ => PortError::Serial(e),
    }
}

impl SerialPortAdapter for SyncSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write_all(data)?;
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let port = self.port.try_clone()?;
        Ok(Box::new(Self {
            port,
            name: self.name.clone(),
        }))
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate())
            .finish()
    }
}

/// Opens real devices through the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(
        &self,
        path: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(SyncSerialPort::open(path, config)?))
    }
}
