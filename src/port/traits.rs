//! Core traits for serial port abstraction.
//!
//! `SerialPortAdapter` lets real serial ports and mock devices be used
//! interchangeably; `PortOpener` is the seam the connection registry opens
//! devices through.

use super::error::PortError;
use std::time::Duration;

/// Default baud rate for new connections.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout. Reader threads poll at this interval, so it also
/// bounds how long releasing a connection can take.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Parameters used when opening a serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Read timeout.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl PortConfiguration {
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self { baud_rate, timeout }
    }
}

/// Trait for serial port I/O operations.
///
/// Implementations are blocking: `read_bytes` waits at most the configured
/// timeout and reports it as a transient error (see
/// [`PortError::is_transient`]).
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes accepted by the transmit buffer.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// `Ok(0)` means the stream has been closed.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Open a second handle onto the same device.
    ///
    /// The registry reads through the clone on a dedicated thread while the
    /// original stays with the connection for writes.
    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}

/// Opens serial devices by path.
pub trait PortOpener: Send + Sync {
    fn open(
        &self,
        path: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}
