//! Mock serial devices for testing.
//!
//! A [`MockDevice`] is the test-side control handle for a simulated device:
//! it injects received bytes, inspects what was written, and simulates
//! hang-ups and unplugs. [`MockSerialPort`] is the adapter side handed to the
//! registry, and [`MockPortOpener`] maps paths to devices.
//!
//! Like an OS serial driver, a device can only be opened once at a time; a
//! second open while any handle is alive fails with [`PortError::Busy`].

use super::error::PortError;
use super::traits::{PortConfiguration, PortOpener, SerialPortAdapter};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct DeviceState {
    /// Bytes waiting to be read.
    read_queue: VecDeque<u8>,
    /// Every write, in order.
    write_log: Vec<Vec<u8>>,
    /// Adapter handles currently alive.
    open_handles: usize,
    /// Total successful opens.
    open_count: usize,
    /// Baud rate of the most recent open.
    last_baud_rate: Option<u32>,
    /// Reads return EOF once the queue drains.
    hung_up: bool,
    /// Reads fail and opens report the device as missing.
    unplugged: bool,
    /// Writes fail with a broken pipe.
    fail_writes: bool,
    /// Handles refuse to be cloned.
    fail_clone: bool,
}

#[derive(Debug, Default)]
struct DeviceShared {
    state: Mutex<DeviceState>,
    readable: Condvar,
}

/// Test-side handle to a simulated serial device.
#[derive(Debug, Clone)]
pub struct MockDevice {
    name: String,
    shared: Arc<DeviceShared>,
}

impl MockDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(DeviceShared::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make `data` available to readers, as if the device had sent it.
    pub fn emit(&self, data: &[u8]) {
        let mut state = self.shared.state.lock();
        state.read_queue.extend(data);
        self.shared.readable.notify_all();
    }

    /// Close the stream from the device side; readers see EOF.
    pub fn hang_up(&self) {
        self.shared.state.lock().hung_up = true;
        self.shared.readable.notify_all();
    }

    /// Simulate the device disappearing; readers see an I/O error.
    pub fn unplug(&self) {
        self.shared.state.lock().unplugged = true;
        self.shared.readable.notify_all();
    }

    /// Bring an unplugged or hung-up device back.
    pub fn replug(&self) {
        let mut state = self.shared.state.lock();
        state.unplugged = false;
        state.hung_up = false;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.shared.state.lock().fail_writes = fail;
    }

    /// Make `try_clone_adapter` fail, as a driver without handle
    /// duplication would.
    pub fn set_fail_clone(&self, fail: bool) {
        self.shared.state.lock().fail_clone = fail;
    }

    /// All writes received so far.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().write_log.clone()
    }

    /// Writes concatenated and decoded as text.
    pub fn written_text(&self) -> String {
        let state = self.shared.state.lock();
        state
            .write_log
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect()
    }

    /// Number of adapter handles currently holding the device open.
    pub fn open_handles(&self) -> usize {
        self.shared.state.lock().open_handles
    }

    /// Number of successful opens over the device's lifetime.
    pub fn open_count(&self) -> usize {
        self.shared.state.lock().open_count
    }

    pub fn last_baud_rate(&self) -> Option<u32> {
        self.shared.state.lock().last_baud_rate
    }

    fn open(&self, config: &PortConfiguration) -> Result<MockSerialPort, PortError> {
        {
            let mut state = self.shared.state.lock();
            if state.unplugged {
                return Err(PortError::not_found(&self.name));
            }
            if state.open_handles > 0 {
                return Err(PortError::busy(&self.name));
            }
            state.open_count += 1;
            state.last_baud_rate = Some(config.baud_rate);
        }
        Ok(MockSerialPort::attach(self.clone(), config.timeout))
    }
}

/// Adapter-side handle to a [`MockDevice`].
pub struct MockSerialPort {
    device: MockDevice,
    timeout: Duration,
}

impl MockSerialPort {
    fn attach(device: MockDevice, timeout: Duration) -> Self {
        device.shared.state.lock().open_handles += 1;
        Self { device, timeout }
    }
}

impl Drop for MockSerialPort {
    fn drop(&mut self) {
        let mut state = self.device.shared.state.lock();
        state.open_handles = state.open_handles.saturating_sub(1);
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.device.shared.state.lock();
        if state.unplugged || state.fail_writes {
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device not writable",
            )));
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let shared = &self.device.shared;
        let mut state = shared.state.lock();

        if state.read_queue.is_empty() && !state.hung_up && !state.unplugged {
            shared.readable.wait_for(&mut state, self.timeout);
        }

        if state.unplugged {
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "device unplugged",
            )));
        }

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(b) => {
                    *byte = b;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read > 0 || state.hung_up {
            Ok(bytes_read)
        } else {
            Err(PortError::timeout(self.timeout))
        }
    }

    fn name(&self) -> &str {
        &self.device.name
    }

    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        if self.device.shared.state.lock().fail_clone {
            return Err(PortError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "handle cannot be cloned",
            )));
        }
        Ok(Box::new(MockSerialPort::attach(
            self.device.clone(),
            self.timeout,
        )))
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.device.name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A [`PortOpener`] backed by registered [`MockDevice`]s.
///
/// Opening a path that was never added fails with [`PortError::NotFound`].
#[derive(Debug, Default)]
pub struct MockPortOpener {
    devices: Mutex<HashMap<String, MockDevice>>,
}

impl MockPortOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device at `path` and return its control handle.
    pub fn add_device(&self, path: &str) -> MockDevice {
        self.devices
            .lock()
            .entry(path.to_string())
            .or_insert_with(|| MockDevice::new(path))
            .clone()
    }

    pub fn device(&self, path: &str) -> Option<MockDevice> {
        self.devices.lock().get(path).cloned()
    }
}

impl PortOpener for MockPortOpener {
    fn open(
        &self,
        path: &str,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let device = self
            .device(path)
            .ok_or_else(|| PortError::not_found(path))?;
        Ok(Box::new(device.open(config)?))
    }
}
