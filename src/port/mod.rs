//! Port abstraction layer for serial communication.
//!
//! Provides the adapter and opener traits, the `serialport`-backed
//! implementations, port enumeration, and mock devices for tests.

pub mod directory;
pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use directory::{PortDirectory, PortInfo, StaticPortDirectory, SystemPortDirectory};
pub use error::PortError;
pub use mock::{MockDevice, MockPortOpener, MockSerialPort};
pub use sync_port::{SyncSerialPort, SystemPortOpener};
pub use traits::*;
