//! Arduino Serial MCP Library
//!
//! Exposes serial-attached microcontrollers to MCP clients as five tools:
//! list ports, connect, read recent lines, send, disconnect. Incoming bytes
//! are split into lines and kept in a bounded per-port history.
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `error`: Unified error handling
//! - `framer`: Byte stream to line splitting
//! - `history`: Bounded, timestamped line history
//! - `logging`: Tracing subscriber setup
//! - `mcp`: MCP handler served over stdio
//! - `port`: Port abstraction layer for serial communication
//! - `registry`: Live connections keyed by device path
//! - `tools`: Tool catalog and dispatcher

pub mod config;
pub mod error;
pub mod framer;
pub mod history;
pub mod logging;
pub mod mcp;
pub mod port;
pub mod registry;
pub mod tools;

// Re-export commonly used types for convenience
pub use error::{BridgeError, BridgeResult};
pub use framer::LineFramer;
pub use history::{History, Record, SharedHistory};
pub use mcp::McpServer;
pub use port::{
    MockDevice, MockPortOpener, PortConfiguration, PortDirectory, PortError, PortInfo,
    PortOpener, SerialPortAdapter, StaticPortDirectory, SystemPortDirectory, SystemPortOpener,
};
pub use registry::{ConnectionInfo, ConnectionRegistry, RegistryConfig};
pub use tools::{CallToolResult, ToolDispatcher};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
