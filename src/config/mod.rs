//! Configuration module for the serial bridge.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `--config <PATH>` on the command line
//! 2. `ARDUINO_MCP_CONFIG` environment variable (explicit path)
//! 3. `./arduino-mcp.toml` (current directory)
//! 4. The platform config directory, e.g. `~/.config/arduino-serial-mcp/arduino-mcp.toml`
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Runtime settings can be overridden with `ARDUINO_MCP_<SECTION>_<KEY>`:
//! - `ARDUINO_MCP_SERIAL_READ_TIMEOUT_MS=50`
//! - `ARDUINO_MCP_LOGGING_LEVEL=debug`
//! - `ARDUINO_MCP_LOGGING_FORMAT=pretty`
//!
//! Tool defaults, the history capacity and the line terminator are fixed and
//! have no file key or override.
//!
//! # Example
//!
//! ```rust,no_run
//! use arduino_serial_mcp::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! println!("Read timeout: {:?}", loader.config().serial.read_timeout());
//! # Ok::<(), arduino_serial_mcp::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig};
