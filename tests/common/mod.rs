//! Shared test utilities for the Arduino serial MCP tests.
//!
//! Provides a harness that wires a [`ConnectionRegistry`] and a
//! [`ToolDispatcher`] to simulated devices, plus polling helpers for
//! waiting on the reader threads.

#![allow(dead_code)]

use arduino_serial_mcp::port::{MockDevice, MockPortOpener, PortInfo, StaticPortDirectory};
use arduino_serial_mcp::registry::{ConnectionRegistry, RegistryConfig};
use arduino_serial_mcp::tools::{CallToolResult, ToolDispatcher};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Read timeout used by test connections; keeps releases fast.
pub const TEST_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// How long `wait_for` polls before giving up.
pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub fn test_registry_config() -> RegistryConfig {
    RegistryConfig {
        read_timeout: TEST_READ_TIMEOUT,
    }
}

/// Test harness with a mock opener, a fixed port listing and a dispatcher.
pub struct TestHarness {
    pub opener: Arc<MockPortOpener>,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: ToolDispatcher,
}

impl TestHarness {
    /// A harness whose port directory lists nothing.
    pub fn new() -> Self {
        Self::with_ports(Vec::new())
    }

    /// A harness whose port directory lists `ports`.
    pub fn with_ports(ports: Vec<PortInfo>) -> Self {
        Self::with_config(ports, test_registry_config())
    }

    pub fn with_config(ports: Vec<PortInfo>, config: RegistryConfig) -> Self {
        let opener = Arc::new(MockPortOpener::new());
        let registry = Arc::new(ConnectionRegistry::new(opener.clone(), config));
        let dispatcher = ToolDispatcher::new(
            Arc::clone(&registry),
            Arc::new(StaticPortDirectory::new(ports)),
        );
        Self {
            opener,
            registry,
            dispatcher,
        }
    }

    /// Register a simulated device at `path`.
    pub fn device(&self, path: &str) -> MockDevice {
        self.opener.add_device(path)
    }

    pub fn call(&self, tool: &str, arguments: Value) -> CallToolResult {
        self.dispatcher.call(tool, &arguments)
    }

    /// Number of records currently held for `path`, or `None` if no buffer.
    pub fn history_len(&self, path: &str) -> Option<usize> {
        self.registry
            .read_history(path, usize::MAX)
            .map(|records| records.len())
    }

    /// Wait until `path` holds exactly `count` records.
    pub fn wait_for_records(&self, path: &str, count: usize) {
        wait_for(&format!("{count} records on {path}"), || {
            self.history_len(path) == Some(count)
        });
    }

    /// History lines for `path`, oldest first.
    pub fn lines(&self, path: &str) -> Vec<String> {
        self.registry
            .read_history(path, usize::MAX)
            .unwrap_or_default()
            .into_iter()
            .map(|record| record.data)
            .collect()
    }
}

/// Poll `condition` until it holds, panicking after [`WAIT_LIMIT`].
pub fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !condition() {
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Parse the text of a successful result as JSON.
pub fn json_text(result: &CallToolResult) -> Value {
    assert!(!result.is_error(), "unexpected error: {}", result.first_text());
    serde_json::from_str(result.first_text())
        .unwrap_or_else(|e| panic!("result is not JSON ({e}): {}", result.first_text()))
}
