//! Tool catalog and dispatcher.
//!
//! Translates named tool calls into registry and directory operations and
//! wraps every outcome, success or failure, in a [`CallToolResult`]. Nothing
//! raised below this layer escapes as a protocol-level error.

use crate::error::{BridgeError, BridgeResult};
use crate::port::{PortDirectory, DEFAULT_BAUD_RATE};
use crate::registry::ConnectionRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const LIST_SERIAL_PORTS: &str = "list_serial_ports";
pub const CONNECT_ARDUINO: &str = "connect_arduino";
pub const READ_SERIAL_DATA: &str = "read_serial_data";
pub const SEND_SERIAL_DATA: &str = "send_serial_data";
pub const DISCONNECT_ARDUINO: &str = "disconnect_arduino";

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescription {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// The uniform tool response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextContent {
                content_type: "text".to_string(),
                text: text.into(),
            }],
            is_error: None,
        }
    }

    pub fn error(err: &BridgeError) -> Self {
        Self {
            is_error: Some(true),
            ..Self::text(format!("Error: {err}"))
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Text of the first content block.
    pub fn first_text(&self) -> &str {
        self.content.first().map_or("", |c| c.text.as_str())
    }
}

/// Records returned by `read_serial_data` when `lines` is omitted.
pub const DEFAULT_READ_LINES: usize = 50;

/// The five tools this bridge exposes.
pub fn tool_catalog() -> Vec<ToolDescription> {
    vec![
        ToolDescription {
            name: LIST_SERIAL_PORTS,
            description: "List all available serial ports (COM ports) where Arduino might be connected",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDescription {
            name: CONNECT_ARDUINO,
            description: "Connect to Arduino on specified COM port with given baud rate",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "port": {
                        "type": "string",
                        "description": "COM port (e.g., COM3, /dev/ttyACM0)"
                    },
                    "baudRate": {
                        "type": "number",
                        "description": format!("Baud rate for serial communication (default: {DEFAULT_BAUD_RATE})"),
                        "default": DEFAULT_BAUD_RATE
                    }
                },
                "required": ["port"]
            }),
        },
        ToolDescription {
            name: READ_SERIAL_DATA,
            description: "Read data from connected Arduino. Returns recent data buffer.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "port": {
                        "type": "string",
                        "description": "COM port to read from"
                    },
                    "lines": {
                        "type": "number",
                        "description": format!("Number of recent lines to return (default: {DEFAULT_READ_LINES})"),
                        "default": DEFAULT_READ_LINES
                    }
                },
                "required": ["port"]
            }),
        },
        ToolDescription {
            name: SEND_SERIAL_DATA,
            description: "Send data/command to Arduino over serial",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "port": {
                        "type": "string",
                        "description": "COM port to send to"
                    },
                    "data": {
                        "type": "string",
                        "description": "Data to send to Arduino"
                    }
                },
                "required": ["port", "data"]
            }),
        },
        ToolDescription {
            name: DISCONNECT_ARDUINO,
            description: "Disconnect from Arduino serial port",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "port": {
                        "type": "string",
                        "description": "COM port to disconnect"
                    }
                },
                "required": ["port"]
            }),
        },
    ]
}

/// Typed access to a tool call's `arguments` object.
struct Arguments<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Arguments<'a> {
    fn parse(value: &'a Value) -> BridgeResult<Self> {
        match value {
            Value::Null => Ok(Self { map: None }),
            Value::Object(map) => Ok(Self { map: Some(map) }),
            _ => Err(BridgeError::InvalidArgument(
                "arguments must be an object".to_string(),
            )),
        }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.map
            .and_then(|map| map.get(name))
            .filter(|value| !value.is_null())
    }

    fn required_str(&self, name: &str) -> BridgeResult<&'a str> {
        let value = self
            .get(name)
            .ok_or_else(|| BridgeError::missing_argument(name))?;
        value
            .as_str()
            .ok_or_else(|| BridgeError::invalid_argument(name, "must be a string"))
    }

    /// A non-negative whole number; integral floats such as `9600.0` are
    /// accepted since JSON clients do not always distinguish them.
    fn optional_u64(&self, name: &str) -> BridgeResult<Option<u64>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        if let Some(n) = value.as_u64() {
            return Ok(Some(n));
        }
        match value.as_f64() {
            Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(Some(f as u64)),
            _ => Err(BridgeError::invalid_argument(
                name,
                "must be a non-negative integer",
            )),
        }
    }
}

/// Routes tool calls to the registry and port directory.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<dyn PortDirectory>,
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, directory: Arc<dyn PortDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> Vec<ToolDescription> {
        tool_catalog()
    }

    /// Run a tool. Failures come back as `isError` results, never as `Err`.
    pub fn call(&self, name: &str, arguments: &Value) -> CallToolResult {
        debug!(tool = name, "tool call");
        match self.route(name, arguments) {
            Ok(result) => result,
            Err(err) => {
                warn!(tool = name, kind = err.kind(), "tool call failed: {err}");
                CallToolResult::error(&err)
            }
        }
    }

    fn route(&self, name: &str, arguments: &Value) -> BridgeResult<CallToolResult> {
        let args = Arguments::parse(arguments)?;
        match name {
            LIST_SERIAL_PORTS => self.list_serial_ports(),
            CONNECT_ARDUINO => self.connect_arduino(&args),
            READ_SERIAL_DATA => self.read_serial_data(&args),
            SEND_SERIAL_DATA => self.send_serial_data(&args),
            DISCONNECT_ARDUINO => self.disconnect_arduino(&args),
            other => Err(BridgeError::UnknownTool(other.to_string())),
        }
    }

    fn list_serial_ports(&self) -> BridgeResult<CallToolResult> {
        let ports = self.directory.list().map_err(BridgeError::Enumeration)?;
        Ok(CallToolResult::text(serde_json::to_string_pretty(&ports)?))
    }

    fn connect_arduino(&self, args: &Arguments<'_>) -> BridgeResult<CallToolResult> {
        let port = args.required_str("port")?;
        let baud_rate = match args.optional_u64("baudRate")? {
            None => DEFAULT_BAUD_RATE,
            Some(0) => {
                return Err(BridgeError::invalid_argument(
                    "baudRate",
                    "must be greater than zero",
                ))
            }
            Some(n) => u32::try_from(n)
                .map_err(|_| BridgeError::invalid_argument("baudRate", "is out of range"))?,
        };

        let info = self.registry.connect(port, baud_rate)?;
        Ok(CallToolResult::text(format!(
            "Connected to {} at {} baud",
            info.path, info.baud_rate
        )))
    }

    fn read_serial_data(&self, args: &Arguments<'_>) -> BridgeResult<CallToolResult> {
        let port = args.required_str("port")?;
        let lines = match args.optional_u64("lines")? {
            None => DEFAULT_READ_LINES,
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };

        match self.registry.read_history(port, lines) {
            None => Ok(CallToolResult::text(format!(
                "No data buffer for {port}. Connect to the port first."
            ))),
            Some(records) => Ok(CallToolResult::text(serde_json::to_string_pretty(
                &records,
            )?)),
        }
    }

    fn send_serial_data(&self, args: &Arguments<'_>) -> BridgeResult<CallToolResult> {
        let port = args.required_str("port")?;
        let data = args.required_str("data")?;
        self.registry.send(port, data)?;
        Ok(CallToolResult::text(format!("Sent to {port}: {data}")))
    }

    fn disconnect_arduino(&self, args: &Arguments<'_>) -> BridgeResult<CallToolResult> {
        let port = args.required_str("port")?;
        self.registry.disconnect(port)?;
        Ok(CallToolResult::text(format!("Disconnected from {port}")))
    }
}
