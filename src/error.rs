use crate::port::PortError;
use thiserror::Error;

/// A specialized `Result` type for registry, directory and tool operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Unified bridge error type.
///
/// Every variant reachable from a tool call is turned into an `isError`
/// response by the dispatcher; `StreamFault` only ever reaches the log.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The host port listing failed.
    #[error("Failed to list serial ports: {0}")]
    Enumeration(#[source] PortError),

    /// A device could not be opened.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: PortError,
    },

    /// The operation targeted a path with no live connection.
    #[error("Not connected to {0}. Connect first.")]
    NotConnected(String),

    /// A request argument was missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The local transmit buffer refused the data.
    #[error("Failed to write to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: PortError,
    },

    /// Asynchronous I/O failure on an open stream.
    #[error("Stream fault on {path}: {source}")]
    StreamFault {
        path: String,
        #[source]
        source: PortError,
    },

    #[error("Failed to encode result: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn missing_argument(name: &str) -> Self {
        Self::InvalidArgument(format!("missing required field '{name}'"))
    }

    pub fn invalid_argument(name: &str, reason: &str) -> Self {
        Self::InvalidArgument(format!("'{name}' {reason}"))
    }

    /// Stable name of the variant, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Enumeration(_) => "EnumerationError",
            Self::Open { .. } => "OpenError",
            Self::NotConnected(_) => "NotConnectedError",
            Self::InvalidArgument(_) => "InvalidArgumentError",
            Self::UnknownTool(_) => "UnknownTool",
            Self::Write { .. } => "WriteError",
            Self::StreamFault { .. } => "StreamFault",
            Self::Serialization(_) => "SerializationError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_connected_message() {
        let err = BridgeError::NotConnected("DEV2".into());
        assert_eq!(err.to_string(), "Not connected to DEV2. Connect first.");
        assert_eq!(err.kind(), "NotConnectedError");
    }

    #[test]
    fn missing_argument_names_the_field() {
        let err = BridgeError::missing_argument("port");
        assert_eq!(
            err.to_string(),
            "Invalid argument: missing required field 'port'"
        );
    }

    #[test]
    fn open_error_includes_source() {
        let err = BridgeError::Open {
            path: "COM7".into(),
            source: PortError::not_found("COM7"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to open COM7: Serial port not found: COM7"
        );
    }
}
