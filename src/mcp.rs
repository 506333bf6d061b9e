//! MCP server surface.
//!
//! Protocol framing, the initialize handshake and version negotiation are
//! handled by `rmcp`. This module only advertises the tool catalog and hands
//! tool calls to the [`ToolDispatcher`], on the blocking pool since registry
//! operations may wait on a reader thread to stop.
//!
//! `rmcp` runs each request on its own task. Tool calls still reach the
//! dispatcher one at a time, in the order they took the call gate.

use crate::tools::{self, ToolDispatcher};
use rmcp::model::{
    self, CallToolRequestParam, Content, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler, ServiceExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const SERVER_NAME: &str = "arduino-serial-mcp";

const INSTRUCTIONS: &str = "Bridge to Arduino boards and other line-oriented serial devices. \
Call list_serial_ports to find a board, connect_arduino to open it, then read_serial_data \
and send_serial_data. disconnect_arduino releases the port and discards its recorded lines.";

/// MCP handler exposing the serial tools.
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: ToolDispatcher,
    call_gate: Arc<Mutex<()>>,
}

impl McpServer {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self {
            dispatcher,
            call_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Serve one MCP session on stdin/stdout until the client goes away.
    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        self.serve_io(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve one MCP session over an arbitrary byte stream pair.
    pub async fn serve_io<R, W>(self, reader: R, writer: W) -> Result<(), rmcp::RmcpError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let service = self.serve((reader, writer)).await?;
        info!("MCP session initialized");
        service.waiting().await?;
        info!("MCP session closed");
        Ok(())
    }

    fn tools(&self) -> Vec<Tool> {
        self.dispatcher
            .catalog()
            .into_iter()
            .map(|tool| {
                let schema = match tool.input_schema {
                    Value::Object(map) => map,
                    _ => JsonObject::new(),
                };
                Tool::new(tool.name, tool.description, Arc::new(schema))
            })
            .collect()
    }
}

/// Every dispatcher outcome becomes a tool result; failures carry `isError`.
fn to_protocol_result(result: tools::CallToolResult) -> model::CallToolResult {
    let is_error = result.is_error();
    let content = result
        .content
        .into_iter()
        .map(|block| Content::text(block.text))
        .collect();
    if is_error {
        model::CallToolResult::error(content)
    } else {
        model::CallToolResult::success(content)
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Implementation::from_build_env()
            },
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<model::CallToolResult, ErrorData> {
        let dispatcher = self.dispatcher.clone();
        let name = request.name.to_string();
        let arguments = request.arguments.map(Value::Object).unwrap_or(Value::Null);
        debug!(tool = %name, "dispatching tool call");

        let _turn = self.call_gate.lock().await;
        let result = tokio::task::spawn_blocking(move || dispatcher.call(&name, &arguments))
            .await
            .map_err(|e| ErrorData::internal_error(format!("tool task failed: {e}"), None))?;
        Ok(to_protocol_result(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{MockPortOpener, StaticPortDirectory};
    use crate::registry::{ConnectionRegistry, RegistryConfig};
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{
        AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
    };

    struct Client {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Client {
        fn start(opener: Arc<MockPortOpener>) -> Self {
            let registry = ConnectionRegistry::new(
                opener,
                RegistryConfig {
                    read_timeout: Duration::from_millis(10),
                },
            );
            let dispatcher =
                ToolDispatcher::new(Arc::new(registry), Arc::new(StaticPortDirectory::empty()));

            let (client, server) = tokio::io::duplex(64 * 1024);
            let (server_read, server_write) = tokio::io::split(server);
            tokio::spawn(McpServer::new(dispatcher).serve_io(server_read, server_write));

            let (read, writer) = tokio::io::split(client);
            Self {
                lines: BufReader::new(read).lines(),
                writer,
            }
        }

        async fn send(&mut self, message: Value) {
            let mut line = message.to_string();
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }

        async fn next(&mut self) -> Option<Value> {
            tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
                .await
                .expect("no reply within 5s")
                .unwrap()
                .map(|line| serde_json::from_str(&line).unwrap())
        }

        async fn request(&mut self, message: Value) -> Value {
            self.send(message).await;
            self.next().await.expect("server closed the stream")
        }

        async fn handshake(&mut self, version: &str) -> Value {
            let reply = self
                .request(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": "initialize",
                    "params": {
                        "protocolVersion": version,
                        "capabilities": {},
                        "clientInfo": { "name": "test", "version": "0" }
                    }
                }))
                .await;
            self.send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
                .await;
            reply
        }

        async fn call(&mut self, id: u64, tool: &str, arguments: Value) -> Value {
            self.request(json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "tools/call",
                "params": { "name": tool, "arguments": arguments }
            }))
            .await
        }
    }

    #[tokio::test]
    async fn initialize_reports_server_and_tools_capability() {
        let mut client = Client::start(Arc::new(MockPortOpener::new()));
        let reply = client.handshake("2025-06-18").await;

        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(
            reply["result"]["serverInfo"]["version"],
            env!("CARGO_PKG_VERSION")
        );
        assert!(reply["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn initialize_answers_with_older_client_version() {
        let mut client = Client::start(Arc::new(MockPortOpener::new()));
        let reply = client.handshake("2024-11-05").await;
        assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");
    }

    #[tokio::test]
    async fn tools_list_returns_catalog() {
        let mut client = Client::start(Arc::new(MockPortOpener::new()));
        client.handshake("2025-06-18").await;

        let reply = client
            .request(json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }))
            .await;
        let tools = reply["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 5);
        assert_eq!(tools[1]["name"], "connect_arduino");
        assert_eq!(
            tools[1]["inputSchema"]["properties"]["baudRate"]["default"],
            9600
        );
        assert_eq!(tools[3]["inputSchema"]["required"], json!(["port", "data"]));
    }

    #[tokio::test]
    async fn tool_calls_reach_the_dispatcher() {
        let opener = Arc::new(MockPortOpener::new());
        let device = opener.add_device("DEV1");
        let mut client = Client::start(Arc::clone(&opener));
        client.handshake("2025-06-18").await;

        let reply = client.call(2, "connect_arduino", json!({ "port": "DEV1" })).await;
        assert_eq!(reply["result"]["isError"], false);
        assert_eq!(
            reply["result"]["content"][0]["text"],
            "Connected to DEV1 at 9600 baud"
        );

        client
            .call(3, "send_serial_data", json!({ "port": "DEV1", "data": "LED ON" }))
            .await;
        assert_eq!(device.written_text(), "LED ON\n");
    }

    #[tokio::test]
    async fn tool_failures_are_results_not_protocol_errors() {
        let mut client = Client::start(Arc::new(MockPortOpener::new()));
        client.handshake("2025-06-18").await;

        let reply = client
            .call(2, "send_serial_data", json!({ "port": "DEV2", "data": "x" }))
            .await;
        assert!(reply.get("error").is_none());
        assert_eq!(reply["result"]["isError"], true);
        assert!(reply["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Not connected"));

        let reply = client.call(3, "connect_arduino", json!({})).await;
        assert_eq!(reply["result"]["isError"], true);
        assert!(reply["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("'port'"));
    }

    #[tokio::test]
    async fn non_2_0_messages_are_not_answered_as_success() {
        let mut client = Client::start(Arc::new(MockPortOpener::new()));
        client.handshake("2025-06-18").await;

        client
            .send(json!({ "jsonrpc": "1.0", "id": 7, "method": "ping" }))
            .await;
        client
            .send(json!({ "jsonrpc": "2.0", "id": 8, "method": "ping" }))
            .await;

        if let Some(reply) = client.next().await {
            let answered_7 = reply["id"] == 7 && reply.get("result").is_some();
            assert!(!answered_7, "1.0 request was served: {reply}");
        }
    }
}
