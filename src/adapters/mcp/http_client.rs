//! MCP aggregator over JSON-RPC HTTP endpoints.
//!
//! Each configured server is an MCP endpoint accepting `tools/list` and
//! `tools/call`. Tool names are exposed as `{server id}.{tool}`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::domain::models::{McpConfig, McpServerConfig};
use crate::domain::ports::{split_tool_name, McpClient, McpError, ToolCallOutcome, ToolInfo};

const INVALID_PARAMS: i64 = -32602;
const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListedTool {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "inputSchema")]
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<ListedTool>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolsCallResult {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

pub struct HttpMcpClient {
    servers: Vec<McpServerConfig>,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpMcpClient {
    pub fn new(config: &McpConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            servers: config.servers.iter().filter(|s| s.enabled).cloned().collect(),
            http,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn server_ids(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.id.as_str()).collect()
    }

    fn server(&self, id: &str) -> Result<&McpServerConfig, McpError> {
        self.servers
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| McpError::ServerNotFound(id.to_string()))
    }

    async fn rpc(&self, server: &McpServerConfig, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(server = %server.id, method, id, "MCP request");

        let response = self
            .http
            .post(&server.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    McpError::Timeout
                } else {
                    McpError::ConnectionError(format!("{}: {e}", server.id))
                }
            })?;

        if !response.status().is_success() {
            return Err(McpError::ConnectionError(format!(
                "{} returned {}",
                server.id,
                response.status()
            )));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| McpError::ExecutionFailed(format!("invalid JSON-RPC response: {e}")))?;

        if let Some(error) = rpc.error {
            return Err(match error.code {
                INVALID_PARAMS => McpError::InvalidArguments(error.message),
                METHOD_NOT_FOUND => McpError::ToolNotFound(error.message),
                _ if error.message.starts_with("Unknown tool") => {
                    McpError::ToolNotFound(error.message)
                }
                _ => McpError::ExecutionFailed(error.message),
            });
        }
        Ok(rpc.result.unwrap_or(Value::Null))
    }

    async fn list_server_tools(&self, server: &McpServerConfig) -> Result<Vec<ToolInfo>, McpError> {
        let result = self.rpc(server, "tools/list", json!({})).await?;
        let listed: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpError::ExecutionFailed(format!("invalid tools/list result: {e}")))?;
        Ok(listed
            .tools
            .into_iter()
            .map(|t| {
                ToolInfo::new(format!("{}.{}", server.id, t.name), t.description)
                    .with_schema(t.input_schema)
            })
            .collect())
    }
}

/// Text content that parses as JSON is returned as-is, anything else is
/// wrapped as `{"output": text}`.
fn content_value(blocks: &[ContentBlock]) -> Value {
    let text: Vec<&str> = blocks.iter().filter_map(|b| b.text.as_deref()).collect();
    let joined = text.join("\n");
    match serde_json::from_str::<Value>(&joined) {
        Ok(value @ Value::Object(_)) => value,
        _ => {
            let mut map = Map::new();
            map.insert("output".to_string(), Value::from(joined));
            Value::Object(map)
        }
    }
}

#[async_trait]
impl McpClient for HttpMcpClient {
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, McpError> {
        let mut tools = Vec::new();
        let mut reached = 0;
        let mut last_error = None;

        for server in &self.servers {
            match self.list_server_tools(server).await {
                Ok(mut listed) => {
                    reached += 1;
                    tools.append(&mut listed);
                }
                Err(e) => {
                    warn!(server = %server.id, error = %e, "MCP server unavailable");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if reached == 0 => Err(McpError::ConnectionError(format!(
                "no MCP server reachable: {e}"
            ))),
            _ => Ok(tools),
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallOutcome, McpError> {
        let (server_id, tool) =
            split_tool_name(name).ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;
        let server = self.server(server_id)?;

        let result = self
            .rpc(server, "tools/call", json!({"name": tool, "arguments": arguments}))
            .await?;
        let call: ToolsCallResult = serde_json::from_value(result)
            .map_err(|e| McpError::ExecutionFailed(format!("invalid tools/call result: {e}")))?;

        let value = content_value(&call.content);
        if call.is_error {
            let error = value
                .get("output")
                .and_then(Value::as_str)
                .map_or_else(|| value.to_string(), str::to_string);
            Ok(ToolCallOutcome::failed(error))
        } else {
            Ok(ToolCallOutcome::ok(value))
        }
    }

    async fn health_check(&self, server: &str) -> Result<(), McpError> {
        let server = self.server(server)?;
        self.rpc(server, "tools/list", json!({})).await.map(|_| ())
    }
}
