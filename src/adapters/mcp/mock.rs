//! In-process MCP aggregator for tests and offline runs.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::domain::ports::{split_tool_name, McpClient, McpError, ToolCallOutcome, ToolInfo};

/// Mock aggregator advertising a fixed tool list.
///
/// Advertised tools answer with a configured outcome, a configured error, or
/// a generic success. Every call is recorded.
#[derive(Default)]
pub struct MockMcpClient {
    tools: Vec<ToolInfo>,
    responses: HashMap<String, ToolCallOutcome>,
    errors: HashMap<String, McpError>,
    unhealthy: Vec<String>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockMcpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: ToolInfo) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_response(mut self, name: impl Into<String>, outcome: ToolCallOutcome) -> Self {
        self.responses.insert(name.into(), outcome);
        self
    }

    pub fn with_error(mut self, name: impl Into<String>, error: McpError) -> Self {
        self.errors.insert(name.into(), error);
        self
    }

    /// Mark a server as failing its health check.
    pub fn with_unhealthy_server(mut self, server: impl Into<String>) -> Self {
        self.unhealthy.push(server.into());
        self
    }

    /// Calls received so far, in order.
    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl McpClient for MockMcpClient {
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, McpError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallOutcome, McpError> {
        self.calls.lock().await.push((name.to_string(), arguments));

        if let Some(error) = self.errors.get(name) {
            return Err(error.clone());
        }
        if !self.tools.iter().any(|t| t.name == name) {
            return Err(McpError::ToolNotFound(name.to_string()));
        }
        Ok(self
            .responses
            .get(name)
            .cloned()
            .unwrap_or_else(|| ToolCallOutcome::ok(json!({"status": "completed"}))))
    }

    async fn health_check(&self, server: &str) -> Result<(), McpError> {
        if self.unhealthy.iter().any(|s| s == server) {
            return Err(McpError::ConnectionError(format!("{server} is down")));
        }
        let known = self
            .tools
            .iter()
            .any(|t| split_tool_name(&t.name).is_some_and(|(s, _)| s == server));
        if known {
            Ok(())
        } else {
            Err(McpError::ServerNotFound(server.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_success_and_recording() {
        let mcp = MockMcpClient::new().with_tool(ToolInfo::new("instrMCP.cryostat", ""));
        let outcome = mcp
            .call_tool("instrMCP.cryostat", json!({"target_temperature": "20 mK"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(mcp.calls().await[0].1["target_temperature"], "20 mK");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let mcp = MockMcpClient::new();
        assert!(matches!(
            mcp.call_tool("instrMCP.sweep", json!({})).await,
            Err(McpError::ToolNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mcp = MockMcpClient::new()
            .with_tool(ToolInfo::new("instrMCP.sweep", ""))
            .with_tool(ToolInfo::new("arxiv.search", ""))
            .with_unhealthy_server("arxiv");
        assert!(mcp.health_check("instrMCP").await.is_ok());
        assert!(matches!(
            mcp.health_check("arxiv").await,
            Err(McpError::ConnectionError(_))
        ));
        assert!(matches!(
            mcp.health_check("brief").await,
            Err(McpError::ServerNotFound(_))
        ));
    }
}
