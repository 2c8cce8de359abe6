use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool advertised by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Dotted `server.tool` name
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the tool arguments
    #[serde(default)]
    pub input_schema: Value,
}

impl ToolInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Value::Null,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Argument names declared in the schema's `properties`, if any.
    pub fn schema_properties(&self) -> Option<Vec<&str>> {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().map(String::as_str).collect())
    }
}

/// Outcome reported by a tool call that reached the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ToolCallOutcome {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Split a dotted tool name into `(server, tool)`.
pub fn split_tool_name(name: &str) -> Option<(&str, &str)> {
    name.split_once('.')
        .filter(|(server, tool)| !server.is_empty() && !tool.is_empty())
}

/// Error types specific to MCP operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum McpError {
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timeout error")]
    Timeout,
}

impl McpError {
    /// Connection problems and timeouts may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Timeout)
    }
}

/// Port trait for the MCP tool aggregator
///
/// Implementations expose the tools of every configured server under
/// dotted `server.tool` names.
#[async_trait]
pub trait McpClient: Send + Sync {
    /// List tools across all enabled servers
    ///
    /// # Errors
    /// - `McpError::ConnectionError` - no server could be reached
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, McpError>;

    /// Invoke a tool by dotted name
    ///
    /// # Errors
    /// - `McpError::ServerNotFound` - server prefix not configured (non-retryable)
    /// - `McpError::ToolNotFound` - tool doesn't exist on server (non-retryable)
    /// - `McpError::InvalidArguments` - invalid tool arguments (non-retryable)
    /// - `McpError::ConnectionError` - connection to server failed (retryable)
    /// - `McpError::Timeout` - tool execution timed out (retryable)
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallOutcome, McpError>;

    /// Health check for one server
    async fn health_check(&self, server: &str) -> Result<(), McpError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_tool_name() {
        assert_eq!(split_tool_name("instrMCP.cryostat"), Some(("instrMCP", "cryostat")));
        assert_eq!(split_tool_name("arxiv.search.v2"), Some(("arxiv", "search.v2")));
        assert_eq!(split_tool_name("cryostat"), None);
        assert_eq!(split_tool_name(".cryostat"), None);
    }

    #[test]
    fn test_schema_properties() {
        let tool = ToolInfo::new("instrMCP.sweep", "voltage sweep").with_schema(json!({
            "type": "object",
            "properties": {"sweep_type": {"type": "string"}, "voltage_range": {"type": "string"}}
        }));
        let mut props = tool.schema_properties().unwrap();
        props.sort_unstable();
        assert_eq!(props, vec!["sweep_type", "voltage_range"]);
        assert!(ToolInfo::new("a.b", "").schema_properties().is_none());
    }

    #[test]
    fn test_transient_errors() {
        assert!(McpError::Timeout.is_transient());
        assert!(McpError::ConnectionError("refused".to_string()).is_transient());
        assert!(!McpError::ToolNotFound("x".to_string()).is_transient());
    }
}
