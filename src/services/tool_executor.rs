//! Runs a node's tools through the MCP aggregator.
//!
//! Tools that no server advertises are simulated instead. Per-tool results
//! are folded into one node result keyed by the agent family.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentState, TaskNode};
use crate::domain::ports::{split_tool_name, McpClient, ToolInfo};

/// Which of a set of tools some server currently advertises.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolAvailability {
    pub available: Vec<String>,
    pub unavailable: Vec<String>,
}

impl ToolAvailability {
    pub fn all_available(&self) -> bool {
        self.unavailable.is_empty()
    }
}

pub struct ToolExecutor {
    mcp: Arc<dyn McpClient>,
    simulated_delay: Duration,
}

impl ToolExecutor {
    pub fn new(mcp: Arc<dyn McpClient>, simulated_delay: Duration) -> Self {
        Self {
            mcp,
            simulated_delay,
        }
    }

    pub fn simulated_delay(&self) -> Duration {
        self.simulated_delay
    }

    /// Tools advertised by the aggregator, keyed by dotted name. An
    /// unreachable aggregator advertises nothing.
    pub async fn catalog(&self) -> HashMap<String, ToolInfo> {
        match self.mcp.list_tools().await {
            Ok(tools) => tools.into_iter().map(|t| (t.name.clone(), t)).collect(),
            Err(e) => {
                warn!(error = %e, "MCP tool listing failed, all tools will be simulated");
                HashMap::new()
            }
        }
    }

    pub async fn check_availability(&self, tools: &[String]) -> ToolAvailability {
        let catalog = self.catalog().await;
        let (available, unavailable): (Vec<String>, Vec<String>) = tools
            .iter()
            .cloned()
            .partition(|tool| catalog.contains_key(tool));
        ToolAvailability {
            available,
            unavailable,
        }
    }

    /// Run every tool of `node` and aggregate. With `simulate_only` no tool is
    /// called, which is how DRY-RUN executes.
    pub async fn execute_node(
        &self,
        node: &TaskNode,
        state: &AgentState,
        simulate_only: bool,
    ) -> DomainResult<Map<String, Value>> {
        info!(node_id = %node.node_id, tools = ?node.tools, "executing node tools");

        let catalog = if simulate_only {
            HashMap::new()
        } else {
            self.catalog().await
        };

        let mut results = Map::new();
        for tool in &node.tools {
            let result = match catalog.get(tool) {
                Some(info) => self.call(tool, info, node, state).await?,
                None => {
                    if !simulate_only {
                        warn!(tool = %tool, "tool not available, using simulation");
                    }
                    self.simulate(tool, node).await
                }
            };
            results.insert(tool.clone(), result);
        }

        Ok(aggregate(node, &results))
    }

    async fn call(
        &self,
        tool: &str,
        info: &ToolInfo,
        node: &TaskNode,
        state: &AgentState,
    ) -> DomainResult<Value> {
        let arguments = prepare_arguments(tool, info, node, state);
        match self.mcp.call_tool(tool, Value::Object(arguments)).await {
            Ok(outcome) if outcome.success => {
                info!(tool = %tool, "MCP tool executed");
                let mut result = match outcome.result {
                    Some(Value::Object(map)) => map,
                    Some(other) => {
                        let mut map = Map::new();
                        map.insert("output".to_string(), other);
                        map
                    }
                    None => Map::new(),
                };
                result
                    .entry("status")
                    .or_insert_with(|| Value::from("completed"));
                Ok(Value::Object(result))
            }
            Ok(outcome) => {
                let error = outcome.error.unwrap_or_else(|| "unknown tool error".to_string());
                warn!(tool = %tool, error = %error, "MCP tool reported an error");
                Ok(json!({"status": "error", "error": error}))
            }
            Err(e) if e.is_transient() => Err(DomainError::ToolFailed(format!("{tool}: {e}"))),
            Err(e) => {
                warn!(tool = %tool, error = %e, "MCP tool call rejected");
                Ok(json!({"status": "error", "error": e.to_string()}))
            }
        }
    }

    async fn simulate(&self, tool: &str, node: &TaskNode) -> Value {
        if !self.simulated_delay.is_zero() {
            tokio::time::sleep(self.simulated_delay).await;
        }
        simulated_result(tool, node)
    }
}

static NULL: Value = Value::Null;

fn result_for<'a>(results: &'a Map<String, Value>, id: &str) -> &'a Value {
    results
        .iter()
        .find(|(name, _)| tool_id(name) == id)
        .map_or(&NULL, |(_, value)| value)
}

fn field(value: &Value, key: &str) -> Option<Value> {
    value.get(key).cloned()
}

fn tool_id(tool: &str) -> &str {
    split_tool_name(tool).map_or(tool, |(_, id)| id)
}

/// Build call arguments from node params plus execution context, applying
/// tool-specific renames and the tool's input schema.
pub fn prepare_arguments(
    tool: &str,
    info: &ToolInfo,
    node: &TaskNode,
    state: &AgentState,
) -> Map<String, Value> {
    let mut args = node.params.clone();
    args.insert("task_id".to_string(), Value::from(state.task_id()));
    args.insert("runlevel".to_string(), Value::from(state.runlevel.as_str()));
    args.insert(
        "memory_namespace".to_string(),
        Value::from(state.memory_namespace.as_str()),
    );

    let rename = |args: &mut Map<String, Value>, from: &str, to: &str| {
        if let Some(value) = args.remove(from) {
            args.insert(to.to_string(), value);
        }
    };

    match tool_id(tool) {
        "cryostat" => rename(&mut args, "target_T", "target_temperature"),
        "sweep" => {
            rename(&mut args, "type", "sweep_type");
            rename(&mut args, "range", "voltage_range");
        }
        "analyze_paper" => {
            if !args.contains_key("title") && !args.contains_key("abstract") {
                args.insert("query".to_string(), Value::from(state.task_spec.goal.as_str()));
            }
        }
        "snap_image" => {
            if !args.contains_key("save_path") {
                let stamp = Local::now().format("%Y%m%d_%H%M%S");
                args.insert(
                    "save_path".to_string(),
                    Value::from(format!("{}/image_{stamp}.tiff", state.memory_namespace)),
                );
            }
        }
        _ => {}
    }

    if let Some(valid) = info.schema_properties() {
        args.retain(|key, _| valid.contains(&key.as_str()));
    }
    args
}

/// Canned result for a tool nobody serves.
pub fn simulated_result(tool: &str, node: &TaskNode) -> Value {
    let id = tool_id(tool);
    let stamp = Local::now().format("%H%M%S");
    match id {
        "cryostat" => json!({
            "status": "simulated",
            "temperature": node.params.get("target_T").cloned().unwrap_or_else(|| json!("4 K")),
            "message": "Cryostat operation simulated",
        }),
        "sweep" => json!({
            "status": "simulated",
            "data_points": 1000,
            "filename": format!("sim_sweep_{stamp}.dat"),
            "message": "Measurement sweep simulated",
        }),
        "analyze_paper" => json!({
            "status": "simulated",
            "relevance_score": 2,
            "summary": "Simulated paper analysis",
            "message": "Paper analysis simulated",
        }),
        "snap_image" => json!({
            "status": "simulated",
            "image_path": format!("sim_image_{stamp}.tiff"),
            "resolution": "1024x1024",
            "message": "Image capture simulated",
        }),
        _ => json!({
            "status": "simulated",
            "message": format!("Tool {id} simulated"),
        }),
    }
}

/// Fold per-tool results into the node result.
pub fn aggregate(node: &TaskNode, results: &Map<String, Value>) -> Map<String, Value> {
    let by_id = |id: &str| result_for(results, id);

    let mut out = Map::new();
    out.insert("node_id".to_string(), Value::from(node.node_id.as_str()));
    out.insert("agent".to_string(), Value::from(node.agent.as_str()));
    out.insert("status".to_string(), Value::from("completed"));
    out.insert("tool_results".to_string(), Value::Object(results.clone()));
    out.insert("timestamp".to_string(), Value::from(Utc::now().to_rfc3339()));

    let agent = node.agent.as_str();
    if agent.starts_with("worker.cooldown") {
        let cryostat = by_id("cryostat");
        let temperature = by_id("temperature");
        out.insert(
            "final_temperature".to_string(),
            field(cryostat, "temperature")
                .or_else(|| field(temperature, "value"))
                .unwrap_or_else(|| json!("unknown")),
        );
        out.insert(
            "cooldown_status".to_string(),
            field(cryostat, "status").unwrap_or_else(|| json!("unknown")),
        );
        out.insert("operation_type".to_string(), json!("cooldown"));
    } else if agent.starts_with("worker.sweep") {
        let sweep = by_id("sweep");
        let daq = by_id("daq");
        out.insert(
            "data_file".to_string(),
            field(sweep, "filename")
                .or_else(|| field(daq, "output_file"))
                .unwrap_or_else(|| json!("unknown")),
        );
        out.insert(
            "data_points".to_string(),
            field(sweep, "data_points")
                .or_else(|| field(daq, "samples"))
                .unwrap_or_else(|| json!(0)),
        );
        out.insert("operation_type".to_string(), json!("measurement"));
    } else if agent.starts_with("consultant.arxiv") {
        out.insert(
            "papers_found".to_string(),
            field(by_id("search"), "count").unwrap_or_else(|| json!(0)),
        );
        out.insert(
            "relevance_scores".to_string(),
            field(by_id("score"), "scores").unwrap_or_else(|| json!([])),
        );
        out.insert("operation_type".to_string(), json!("research"));
    } else if agent.starts_with("assistant.") {
        let completed = results
            .values()
            .filter(|r| r.get("status").and_then(Value::as_str) == Some("completed"))
            .count();
        out.insert("operation_type".to_string(), json!("administrative"));
        out.insert("tasks_completed".to_string(), json!(completed));
    }

    let failed: Vec<&String> = results
        .iter()
        .filter(|(_, r)| r.get("status").and_then(Value::as_str) == Some("error"))
        .map(|(name, _)| name)
        .collect();
    if !failed.is_empty() {
        out.insert("failed_tools".to_string(), json!(failed));
        out.insert("status".to_string(), json!("partial_failure"));
    }

    out
}

/// Short random hex suffix for simulated artifact names.
pub fn short_hex() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mcp::MockMcpClient;
    use crate::domain::models::{RunLevel, TaskSpec};
    use crate::domain::ports::ToolCallOutcome;

    fn state() -> AgentState {
        let spec = TaskSpec::new("t1", "Find papers on moire", "alice").with_runlevel(RunLevel::Sim);
        let mut state = AgentState::new(spec, 3);
        state.memory_namespace = "tasks/t1".to_string();
        state
    }

    fn sweep_node() -> TaskNode {
        TaskNode::new("measurement", "worker.sweep")
            .with_tools(["instrMCP.sweep", "instrMCP.daq"])
            .with_params(json!({"type": "auto_detect", "range": "auto"}))
    }

    #[test]
    fn test_prepare_arguments_renames_and_context() {
        let info = ToolInfo::new("instrMCP.sweep", "sweep");
        let args = prepare_arguments("instrMCP.sweep", &info, &sweep_node(), &state());
        assert_eq!(args["sweep_type"], "auto_detect");
        assert_eq!(args["voltage_range"], "auto");
        assert!(!args.contains_key("type"));
        assert_eq!(args["task_id"], "t1");
        assert_eq!(args["runlevel"], "sim");
        assert_eq!(args["memory_namespace"], "tasks/t1");
    }

    #[test]
    fn test_prepare_arguments_schema_filter() {
        let info = ToolInfo::new("instrMCP.cryostat", "fridge").with_schema(json!({
            "properties": {"target_temperature": {}, "task_id": {}}
        }));
        let node = TaskNode::new("c", "worker.cooldown")
            .with_params(json!({"target_T": "20 mK", "rate": "<=5 mK/min"}));
        let args = prepare_arguments("instrMCP.cryostat", &info, &node, &state());
        let mut keys: Vec<&str> = args.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["target_temperature", "task_id"]);
    }

    #[test]
    fn test_prepare_arguments_paper_query() {
        let info = ToolInfo::new("arxiv.analyze_paper", "");
        let node = TaskNode::new("a", "consultant.arxiv");
        let args = prepare_arguments("arxiv.analyze_paper", &info, &node, &state());
        assert_eq!(args["query"], "Find papers on moire");
    }

    #[test]
    fn test_aggregate_cooldown_from_simulation() {
        let node = TaskNode::new("cooldown_setup", "worker.cooldown")
            .with_params(json!({"target_T": "20 mK"}));
        let mut results = Map::new();
        results.insert(
            "instrMCP.cryostat".to_string(),
            simulated_result("instrMCP.cryostat", &node),
        );
        let out = aggregate(&node, &results);
        assert_eq!(out["final_temperature"], "20 mK");
        assert_eq!(out["cooldown_status"], "simulated");
        assert_eq!(out["operation_type"], "cooldown");
        assert_eq!(out["status"], "completed");
    }

    #[test]
    fn test_aggregate_flags_partial_failure() {
        let node = TaskNode::new("forms", "assistant.forms");
        let mut results = Map::new();
        results.insert("forms.process".to_string(), json!({"status": "completed"}));
        results.insert("policy.validate".to_string(), json!({"status": "error", "error": "x"}));
        let out = aggregate(&node, &results);
        assert_eq!(out["tasks_completed"], 1);
        assert_eq!(out["status"], "partial_failure");
        assert_eq!(out["failed_tools"], json!(["policy.validate"]));
    }

    #[tokio::test]
    async fn test_execute_node_mixes_calls_and_simulation() {
        let mcp = MockMcpClient::new()
            .with_tool(ToolInfo::new("instrMCP.sweep", "sweep"))
            .with_response(
                "instrMCP.sweep",
                ToolCallOutcome::ok(json!({"filename": "sweep_001.h5", "data_points": 4096})),
            );
        let mcp = Arc::new(mcp);
        let executor = ToolExecutor::new(mcp.clone(), Duration::ZERO);

        let out = executor.execute_node(&sweep_node(), &state(), false).await.unwrap();
        assert_eq!(out["data_file"], "sweep_001.h5");
        assert_eq!(out["data_points"], 4096);
        assert_eq!(out["tool_results"]["instrMCP.daq"]["status"], "simulated");

        let calls = mcp.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "instrMCP.sweep");
        assert_eq!(calls[0].1["sweep_type"], "auto_detect");
    }

    #[tokio::test]
    async fn test_simulate_only_never_calls() {
        let mcp = Arc::new(MockMcpClient::new().with_tool(ToolInfo::new("instrMCP.sweep", "")));
        let executor = ToolExecutor::new(mcp.clone(), Duration::ZERO);
        executor.execute_node(&sweep_node(), &state(), true).await.unwrap();
        assert!(mcp.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_propagates() {
        let mcp = MockMcpClient::new()
            .with_tool(ToolInfo::new("instrMCP.sweep", ""))
            .with_error("instrMCP.sweep", crate::domain::ports::McpError::Timeout);
        let executor = ToolExecutor::new(Arc::new(mcp), Duration::ZERO);
        let err = executor.execute_node(&sweep_node(), &state(), false).await.unwrap_err();
        assert!(err.to_string().to_lowercase().contains("timeout"));
    }

    #[tokio::test]
    async fn test_check_availability() {
        let mcp = MockMcpClient::new().with_tool(ToolInfo::new("instrMCP.sweep", ""));
        let executor = ToolExecutor::new(Arc::new(mcp), Duration::ZERO);
        let availability = executor
            .check_availability(&["instrMCP.sweep".to_string(), "instrMCP.daq".to_string()])
            .await;
        assert_eq!(availability.available, vec!["instrMCP.sweep"]);
        assert_eq!(availability.unavailable, vec!["instrMCP.daq"]);
        assert!(!availability.all_available());
    }
}
