//! Administrative operations: forms, receipts, policy checks.

use std::sync::Arc;

use super::delegate_to_tools;
use crate::domain::errors::DomainResult;
use crate::domain::models::AgentState;
use crate::services::tool_executor::ToolExecutor;

pub struct AssistantNode {
    executor: Arc<ToolExecutor>,
}

impl AssistantNode {
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self { executor }
    }

    pub async fn execute(&self, state: &mut AgentState) -> DomainResult<()> {
        delegate_to_tools(&self.executor, state, "assistant", "Assistant task failed").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mcp::MockMcpClient;
    use crate::domain::models::{RunLevel, TaskStatus};
    use crate::domain::ports::{ToolCallOutcome, ToolInfo};
    use crate::services::fallback_plans::fallback_plan;
    use crate::services::nodes::test_support::{executor, running_state};
    use serde_json::json;

    #[tokio::test]
    async fn test_admin_node_completes_and_advances() {
        let node = AssistantNode::new(executor(MockMcpClient::new()));
        let mut state = running_state(
            "File the expense receipt",
            RunLevel::DryRun,
            fallback_plan("expense receipt"),
        );
        node.execute(&mut state).await.unwrap();

        let admin = state.task_graph.get("admin_processing").unwrap();
        assert_eq!(admin.status, TaskStatus::Completed);
        assert_eq!(admin.result.as_ref().unwrap()["operation_type"], "administrative");
        assert_eq!(state.current_node.as_deref(), Some("brief_update"));
    }

    #[tokio::test]
    async fn test_tool_error_reported_as_partial_failure() {
        let mcp = MockMcpClient::new()
            .with_tool(ToolInfo::new("policy.validate", ""))
            .with_response("policy.validate", ToolCallOutcome::failed("policy server says no"));
        let node = AssistantNode::new(executor(mcp));
        let mut state =
            running_state("admin paperwork", RunLevel::Sim, fallback_plan("admin paperwork"));
        node.execute(&mut state).await.unwrap();

        let result = state.task_graph.get("admin_processing").unwrap().result.clone().unwrap();
        assert_eq!(result["status"], "partial_failure");
        assert_eq!(result["failed_tools"], json!(["policy.validate"]));
        assert_eq!(state.status, TaskStatus::Running);
    }
}
