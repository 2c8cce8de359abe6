//! Knowledge work: literature search, paper analysis, wiki updates.

use std::sync::Arc;

use super::delegate_to_tools;
use crate::domain::errors::DomainResult;
use crate::domain::models::AgentState;
use crate::services::tool_executor::ToolExecutor;

pub struct ConsultantNode {
    executor: Arc<ToolExecutor>,
}

impl ConsultantNode {
    pub fn new(executor: Arc<ToolExecutor>) -> Self {
        Self { executor }
    }

    pub async fn execute(&self, state: &mut AgentState) -> DomainResult<()> {
        delegate_to_tools(&self.executor, state, "consultant", "Consultant task failed").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mcp::MockMcpClient;
    use crate::domain::models::{RunLevel, TaskStatus};
    use crate::domain::ports::{McpError, ToolInfo};
    use crate::services::fallback_plans::fallback_plan;
    use crate::services::nodes::test_support::{executor, running_state};

    #[tokio::test]
    async fn test_literature_search_dry_run() {
        let mcp = MockMcpClient::new().with_tool(ToolInfo::new("arxiv.search", ""));
        let node = ConsultantNode::new(executor(mcp));
        let mut state = running_state(
            "Summarize new arXiv papers",
            RunLevel::DryRun,
            fallback_plan("arxiv papers"),
        );
        node.execute(&mut state).await.unwrap();

        let search = state.task_graph.get("arxiv_search").unwrap();
        assert_eq!(search.status, TaskStatus::Completed);
        let result = search.result.as_ref().unwrap();
        assert_eq!(result["operation_type"], "research");
        assert_eq!(result["tool_results"]["arxiv.search"]["status"], "simulated");
        assert_eq!(state.current_node.as_deref(), Some("brief_update"));
    }

    #[tokio::test]
    async fn test_connection_error_fails_node() {
        let mcp = MockMcpClient::new()
            .with_tool(ToolInfo::new("arxiv.search", ""))
            .with_error("arxiv.search", McpError::ConnectionError("refused".to_string()));
        let node = ConsultantNode::new(executor(mcp));
        let mut state =
            running_state("literature review", RunLevel::Sim, fallback_plan("literature"));
        node.execute(&mut state).await.unwrap();

        assert_eq!(state.status, TaskStatus::Failed);
        assert!(state.errors[0].starts_with("Consultant task failed: Tool execution failed"));
        assert_eq!(state.current_node.as_deref(), Some("arxiv_search"));
    }

    #[tokio::test]
    async fn test_no_current_node() {
        let node = ConsultantNode::new(executor(MockMcpClient::new()));
        let mut state = running_state("x", RunLevel::DryRun, fallback_plan("literature"));
        state.current_node = None;
        assert!(node.execute(&mut state).await.is_err());
    }
}
