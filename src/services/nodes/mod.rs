//! Planner step implementations.
//!
//! Every node reads and mutates the `AgentState` of one execution. Errors
//! returned from `execute` are turned into `Error in {step}: ...` entries by
//! the planner; failures of the node's own work are recorded on the node and
//! in the state instead.

pub mod assistant;
pub mod consultant;
pub mod info_center;
pub mod intake;
pub mod precheck;
pub mod worker;

pub use assistant::AssistantNode;
pub use consultant::ConsultantNode;
pub use info_center::InfoCenterNode;
pub use intake::IntakeNode;
pub use precheck::PrecheckNode;
pub use worker::WorkerNode;

use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentState, LogEvent, RunLevel, TaskNode, TaskStatus};
use crate::services::tool_executor::ToolExecutor;

/// Clone of the node `current_node` points at.
pub(crate) fn current_node(state: &AgentState, step: &str) -> DomainResult<TaskNode> {
    let node_id = state
        .current_node
        .as_deref()
        .ok_or_else(|| DomainError::NoCurrentNode(step.to_string()))?;
    state
        .task_graph
        .get(node_id)
        .cloned()
        .ok_or_else(|| DomainError::NodeNotFound(node_id.to_string()))
}

pub(crate) fn mark_started(state: &mut AgentState, node: &TaskNode) {
    if let Some(current) = state.task_graph.get_mut(&node.node_id) {
        current.start();
    }
    state.log(LogEvent::NodeStarted {
        node_id: node.node_id.clone(),
        agent: node.agent.clone(),
    });
}

/// Finish the current node with `outcome`. Success advances along
/// `on_success`; failure leaves `current_node` on the failed node so the error
/// handler can retry it.
pub(crate) fn finish_node(
    state: &mut AgentState,
    node_id: &str,
    outcome: DomainResult<serde_json::Map<String, serde_json::Value>>,
    failure_prefix: &str,
) {
    match outcome {
        Ok(result) => {
            if let Some(node) = state.task_graph.get_mut(node_id) {
                node.complete(result);
            }
            state.log(LogEvent::NodeCompleted {
                node_id: node_id.to_string(),
            });
            state.advance(true);
            info!(node_id, next = ?state.current_node, "node completed");
        }
        Err(e) => {
            let error = format!("{failure_prefix}: {e}");
            warn!(node_id, error = %error, "node failed");
            if let Some(node) = state.task_graph.get_mut(node_id) {
                node.fail(error.clone());
            }
            state.record_error(error.clone());
            state.status = TaskStatus::Failed;
            state.log(LogEvent::NodeFailed {
                node_id: node_id.to_string(),
                error,
            });
        }
    }
}

/// Run the current node's tools through the executor and record the outcome.
/// Shared by the assistant and consultant pods.
pub(crate) async fn delegate_to_tools(
    executor: &ToolExecutor,
    state: &mut AgentState,
    step: &str,
    failure_prefix: &str,
) -> DomainResult<()> {
    let node = current_node(state, step)?;
    info!(step, node_id = %node.node_id, "executing {step} tasks");
    mark_started(state, &node);

    let simulate_only = state.runlevel == RunLevel::DryRun;
    let outcome = executor.execute_node(&node, state, simulate_only).await;
    finish_node(state, &node.node_id, outcome, failure_prefix);

    info!(step, node_id = %node.node_id, "{step} tasks finished");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::adapters::mcp::MockMcpClient;
    use crate::domain::models::{AgentState, RunLevel, TaskGraph, TaskSpec, TaskStatus};
    use crate::services::tool_executor::ToolExecutor;

    pub fn executor(mcp: MockMcpClient) -> Arc<ToolExecutor> {
        Arc::new(ToolExecutor::new(Arc::new(mcp), Duration::ZERO))
    }

    /// Running state positioned on the first node of `graph`.
    pub fn running_state(goal: &str, runlevel: RunLevel, graph: TaskGraph) -> AgentState {
        let spec = TaskSpec::new("t1", goal, "alice").with_runlevel(runlevel);
        let mut state = AgentState::new(spec, 3);
        state.memory_namespace = "tasks/t1".to_string();
        state.current_node = graph.first_id().map(str::to_string);
        state.task_graph = graph;
        state.status = TaskStatus::Running;
        state.approved = true;
        state
    }
}
