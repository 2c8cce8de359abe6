//! Outcome of one task execution.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::agent_state::AgentState;
use super::task_graph::TaskStatus;

/// Final result of a workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub artifacts: BTreeMap<String, String>,
    /// Wall time in seconds
    pub execution_time: f64,
    /// Step names in execution order
    pub nodes_executed: Vec<String>,
    pub errors: Vec<String>,
    pub metrics: Map<String, Value>,
    #[serde(default)]
    pub pending_approvals: Vec<String>,
    pub summary: String,
    #[serde(default = "Utc::now")]
    pub finished_at: DateTime<Utc>,
}

impl WorkflowResult {
    pub fn from_state(state: &AgentState, nodes_executed: Vec<String>) -> Self {
        let total = state.task_graph.len();
        let completed = state.task_graph.count_with_status(TaskStatus::Completed);
        let summary = format!(
            "Task {}: {} ({}/{} nodes completed, {} errors)",
            state.task_id(),
            state.status,
            completed,
            total,
            state.errors.len()
        );
        Self {
            task_id: state.task_id().to_string(),
            status: state.status,
            artifacts: state.artifacts.clone(),
            execution_time: state.elapsed_seconds(),
            nodes_executed,
            errors: state.errors.clone(),
            metrics: state.metrics.clone(),
            pending_approvals: state.pending_approvals.clone(),
            summary,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Artifact ids of generated briefs.
    pub fn briefs(&self) -> impl Iterator<Item = &str> {
        self.artifacts
            .keys()
            .map(String::as_str)
            .filter(|id| id.starts_with("brief_"))
    }
}
