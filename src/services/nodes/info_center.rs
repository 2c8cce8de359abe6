//! Task briefs.

use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::info;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentMessage, AgentState, LogEvent, MessageType, Pod, TaskStatus};
use crate::domain::ports::Clock;

pub struct InfoCenterNode {
    clock: Arc<dyn Clock>,
}

impl InfoCenterNode {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Store a brief of the run so far. When `current_node` is an
    /// info-center node it is completed and the run advances past it.
    pub async fn execute(&self, state: &mut AgentState) -> DomainResult<()> {
        info!(task_id = %state.task_id(), "generating brief");

        let brief_node = state
            .current()
            .filter(|node| node.pod() == Pod::InfoCenter)
            .map(|node| node.node_id.clone());
        if let Some(node_id) = &brief_node {
            if let Some(node) = state.task_graph.get_mut(node_id) {
                node.start();
            }
        }

        let brief = render_brief(state);
        let artifact_id = self.artifact_id(state);
        state.artifacts.insert(artifact_id.clone(), brief);
        state.post_message(AgentMessage::new(
            MessageType::ArtifactNew,
            "info_center",
            state.task_id(),
            state.memory_namespace.as_str(),
            json!({"artifact_id": artifact_id, "kind": "brief"}),
        ));
        state.log(LogEvent::BriefStored {
            artifact_id: artifact_id.clone(),
        });

        if let Some(node_id) = brief_node {
            let mut result = Map::new();
            result.insert("brief_id".to_string(), Value::from(artifact_id.as_str()));
            result.insert("status".to_string(), Value::from("completed"));
            if let Some(node) = state.task_graph.get_mut(&node_id) {
                node.complete(result);
            }
            state.log(LogEvent::NodeCompleted { node_id });
            state.advance(true);
        }

        info!(%artifact_id, "brief generated");
        Ok(())
    }

    /// `brief_{task_id}_{YYYYmmdd_HHMMSS}`, suffixed when a brief with the
    /// same second already exists.
    fn artifact_id(&self, state: &AgentState) -> String {
        let base = format!(
            "brief_{}_{}",
            state.task_id(),
            self.clock.now().format("%Y%m%d_%H%M%S")
        );
        let mut id = base.clone();
        let mut n = 2;
        while state.artifacts.contains_key(&id) {
            id = format!("{base}_{n}");
            n += 1;
        }
        id
    }
}

/// Markdown brief of the current state.
pub fn render_brief(state: &AgentState) -> String {
    let graph = &state.task_graph;
    let mut brief = String::new();

    let _ = writeln!(brief, "# Task Brief: {}\n", state.task_id());
    let _ = writeln!(brief, "## Objective\n{}\n", state.task_spec.goal);
    let _ = writeln!(brief, "## Status");
    let _ = writeln!(brief, "- **Overall**: {}", state.status);
    let _ = writeln!(brief, "- **Runlevel**: {}", state.runlevel);
    let _ = writeln!(
        brief,
        "- **Nodes Completed**: {}/{}",
        graph.count_with_status(TaskStatus::Completed),
        graph.len()
    );
    let _ = writeln!(
        brief,
        "- **Nodes Failed**: {}",
        graph.count_with_status(TaskStatus::Failed)
    );
    let _ = writeln!(
        brief,
        "- **Execution Time**: {:.1} seconds\n",
        state.elapsed_seconds()
    );
    let _ = writeln!(brief, "## Artifacts Generated");
    let _ = writeln!(brief, "{} artifacts created\n", state.artifacts.len());
    let _ = writeln!(brief, "## Next Actions\n{}", next_actions(state));

    if state.escalated {
        let _ = writeln!(brief, "\n## Escalation");
        let _ = writeln!(brief, "Human review required. Unresolved errors:");
        for error in state.unresolved_errors() {
            let _ = writeln!(brief, "- {error}");
        }
    }
    brief
}

fn next_actions(state: &AgentState) -> &'static str {
    if state.escalated {
        return "Escalated to the task owner. Do not resume until the errors are reviewed.";
    }
    match state.status {
        TaskStatus::Completed => "Task completed successfully. No further actions required.",
        TaskStatus::Failed => "Task failed. Review errors and consider retry or manual intervention.",
        _ => "Task in progress. Monitoring ongoing.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RunLevel;
    use crate::domain::ports::FixedClock;
    use crate::services::fallback_plans::fallback_plan;
    use crate::services::nodes::test_support::running_state;

    fn node() -> InfoCenterNode {
        InfoCenterNode::new(Arc::new(FixedClock::at_hour(23)))
    }

    #[tokio::test]
    async fn test_brief_completes_info_center_node() {
        let mut state = running_state("Calibrate", RunLevel::DryRun, fallback_plan("Calibrate"));
        state.current_node = Some("brief_update".to_string());
        node().execute(&mut state).await.unwrap();

        let brief = &state.artifacts["brief_t1_20250115_230000"];
        assert!(brief.starts_with("# Task Brief: t1"));
        assert!(brief.contains("## Objective\nCalibrate"));
        assert!(brief.contains("**Nodes Completed**: 0/2"));
        assert_eq!(
            state.task_graph.get("brief_update").unwrap().status,
            TaskStatus::Completed
        );
        assert_eq!(state.current_node, None);
        assert_eq!(state.messages[0].message_type, MessageType::ArtifactNew);
    }

    #[tokio::test]
    async fn test_escalation_brief_keeps_other_nodes() {
        let mut state = running_state("Calibrate", RunLevel::Live, fallback_plan("Calibrate"));
        state.escalated = true;
        state.status = TaskStatus::Failed;
        state.record_error("Worker task failed: Safety guard failed: interlock");
        node().execute(&mut state).await.unwrap();
        node().execute(&mut state).await.unwrap();

        assert_eq!(state.artifacts.len(), 2);
        assert!(state.artifacts.contains_key("brief_t1_20250115_230000_2"));
        let brief = state.artifacts.values().next().unwrap();
        assert!(brief.contains("## Escalation"));
        assert!(brief.contains("Safety guard failed"));
        assert_eq!(state.task_graph.get("execute_task").unwrap().status, TaskStatus::Pending);
    }
}
