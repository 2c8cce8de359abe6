//! Intake: turn the goal into a task graph.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AgentState, ConversationTurn, LogEvent, PlanSource, SafetyAssessment, TaskGraph, TaskStatus,
};
use crate::domain::ports::LlmPlanner;
use crate::services::fallback_plans::fallback_plan;

pub struct IntakeNode {
    llm: Arc<dyn LlmPlanner>,
    namespace_prefix: String,
}

impl IntakeNode {
    pub fn new(llm: Arc<dyn LlmPlanner>, namespace_prefix: impl Into<String>) -> Self {
        Self {
            llm,
            namespace_prefix: namespace_prefix.into(),
        }
    }

    pub async fn execute(&self, state: &mut AgentState) -> DomainResult<()> {
        let goal = state.task_spec.goal.clone();
        info!(task_id = %state.task_id(), goal = %goal, "parsing request");
        state.conversation_history.push(ConversationTurn {
            role: "user".to_string(),
            content: goal.clone(),
        });

        let (graph, source) = match self.plan_with_llm(state, &goal).await {
            Some(graph) => (graph, PlanSource::Llm),
            None => {
                info!("using rule-based task decomposition");
                (fallback_plan(&goal), PlanSource::Rules)
            }
        };

        state.task_graph = graph;
        state.current_node = state.task_graph.first_id().map(str::to_string);
        state.memory_namespace = format!("{}/{}", self.namespace_prefix, state.task_id());
        state.status = TaskStatus::Running;

        let node_count = state.task_graph.len();
        state.set_metric("planned_nodes", node_count);
        state.set_metric(
            "plan_source",
            match source {
                PlanSource::Llm => "llm",
                PlanSource::Rules => "rules",
            },
        );
        state.log(LogEvent::IntakeCompleted { source, node_count });
        info!(
            node_count,
            first_node = ?state.current_node,
            ?source,
            "task graph created"
        );
        Ok(())
    }

    /// Extract, assess and decompose with the LLM. `None` means the caller
    /// should fall back to the keyword rules.
    async fn plan_with_llm(&self, state: &mut AgentState, goal: &str) -> Option<TaskGraph> {
        if !self.llm.is_available() {
            warn!("LLM planner not available, using rule-based fallback");
            fallback(state, "LLM planner not available");
            return None;
        }

        let params = match self.llm.extract_parameters(goal).await {
            Ok(params) => params,
            Err(e) => {
                error!(error = %e, "parameter extraction failed");
                fallback(state, format!("parameter extraction failed: {e}"));
                return None;
            }
        };

        let safety = self
            .llm
            .validate_safety(goal, &params)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "safety validation failed, assuming high risk");
                SafetyAssessment::conservative()
            });
        if safety.is_blocking() {
            error!(issues = ?safety.blocking_issues, "blocking safety issues");
            state.log(LogEvent::SafetyBlocking {
                issues: safety.blocking_issues.clone(),
            });
        }

        let plan = match self.llm.generate_task_graph(goal, &params, &safety).await {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, "LLM task decomposition failed");
                fallback(state, format!("task decomposition failed: {e}"));
                return None;
            }
        };

        if !plan.execution_summary.is_empty() {
            state.conversation_history.push(ConversationTurn {
                role: "assistant".to_string(),
                content: plan.execution_summary.clone(),
            });
        }
        if !plan.estimated_duration.is_empty() {
            state.set_metric("estimated_duration", plan.estimated_duration.as_str());
        }

        let mut graph = plan.into_graph();
        if graph.is_empty() {
            warn!("LLM returned empty task graph");
            fallback(state, "LLM returned empty task graph");
            return None;
        }

        for (node_id, target) in graph.prune_dangling_links() {
            warn!(%node_id, %target, "dropping link to node outside the graph");
        }
        if let Err(e) = graph.validate() {
            warn!(error = %e, "LLM task graph rejected");
            fallback(state, e.to_string());
            return None;
        }

        info!(nodes = graph.len(), "LLM generated task graph");
        Some(graph)
    }
}

fn fallback(state: &mut AgentState, reason: impl Into<String>) {
    state.log(LogEvent::LlmFallback {
        reason: reason.into(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::MockLlmPlanner;
    use crate::domain::models::{GeneratedPlan, NodeDraft, RiskLevel, TaskSpec};
    use crate::domain::ports::{DisabledLlmPlanner, LlmError};

    fn state(goal: &str) -> AgentState {
        AgentState::new(TaskSpec::new("t1", goal, "alice"), 3)
    }

    fn draft(id: &str, agent: &str, next: &[&str]) -> NodeDraft {
        NodeDraft {
            node_id: id.to_string(),
            agent: agent.to_string(),
            tools: vec![],
            params: Default::default(),
            guards: vec![],
            on_success: next.iter().map(|s| s.to_string()).collect(),
            on_fail: vec!["notify_owner".to_string()],
        }
    }

    #[tokio::test]
    async fn test_fallback_when_llm_unavailable() {
        let node = IntakeNode::new(Arc::new(DisabledLlmPlanner), "tasks");
        let mut state = state("Cooldown device D14 and run a gate sweep");
        node.execute(&mut state).await.unwrap();

        assert_eq!(
            state.task_graph.node_ids(),
            vec!["cooldown_setup", "measurement", "brief_update"]
        );
        assert_eq!(state.current_node.as_deref(), Some("cooldown_setup"));
        assert_eq!(state.memory_namespace, "tasks/t1");
        assert_eq!(state.status, TaskStatus::Running);
        assert!(state
            .execution_log
            .iter()
            .any(|e| matches!(e.event, LogEvent::LlmFallback { .. })));
    }

    #[tokio::test]
    async fn test_llm_plan_used_in_order() {
        let plan = GeneratedPlan {
            nodes: vec![
                draft("search", "consultant.arxiv", &["summarize"]),
                draft("summarize", "info_center.brief", &[]),
            ],
            execution_summary: "search then brief".to_string(),
            estimated_duration: "10 minutes".to_string(),
            safety_requirements: vec![],
            required_approvals: vec![],
        };
        let llm = MockLlmPlanner::new().with_plan(plan);
        let node = IntakeNode::new(Arc::new(llm), "tasks");
        let mut state = state("Find new papers on moire graphene");
        node.execute(&mut state).await.unwrap();

        assert_eq!(state.task_graph.node_ids(), vec!["search", "summarize"]);
        // dangling failure link pruned
        assert!(state.task_graph.get("search").unwrap().on_fail.is_empty());
        assert_eq!(state.metrics["plan_source"], "llm");
        assert_eq!(state.conversation_history.len(), 2);
    }

    #[tokio::test]
    async fn test_cyclic_llm_plan_falls_back() {
        let plan = GeneratedPlan {
            nodes: vec![
                draft("a", "worker.generic", &["b"]),
                draft("b", "worker.generic", &["a"]),
            ],
            execution_summary: String::new(),
            estimated_duration: String::new(),
            safety_requirements: vec![],
            required_approvals: vec![],
        };
        let llm = MockLlmPlanner::new().with_plan(plan);
        let node = IntakeNode::new(Arc::new(llm), "tasks");
        let mut state = state("Process the expense receipt");
        node.execute(&mut state).await.unwrap();
        assert_eq!(state.task_graph.node_ids(), vec!["admin_processing", "brief_update"]);
        assert_eq!(state.metrics["plan_source"], "rules");
    }

    #[tokio::test]
    async fn test_llm_error_falls_back() {
        let llm = MockLlmPlanner::new().with_plan_error(LlmError::Timeout);
        let node = IntakeNode::new(Arc::new(llm), "tasks");
        let mut state = state("Calibrate the lock-in");
        node.execute(&mut state).await.unwrap();
        assert_eq!(state.task_graph.node_ids(), vec!["execute_task", "brief_update"]);
    }

    #[tokio::test]
    async fn test_blocking_safety_issues_logged() {
        let mut safety = SafetyAssessment::conservative();
        safety.risk_level = RiskLevel::Critical;
        let llm = MockLlmPlanner::new()
            .with_safety(safety)
            .with_plan_error(LlmError::Timeout);
        let node = IntakeNode::new(Arc::new(llm), "tasks");
        let mut state = state("Ramp the magnet to 12 T");
        node.execute(&mut state).await.unwrap();
        assert!(state
            .execution_log
            .iter()
            .any(|e| matches!(e.event, LogEvent::SafetyBlocking { .. })));
    }
}
