//! Approval gate for runlevel elevation.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AgentMessage, AgentState, ApprovalRequest, ApprovalStatus, LogEvent, MessageType, Priority,
    RunLevel, Visibility,
};
use crate::domain::ports::ApprovalStore;

/// DRY-RUN and SIM are approved on the spot. LIVE runs need a recorded human
/// decision in the approval store.
pub struct ApprovalGate {
    store: Arc<dyn ApprovalStore>,
}

impl ApprovalGate {
    pub fn new(store: Arc<dyn ApprovalStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, state: &mut AgentState) -> DomainResult<()> {
        if state.runlevel != RunLevel::Live {
            state.approved = true;
            state.log(LogEvent::AutoApproved {
                runlevel: state.runlevel,
            });
            return Ok(());
        }

        if let Some(previous) = self.store.get(state.task_id()).await? {
            if !previous.covers(&state.task_spec) {
                warn!(
                    task_id = %state.task_id(),
                    previous_status = %previous.status,
                    "task changed since approval was requested; asking again"
                );
            }
        }

        let request = ApprovalRequest::for_task(&state.task_spec);
        let stored = self.store.record_request(&request).await?;
        let request_id = stored.request_id.clone();
        // A decision only counts for the work the approver saw.
        let status = if stored.covers(&state.task_spec) {
            stored.status
        } else {
            ApprovalStatus::Pending
        };

        state.post_message(
            AgentMessage::new(
                MessageType::ApprovalRequest,
                "approval_gate",
                state.task_id(),
                state.memory_namespace.as_str(),
                json!({
                    "request_id": request_id,
                    "reason": "Runlevel elevation to LIVE required",
                    "task_goal": state.task_spec.goal,
                    "constraints": state.task_spec.constraints,
                }),
            )
            .requiring_ack()
            .with_priority(Priority::High)
            .with_visibility(Visibility::Owner),
        );
        if !state.pending_approvals.contains(&request_id) {
            state.pending_approvals.push(request_id.clone());
        }
        state.log(LogEvent::ApprovalRequested {
            request_id: request_id.clone(),
        });

        match status {
            ApprovalStatus::Pending => {
                info!(task_id = %state.task_id(), %request_id, "awaiting approval for LIVE run");
            }
            ApprovalStatus::Approved => {
                info!(task_id = %state.task_id(), decided_by = ?stored.decided_by, "LIVE run approved");
                state.approved = true;
                state.pending_approvals.retain(|id| id != &request_id);
                state.log(LogEvent::ApprovalDecided { approved: true });
            }
            ApprovalStatus::Rejected => {
                warn!(task_id = %state.task_id(), note = ?stored.note, "LIVE run rejected");
                state.approved = false;
                state.pending_approvals.retain(|id| id != &request_id);
                state.log(LogEvent::ApprovalDecided { approved: false });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryApprovalStore;
    use crate::domain::models::{ApprovalDecision, TaskSpec};
    use crate::services::router::{ApprovalOutcome, ConditionalRouter};

    fn live_state() -> AgentState {
        let spec = TaskSpec::new("t-live", "Cooldown D14 and gate sweep", "alice")
            .with_runlevel(RunLevel::Live);
        AgentState::new(spec, 3)
    }

    #[tokio::test]
    async fn test_non_live_auto_approved() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let gate = ApprovalGate::new(store.clone());
        let mut state = AgentState::new(TaskSpec::new("t1", "goal", "alice"), 3);
        gate.execute(&mut state).await.unwrap();
        assert!(state.approved);
        assert!(state.pending_approvals.is_empty());
        assert!(store.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_live_without_decision_is_pending() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let gate = ApprovalGate::new(store.clone());
        let mut state = live_state();
        gate.execute(&mut state).await.unwrap();

        assert!(!state.approved);
        assert_eq!(state.pending_approvals.len(), 1);
        assert_eq!(state.messages[0].message_type, MessageType::ApprovalRequest);
        assert!(state.messages[0].requires_ack);
        assert_eq!(ConditionalRouter::approval_outcome(&state), ApprovalOutcome::Pending);
        assert_eq!(store.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rerun_after_approval() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let gate = ApprovalGate::new(store.clone());
        gate.execute(&mut live_state()).await.unwrap();
        store
            .decide("t-live", ApprovalDecision::approve("pi"))
            .await
            .unwrap();

        let mut state = live_state();
        gate.execute(&mut state).await.unwrap();
        assert!(state.approved);
        assert_eq!(ConditionalRouter::approval_outcome(&state), ApprovalOutcome::Approved);
    }

    #[tokio::test]
    async fn test_approval_does_not_carry_over_to_changed_goal() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let gate = ApprovalGate::new(store.clone());
        gate.execute(&mut live_state()).await.unwrap();
        store.decide("t-live", ApprovalDecision::approve("pi")).await.unwrap();

        let spec = TaskSpec::new("t-live", "Ramp the magnet to 12 T", "mallory")
            .with_runlevel(RunLevel::Live);
        let mut state = AgentState::new(spec, 3);
        gate.execute(&mut state).await.unwrap();

        assert!(!state.approved);
        assert_eq!(state.pending_approvals.len(), 1);
        assert_eq!(ConditionalRouter::approval_outcome(&state), ApprovalOutcome::Pending);
        let pending = store.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].goal, "Ramp the magnet to 12 T");
    }

    #[tokio::test]
    async fn test_rejection_routes_rejected() {
        let store = Arc::new(InMemoryApprovalStore::new());
        let gate = ApprovalGate::new(store.clone());
        gate.execute(&mut live_state()).await.unwrap();
        store
            .decide("t-live", ApprovalDecision::reject("pi", Some("fridge busy".to_string())))
            .await
            .unwrap();

        let mut state = live_state();
        gate.execute(&mut state).await.unwrap();
        assert!(!state.approved);
        assert!(state.pending_approvals.is_empty());
        assert_eq!(ConditionalRouter::approval_outcome(&state), ApprovalOutcome::Rejected);
    }
}
