//! In-memory approval store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::models::{ApprovalDecision, ApprovalRequest, ApprovalStatus};
use crate::domain::ports::{ApprovalStore, DatabaseError};

/// Approval records held for the lifetime of the process.
#[derive(Default)]
pub struct InMemoryApprovalStore {
    requests: RwLock<HashMap<String, ApprovalRequest>>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn record_request(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalRequest, DatabaseError> {
        let mut requests = self.requests.write().await;
        let stored = requests
            .entry(request.task_id.clone())
            .or_insert_with(|| request.clone());
        if stored.fingerprint != request.fingerprint {
            *stored = request.clone();
        }
        Ok(stored.clone())
    }

    async fn get(&self, task_id: &str) -> Result<Option<ApprovalRequest>, DatabaseError> {
        Ok(self.requests.read().await.get(task_id).cloned())
    }

    async fn decision(&self, task_id: &str) -> Result<Option<ApprovalDecision>, DatabaseError> {
        let requests = self.requests.read().await;
        Ok(requests.get(task_id).and_then(|request| {
            let approved = match request.status {
                ApprovalStatus::Pending => return None,
                ApprovalStatus::Approved => true,
                ApprovalStatus::Rejected => false,
            };
            Some(ApprovalDecision {
                approved,
                decided_by: request.decided_by.clone().unwrap_or_default(),
                note: request.note.clone(),
            })
        }))
    }

    async fn decide(
        &self,
        task_id: &str,
        decision: ApprovalDecision,
    ) -> Result<ApprovalRequest, DatabaseError> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(task_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("approval for task {task_id}")))?;
        request.apply(&decision);
        Ok(request.clone())
    }

    async fn pending(&self) -> Result<Vec<ApprovalRequest>, DatabaseError> {
        let requests = self.requests.read().await;
        let mut pending: Vec<ApprovalRequest> = requests
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.requested_at);
        Ok(pending)
    }
}
