use async_trait::async_trait;

use crate::domain::models::{ApprovalDecision, ApprovalRequest};
use crate::domain::ports::errors::DatabaseError;

/// Port for human approval of LIVE executions, keyed by task id.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Store a request for its task. An existing request with the same
    /// fingerprint is kept, together with any decision on it; one with a
    /// different fingerprint is replaced by the new pending request. Returns
    /// the stored request.
    async fn record_request(&self, request: &ApprovalRequest)
        -> Result<ApprovalRequest, DatabaseError>;

    /// Get the request for a task
    async fn get(&self, task_id: &str) -> Result<Option<ApprovalRequest>, DatabaseError>;

    /// Decision recorded for a task, if any
    async fn decision(&self, task_id: &str) -> Result<Option<ApprovalDecision>, DatabaseError>;

    /// Record a decision
    ///
    /// # Errors
    /// `DatabaseError::NotFound` if no request exists for the task
    async fn decide(
        &self,
        task_id: &str,
        decision: ApprovalDecision,
    ) -> Result<ApprovalRequest, DatabaseError>;

    /// Requests still awaiting a decision, oldest first
    async fn pending(&self) -> Result<Vec<ApprovalRequest>, DatabaseError>;
}
