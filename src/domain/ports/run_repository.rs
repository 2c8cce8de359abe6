use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::models::{TaskSpec, WorkflowResult};
use crate::domain::ports::errors::DatabaseError;

/// Persisted record of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub task_spec: TaskSpec,
    pub result: WorkflowResult,
}

/// Repository port for execution history
#[async_trait]
pub trait WorkflowRunRepository: Send + Sync {
    /// Insert or replace the run for `result.task_id`
    async fn save(&self, spec: &TaskSpec, result: &WorkflowResult) -> Result<(), DatabaseError>;

    /// Get a run by task id
    async fn get(&self, task_id: &str) -> Result<Option<WorkflowRun>, DatabaseError>;

    /// Most recent runs first
    async fn list_recent(&self, limit: usize) -> Result<Vec<WorkflowRun>, DatabaseError>;
}
