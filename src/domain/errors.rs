//! Domain errors for the lab-agent planner.

use thiserror::Error;

/// Domain-level errors that can occur while planning or executing a task.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Node not found in task graph: {0}")]
    NodeNotFound(String),

    #[error("No current node specified for {0}")]
    NoCurrentNode(String),

    #[error("Invalid task graph: {0}")]
    InvalidGraph(String),

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("Invalid time window: {0}")]
    InvalidTimeWindow(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("LLM request failed: {0}")]
    LlmFailed(String),

    #[error("Tool execution failed: {0}")]
    ToolFailed(String),

    #[error("Safety guard failed: {0}")]
    GuardFailed(String),

    #[error("Temporary resource conflict: {resource} is locked by task {holder}")]
    ResourceConflict { resource: String, holder: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<crate::domain::ports::errors::DatabaseError> for DomainError {
    fn from(err: crate::domain::ports::errors::DatabaseError) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
