use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::{ExtractedParameters, GeneratedPlan, SafetyAssessment};

/// Errors that can occur when talking to the LLM planner
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// Planner disabled or no API key configured
    #[error("LLM planner not configured: {0}")]
    NotConfigured(String),

    /// Invalid request parameters (HTTP 400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid or missing API key (HTTP 401/403)
    #[error("Unauthorized: invalid credentials")]
    Unauthorized,

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limit exceeded - too many requests")]
    RateLimitExceeded,

    /// Server error (HTTP 5xx)
    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    /// Response did not contain the expected structured output
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Returns true if this error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::ServerError(_, _) | Self::Timeout | Self::Network(_)
        )
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

/// Port for LLM-backed request understanding and task decomposition
#[async_trait]
pub trait LlmPlanner: Send + Sync {
    /// Whether the planner is configured and may be called
    fn is_available(&self) -> bool;

    /// Extract structured parameters from a natural-language request
    async fn extract_parameters(&self, request: &str) -> Result<ExtractedParameters, LlmError>;

    /// Assess the safety of the requested operation
    async fn validate_safety(
        &self,
        request: &str,
        params: &ExtractedParameters,
    ) -> Result<SafetyAssessment, LlmError>;

    /// Propose a task graph for the request
    async fn generate_task_graph(
        &self,
        request: &str,
        params: &ExtractedParameters,
        safety: &SafetyAssessment,
    ) -> Result<GeneratedPlan, LlmError>;
}

/// Planner used when no LLM is configured. Never available.
#[derive(Debug, Clone, Default)]
pub struct DisabledLlmPlanner;

#[async_trait]
impl LlmPlanner for DisabledLlmPlanner {
    fn is_available(&self) -> bool {
        false
    }

    async fn extract_parameters(&self, _request: &str) -> Result<ExtractedParameters, LlmError> {
        Err(LlmError::NotConfigured("LLM planner disabled".to_string()))
    }

    async fn validate_safety(
        &self,
        _request: &str,
        _params: &ExtractedParameters,
    ) -> Result<SafetyAssessment, LlmError> {
        Err(LlmError::NotConfigured("LLM planner disabled".to_string()))
    }

    async fn generate_task_graph(
        &self,
        _request: &str,
        _params: &ExtractedParameters,
        _safety: &SafetyAssessment,
    ) -> Result<GeneratedPlan, LlmError> {
        Err(LlmError::NotConfigured("LLM planner disabled".to_string()))
    }
}
