//! Scripted LLM planner for tests.

use async_trait::async_trait;

use crate::domain::models::{ExtractedParameters, GeneratedPlan, RiskLevel, SafetyAssessment};
use crate::domain::ports::{LlmError, LlmPlanner};

/// Returns canned structured outputs. Without a plan, `generate_task_graph`
/// fails so the caller falls back to rule-based planning.
pub struct MockLlmPlanner {
    parameters: Result<ExtractedParameters, LlmError>,
    safety: Result<SafetyAssessment, LlmError>,
    plan: Result<GeneratedPlan, LlmError>,
}

impl Default for MockLlmPlanner {
    fn default() -> Self {
        Self {
            parameters: Ok(ExtractedParameters::default()),
            safety: Ok(SafetyAssessment {
                risk_level: RiskLevel::Low,
                safety_issues: vec![],
                required_guards: vec![],
                blocking_issues: vec![],
                recommendations: vec![],
            }),
            plan: Err(LlmError::MalformedResponse("no plan scripted".to_string())),
        }
    }
}

impl MockLlmPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(mut self, parameters: ExtractedParameters) -> Self {
        self.parameters = Ok(parameters);
        self
    }

    pub fn with_extract_error(mut self, error: LlmError) -> Self {
        self.parameters = Err(error);
        self
    }

    pub fn with_safety(mut self, safety: SafetyAssessment) -> Self {
        self.safety = Ok(safety);
        self
    }

    pub fn with_safety_error(mut self, error: LlmError) -> Self {
        self.safety = Err(error);
        self
    }

    pub fn with_plan(mut self, plan: GeneratedPlan) -> Self {
        self.plan = Ok(plan);
        self
    }

    pub fn with_plan_error(mut self, error: LlmError) -> Self {
        self.plan = Err(error);
        self
    }
}

#[async_trait]
impl LlmPlanner for MockLlmPlanner {
    fn is_available(&self) -> bool {
        true
    }

    async fn extract_parameters(&self, _request: &str) -> Result<ExtractedParameters, LlmError> {
        self.parameters.clone()
    }

    async fn validate_safety(
        &self,
        _request: &str,
        _params: &ExtractedParameters,
    ) -> Result<SafetyAssessment, LlmError> {
        self.safety.clone()
    }

    async fn generate_task_graph(
        &self,
        _request: &str,
        _params: &ExtractedParameters,
        _safety: &SafetyAssessment,
    ) -> Result<GeneratedPlan, LlmError> {
        self.plan.clone()
    }
}
