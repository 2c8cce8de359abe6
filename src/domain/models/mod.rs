pub mod agent_state;
pub mod approval;
pub mod config;
pub mod guard;
pub mod llm;
pub mod task_graph;
pub mod task_spec;
pub mod workflow_result;

pub use agent_state::{
    AgentMessage, AgentState, ConversationTurn, LockType, LogEntry, LogEvent, MessageType,
    PlanSource, ResourceLock, Visibility,
};
pub use approval::{ApprovalDecision, ApprovalRequest, ApprovalStatus};
pub use config::{
    Config, DatabaseConfig, LlmConfig, LlmModelsConfig, LoggingConfig, McpConfig,
    McpServerConfig, ModelSettings, PlannerConfig, RateLimitConfig, RetryConfig, SafetyConfig,
};
pub use guard::{Guard, Quantity, Shift};
pub use llm::{ExtractedParameters, GeneratedPlan, NodeDraft, RiskLevel, SafetyAssessment};
pub use task_graph::{Pod, TaskGraph, TaskNode, TaskStatus};
pub use task_spec::{Constraint, Priority, RunLevel, TaskSpec, TimeWindow};
pub use workflow_result::WorkflowResult;
