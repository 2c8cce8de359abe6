//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - LlmPlanner: LLM parameter extraction, safety validation and decomposition
//! - McpClient: MCP tool discovery and invocation
//! - ApprovalStore: human approval records for LIVE runs
//! - WorkflowRunRepository: execution history
//! - Clock / InterlockMonitor: lab time and hardware interlock state

pub mod approval_store;
pub mod clock;
pub mod errors;
pub mod interlock;
pub mod llm_planner;
pub mod mcp_client;
pub mod run_repository;

pub use approval_store::ApprovalStore;
pub use clock::{Clock, FixedClock, SystemClock};
pub use errors::DatabaseError;
pub use interlock::{InterlockMonitor, StaticInterlockMonitor};
pub use llm_planner::{DisabledLlmPlanner, LlmError, LlmPlanner};
pub use mcp_client::{split_tool_name, McpClient, McpError, ToolCallOutcome, ToolInfo};
pub use run_repository::{WorkflowRun, WorkflowRunRepository};
