//! lab-agent: task-graph planner for laboratory automation
//!
//! Turns a high-level lab goal ("cool down D14 and run a gate sweep") into a
//! task graph, checks it against safety guards, gates LIVE runs on human
//! approval, and executes it through MCP instrument tools or simulation.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, domain errors and port traits
//! - **Service Layer** (`services`): planner, router, nodes, guards and locks
//! - **Adapters** (`adapters`): OpenAI, MCP over HTTP, SQLite and in-memory stores
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging and wiring
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lab_agent::adapters::{mcp::MockMcpClient, memory::InMemoryApprovalStore};
//! use lab_agent::domain::ports::DisabledLlmPlanner;
//! use lab_agent::{PlannerDependencies, PlannerSettings, TaskGraphPlanner, TaskSpec};
//!
//! #[tokio::main]
//! async fn main() {
//!     let deps = PlannerDependencies::new(
//!         Arc::new(DisabledLlmPlanner),
//!         Arc::new(MockMcpClient::new()),
//!         Arc::new(InMemoryApprovalStore::new()),
//!     );
//!     let planner = TaskGraphPlanner::new(deps, PlannerSettings::default());
//!     let spec = TaskSpec::new("tg_demo", "Cooldown D14 to 20 mK and gate sweep", "alice");
//!     let result = planner.execute_task(spec).await;
//!     println!("{}", result.summary);
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    AgentState, ApprovalDecision, ApprovalRequest, Config, Priority, RunLevel, TaskGraph,
    TaskNode, TaskSpec, TaskStatus, WorkflowResult,
};
pub use domain::ports::{ApprovalStore, LlmPlanner, McpClient, WorkflowRunRepository};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{PlannerDependencies, PlannerSettings, TaskGraphPlanner};
