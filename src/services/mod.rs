//! Planning and execution services.

pub mod approval;
pub mod fallback_plans;
pub mod guards;
pub mod nodes;
pub mod planner;
pub mod resource_locks;
pub mod router;
pub mod tool_executor;

pub use approval::ApprovalGate;
pub use fallback_plans::{fallback_plan, PlanKind, BRIEF_NODE_ID};
pub use guards::{GuardCheck, GuardEvaluator, GuardVerdict};
pub use planner::{PlannerDependencies, PlannerSettings, TaskGraphPlanner, TaskProgress};
pub use resource_locks::ResourceLockTable;
pub use router::{next_step, ApprovalOutcome, ConditionalRouter, ErrorClass, Route, Step};
pub use tool_executor::{ToolAvailability, ToolExecutor};
