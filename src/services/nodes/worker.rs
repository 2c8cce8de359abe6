//! Instrument and hardware operations.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Local;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::{current_node, finish_node, mark_started};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentState, LogEvent, RunLevel, TaskNode};
use crate::domain::ports::split_tool_name;
use crate::services::guards::{GuardEvaluator, GuardVerdict};
use crate::services::resource_locks::ResourceLockTable;
use crate::services::tool_executor::{short_hex, ToolExecutor};

/// Worker operation picked from the agent name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Cooldown,
    Sweep,
    LockIn,
    Generic,
}

impl WorkerKind {
    pub fn for_agent(agent: &str) -> Self {
        if agent.starts_with("worker.cooldown") {
            Self::Cooldown
        } else if agent.starts_with("worker.sweep") {
            Self::Sweep
        } else if agent.starts_with("worker.lockin") {
            Self::LockIn
        } else {
            Self::Generic
        }
    }
}

pub struct WorkerNode {
    executor: Arc<ToolExecutor>,
    guards: GuardEvaluator,
    locks: Arc<ResourceLockTable>,
}

impl WorkerNode {
    pub fn new(
        executor: Arc<ToolExecutor>,
        guards: GuardEvaluator,
        locks: Arc<ResourceLockTable>,
    ) -> Self {
        Self {
            executor,
            guards,
            locks,
        }
    }

    pub async fn execute(&self, state: &mut AgentState) -> DomainResult<()> {
        let node = current_node(state, "worker")?;
        info!(
            node_id = %node.node_id,
            agent = %node.agent,
            tools = ?node.tools,
            "executing worker task"
        );
        mark_started(state, &node);

        let outcome = self.run(&node, state).await;
        finish_node(state, &node.node_id, outcome, "Worker task failed");
        Ok(())
    }

    async fn run(&self, node: &TaskNode, state: &mut AgentState) -> DomainResult<Map<String, Value>> {
        self.enforce_guards(node, state).await?;

        if state.runlevel == RunLevel::DryRun {
            let delay = self.executor.simulated_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            return Ok(canned_result(node, true));
        }

        self.lock_resources(node, state).await?;
        let aggregated = self.executor.execute_node(node, state, false).await?;
        if aggregated.get("status").and_then(Value::as_str) == Some("partial_failure") {
            warn!(node_id = %node.node_id, failed = ?aggregated.get("failed_tools"), "some tools failed");
        }

        let mut result = canned_result(node, false);
        result.extend(aggregated);
        Ok(result)
    }

    /// Failing guards stop SIM and LIVE work. DRY-RUN touches no hardware, so
    /// violations there are logged as waived.
    async fn enforce_guards(&self, node: &TaskNode, state: &mut AgentState) -> DomainResult<()> {
        let mut failures = Vec::new();
        for check in self.guards.evaluate(node).await? {
            match check.verdict {
                GuardVerdict::Pass => {}
                GuardVerdict::Unrecognized => {
                    warn!(node_id = %node.node_id, guard = %check.raw, "unrecognized guard");
                    state.log(LogEvent::GuardUnrecognized {
                        node_id: node.node_id.clone(),
                        guard: check.raw,
                    });
                }
                GuardVerdict::Fail(reason) if state.runlevel == RunLevel::DryRun => {
                    warn!(node_id = %node.node_id, guard = %check.raw, %reason, "guard waived in dry-run");
                    state.log(LogEvent::GuardWaived {
                        node_id: node.node_id.clone(),
                        guard: check.raw,
                        reason,
                    });
                }
                GuardVerdict::Fail(reason) => failures.push(format!("{}: {reason}", check.raw)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DomainError::GuardFailed(failures.join("; ")))
        }
    }

    /// One exclusive lock per tool server.
    async fn lock_resources(&self, node: &TaskNode, state: &mut AgentState) -> DomainResult<()> {
        let servers: BTreeSet<&str> = node
            .tools
            .iter()
            .filter_map(|tool| split_tool_name(tool).map(|(server, _)| server))
            .collect();

        for server in servers {
            let lock = self.locks.acquire(server, state.task_id()).await?;
            if !state.resource_locks.iter().any(|l| l.resource_id == lock.resource_id) {
                state.log(LogEvent::ResourceLocked {
                    resource_id: lock.resource_id.clone(),
                });
                state.resource_locks.push(lock);
            }
        }
        Ok(())
    }
}

/// Result fields each worker operation reports, filled with simulated values
/// in DRY-RUN.
pub fn canned_result(node: &TaskNode, dry_run: bool) -> Map<String, Value> {
    let param = |key: &str, default: &str| {
        node.params
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::from(default))
    };

    let value = match WorkerKind::for_agent(&node.agent) {
        WorkerKind::Cooldown => {
            let time_taken = if dry_run { "simulated" } else { "2.5 hours" };
            json!({
                "final_temperature": param("target_T", "20 mK"),
                "time_taken": time_taken,
                "status": "completed",
            })
        }
        WorkerKind::Sweep => {
            let (points, data_file) = if dry_run {
                (json!("simulated"), format!("sim_sweep_{}.h5", short_hex()))
            } else {
                (
                    json!(10000),
                    format!("sweep_{}.h5", Local::now().format("%Y%m%d_%H%M%S")),
                )
            };
            json!({
                "sweep_type": param("type", "1D"),
                "points_measured": points,
                "data_file": data_file,
                "status": "completed",
            })
        }
        WorkerKind::LockIn => json!({
            "frequency_set": param("frequency", "1 kHz"),
            "sensitivity_set": param("sensitivity", "auto"),
            "status": "configured",
        }),
        WorkerKind::Generic => json!({
            "task_completed": true,
            "status": "completed",
        }),
    };

    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
