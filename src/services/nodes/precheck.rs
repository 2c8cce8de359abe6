//! Pre-execution validation of constraints, resources, budget and time windows.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentState, Constraint, LogEvent, TaskStatus};
use crate::domain::ports::Clock;
use crate::services::tool_executor::ToolExecutor;

/// Outcome of one group of checks.
#[derive(Debug, Default)]
struct CheckReport {
    passed: Vec<String>,
    errors: Vec<String>,
}

pub struct PrecheckNode {
    executor: Arc<ToolExecutor>,
    clock: Arc<dyn Clock>,
}

impl PrecheckNode {
    pub fn new(executor: Arc<ToolExecutor>, clock: Arc<dyn Clock>) -> Self {
        Self { executor, clock }
    }

    pub async fn execute(&self, state: &mut AgentState) -> DomainResult<()> {
        info!(task_id = %state.task_id(), "starting prechecks");

        let mut report = CheckReport::default();
        self.check_constraints(state, &mut report);
        self.check_resources(state, &mut report).await;
        check_budget(state, &mut report);

        if report.errors.is_empty() {
            state.status = TaskStatus::Running;
            info!(checks = report.passed.len(), "prechecks passed");
            state.log(LogEvent::PrecheckPassed {
                checks: report.passed,
            });
        } else {
            warn!(errors = ?report.errors, "prechecks failed");
            state.status = TaskStatus::Failed;
            state.errors.extend(report.errors.iter().cloned());
            state.log(LogEvent::PrecheckFailed {
                errors: report.errors,
            });
        }
        Ok(())
    }

    /// Runlevel and time-window constraints. Limits such as `max_voltage=`
    /// are recorded here and enforced by node guards.
    fn check_constraints(&self, state: &AgentState, report: &mut CheckReport) {
        let hour = self.clock.hour();
        for (raw, parsed) in state.task_spec.parsed_constraints() {
            match parsed {
                Ok(Constraint::Runlevel(required)) if required != state.runlevel => {
                    report.errors.push(format!(
                        "Runlevel mismatch: required {required}, got {}",
                        state.runlevel
                    ));
                }
                Ok(Constraint::Window(window)) if !window.contains_hour(hour) => {
                    report
                        .errors
                        .push(format!("Outside allowed time window: {window}"));
                }
                Ok(_) => report.passed.push(format!("constraint {raw}")),
                Err(e) => report
                    .errors
                    .push(format!("Invalid constraint '{raw}': {e}")),
            }
        }
    }

    /// Tools no server advertises will be simulated; that is never a failure.
    async fn check_resources(&self, state: &mut AgentState, report: &mut CheckReport) {
        let required = state.task_graph.required_tools();
        if required.is_empty() {
            report.passed.push("resources: no tools required".to_string());
            return;
        }

        let availability = self.executor.check_availability(&required).await;
        for tool in &availability.unavailable {
            state.log(LogEvent::ToolUnavailable { tool: tool.clone() });
        }
        if !availability.all_available() {
            info!(
                unavailable = ?availability.unavailable,
                "tools unavailable, they will be simulated"
            );
        }
        state.set_metric("unavailable_tools", availability.unavailable.clone());
        report.passed.push(format!(
            "resources: {}/{} tools available",
            availability.available.len(),
            required.len()
        ));
    }
}

fn check_budget(state: &mut AgentState, report: &mut CheckReport) {
    let planned = state.task_graph.len();
    state.set_metric("budget_planned_nodes", planned);
    report.passed.push(format!("budget: {planned} nodes planned"));
}
