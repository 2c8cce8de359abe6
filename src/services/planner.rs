//! Task graph planner: drives one execution from intake to finalizer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AgentMessage, AgentState, Config, ExtractedParameters, LogEvent, MessageType, Pod, Priority,
    RunLevel, TaskSpec, TaskStatus, TimeWindow, Visibility, WorkflowResult,
};
use crate::domain::ports::{
    ApprovalStore, Clock, InterlockMonitor, LlmPlanner, McpClient, StaticInterlockMonitor,
    SystemClock, WorkflowRunRepository,
};
use crate::services::approval::ApprovalGate;
use crate::services::guards::GuardEvaluator;
use crate::services::nodes::{
    AssistantNode, ConsultantNode, InfoCenterNode, IntakeNode, PrecheckNode, WorkerNode,
};
use crate::services::resource_locks::ResourceLockTable;
use crate::services::router::{next_step, ConditionalRouter, Route, Step};
use crate::services::tool_executor::ToolExecutor;

/// Tunables for the planner.
#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub max_retries: u32,
    /// Pause standing in for instrument time in DRY-RUN and simulated tools
    pub simulated_delay: Duration,
    pub memory_namespace_prefix: String,
    pub night_ops: TimeWindow,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            simulated_delay: Duration::from_millis(100),
            memory_namespace_prefix: "tasks".to_string(),
            night_ops: GuardEvaluator::DEFAULT_NIGHT_OPS,
        }
    }
}

impl PlannerSettings {
    pub fn from_config(config: &Config) -> DomainResult<Self> {
        Ok(Self {
            max_retries: config.planner.max_retries,
            simulated_delay: Duration::from_millis(config.planner.simulated_delay_ms),
            memory_namespace_prefix: config.planner.memory_namespace_prefix.clone(),
            night_ops: TimeWindow::parse(&config.safety.night_ops_window)?,
        })
    }
}

/// Collaborators injected into the planner.
#[derive(Clone)]
pub struct PlannerDependencies {
    pub llm: Arc<dyn LlmPlanner>,
    pub mcp: Arc<dyn McpClient>,
    pub approvals: Arc<dyn ApprovalStore>,
    pub clock: Arc<dyn Clock>,
    pub interlocks: Arc<dyn InterlockMonitor>,
    pub runs: Option<Arc<dyn WorkflowRunRepository>>,
}

impl PlannerDependencies {
    pub fn new(
        llm: Arc<dyn LlmPlanner>,
        mcp: Arc<dyn McpClient>,
        approvals: Arc<dyn ApprovalStore>,
    ) -> Self {
        Self {
            llm,
            mcp,
            approvals,
            clock: Arc::new(SystemClock),
            interlocks: Arc::new(StaticInterlockMonitor::default()),
            runs: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_interlocks(mut self, interlocks: Arc<dyn InterlockMonitor>) -> Self {
        self.interlocks = interlocks;
        self
    }

    pub fn with_run_repository(mut self, runs: Arc<dyn WorkflowRunRepository>) -> Self {
        self.runs = Some(runs);
        self
    }
}

/// Live view of one execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskProgress {
    pub task_id: String,
    pub status: TaskStatus,
    pub step: String,
    pub current_node: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished: bool,
}

/// Orchestrates intake, prechecks, approval, pod execution, error handling
/// and finalization for each task.
pub struct TaskGraphPlanner {
    settings: PlannerSettings,
    llm: Arc<dyn LlmPlanner>,
    runs: Option<Arc<dyn WorkflowRunRepository>>,
    locks: Arc<ResourceLockTable>,
    intake: IntakeNode,
    precheck: PrecheckNode,
    approval: ApprovalGate,
    worker: WorkerNode,
    assistant: AssistantNode,
    consultant: ConsultantNode,
    info_center: InfoCenterNode,
    registry: Arc<RwLock<HashMap<String, TaskProgress>>>,
}

impl TaskGraphPlanner {
    pub fn new(deps: PlannerDependencies, settings: PlannerSettings) -> Self {
        let executor = Arc::new(ToolExecutor::new(deps.mcp.clone(), settings.simulated_delay));
        let locks = Arc::new(ResourceLockTable::new());
        let guards = GuardEvaluator::new(
            deps.clock.clone(),
            deps.interlocks.clone(),
            settings.night_ops,
        );

        info!(
            max_retries = settings.max_retries,
            llm_available = deps.llm.is_available(),
            "task graph planner initialized"
        );

        Self {
            intake: IntakeNode::new(deps.llm.clone(), settings.memory_namespace_prefix.clone()),
            precheck: PrecheckNode::new(executor.clone(), deps.clock.clone()),
            approval: ApprovalGate::new(deps.approvals),
            worker: WorkerNode::new(executor.clone(), guards, locks.clone()),
            assistant: AssistantNode::new(executor.clone()),
            consultant: ConsultantNode::new(executor),
            info_center: InfoCenterNode::new(deps.clock),
            llm: deps.llm,
            runs: deps.runs,
            locks,
            settings,
            registry: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    /// Upper bound on steps for a graph of `nodes` nodes.
    pub fn step_budget(nodes: usize, max_retries: u32) -> usize {
        Step::FIXED_STEPS + (nodes + 2) * (max_retries as usize + 1)
    }

    /// Run a task to a terminal status. Never fails: every error ends up in
    /// the returned result.
    #[instrument(skip(self, spec), fields(task_id = %spec.task_id, runlevel = %spec.runlevel))]
    pub async fn execute_task(&self, spec: TaskSpec) -> WorkflowResult {
        info!(goal = %spec.goal, "starting task execution");
        let mut state = AgentState::new(spec, self.settings.max_retries);
        state.memory_namespace =
            format!("{}/{}", self.settings.memory_namespace_prefix, state.task_id());
        self.track(&state, Step::Intake, false).await;

        let mut executed: Vec<String> = Vec::new();
        let mut budget = Self::step_budget(0, state.max_retries);
        let mut step = Step::Intake;

        loop {
            if step != Step::Finalizer && executed.len() >= budget {
                error!(budget, "step budget exhausted");
                state.log(LogEvent::StepBudgetExhausted { budget });
                state.record_error(format!("Step budget of {budget} steps exhausted"));
                state.status = TaskStatus::Failed;
                step = Step::Finalizer;
            }

            debug!(%step, "running step");
            let route = match step {
                Step::ErrorHandler => Some(self.handle_error(&mut state)),
                _ => {
                    self.run_step(step, &mut state).await;
                    None
                }
            };
            executed.push(step.as_str().to_string());
            state.log(LogEvent::NodeExecuted {
                node: step.as_str().to_string(),
            });
            self.track(&state, step, step == Step::Finalizer).await;

            if step == Step::Intake {
                budget = Self::step_budget(state.task_graph.len(), state.max_retries);
            }
            if step == Step::Finalizer {
                break;
            }

            let route = route.unwrap_or_else(|| ConditionalRouter::route(step, &state));
            step = match next_step(step, route) {
                Some(next) => next,
                None => {
                    error!(%step, %route, "no transition for route");
                    state.record_error(format!("No transition from {step} on route {route}"));
                    state.status = TaskStatus::Failed;
                    Step::Finalizer
                }
            };
        }

        let result = WorkflowResult::from_state(&state, executed);
        if let Some(runs) = &self.runs {
            if let Err(e) = runs.save(&state.task_spec, &result).await {
                warn!(error = %e, "failed to persist workflow run");
            }
        }
        info!(status = %result.status, elapsed = result.execution_time, "task finished");
        result
    }

    /// Run one node step. Errors become `Error in {step}: ...` and fail the run.
    async fn run_step(&self, step: Step, state: &mut AgentState) {
        let outcome = match step {
            Step::Intake => self.intake.execute(state).await,
            Step::Precheck => self.precheck.execute(state).await,
            Step::ApprovalGate => self.approval.execute(state).await,
            Step::Worker => self.worker.execute(state).await,
            Step::Assistant => self.assistant.execute(state).await,
            Step::Consultant => self.consultant.execute(state).await,
            Step::InfoCenter => self.info_center.execute(state).await,
            Step::Finalizer => {
                self.finalize(state).await;
                Ok(())
            }
            Step::ErrorHandler => Ok(()),
        };

        if let Err(e) = outcome {
            let message = format!("Error in {step}: {e}");
            error!(%step, error = %e, "step failed");
            state.record_error(message);
            state.status = TaskStatus::Failed;
        }
    }

    /// Decide retry, escalation or abort, then apply it. The decision is
    /// taken before `retry_count` moves.
    fn handle_error(&self, state: &mut AgentState) -> Route {
        let route = ConditionalRouter::route_after_error(state);
        state.retry_count += 1;

        match route {
            Route::Retry(_) => {
                let node_id = state.current_node.clone().unwrap_or_default();
                warn!(
                    %node_id,
                    attempt = state.retry_count,
                    errors = ?state.unresolved_errors(),
                    "retrying node"
                );
                state.resolve_errors();
                if let Some(node) = state.current_mut() {
                    node.reset();
                }
                state.status = TaskStatus::Running;
                state.log(LogEvent::RetryScheduled {
                    node_id,
                    attempt: state.retry_count,
                });
            }
            Route::Escalate => {
                let reason = state.unresolved_errors().join("; ");
                error!(%reason, "escalating to human");
                state.escalated = true;
                state.status = TaskStatus::Failed;
                state.post_message(
                    AgentMessage::new(
                        MessageType::Alert,
                        "error_handler",
                        state.task_id(),
                        state.memory_namespace.as_str(),
                        json!({
                            "reason": reason,
                            "errors": state.unresolved_errors(),
                            "runlevel": state.runlevel.as_str(),
                        }),
                    )
                    .requiring_ack()
                    .with_priority(Priority::Urgent)
                    .with_visibility(Visibility::Owner),
                );
                state.current_node = escalation_target(state);
                state.log(LogEvent::Escalated { reason });
            }
            _ => {
                let reason = state.unresolved_errors().join("; ");
                error!(retries = state.retry_count, %reason, "aborting task");
                state.status = TaskStatus::Failed;
                state.log(LogEvent::Aborted { reason });
                return Route::Abort;
            }
        }
        route
    }

    async fn finalize(&self, state: &mut AgentState) {
        let released = self.locks.release_all(state.task_id()).await;
        state.resource_locks.clear();

        if state.status != TaskStatus::Failed {
            state.status = if state.approved {
                TaskStatus::Completed
            } else {
                TaskStatus::Cancelled
            };
        }

        let graph = &state.task_graph;
        let completed = graph.count_with_status(TaskStatus::Completed);
        let failed = graph.count_with_status(TaskStatus::Failed);
        let artifacts = state.artifacts.len();
        let execution_time = state.elapsed_seconds();
        state.set_metric("nodes_completed", completed);
        state.set_metric("nodes_failed", failed);
        state.set_metric("retry_count", state.retry_count);
        state.set_metric("artifacts_created", artifacts);
        state.set_metric("execution_time", execution_time);
        state.set_metric("resources_released", released.len());

        state.log(LogEvent::WorkflowCompleted {
            status: state.status,
        });
        info!(status = %state.status, completed, failed, artifacts, "task finalized");
    }

    /// Build a `TaskSpec` from natural language. Without a working LLM the
    /// spec carries only the request text.
    #[instrument(skip(self, request))]
    pub async fn create_task_from_request(
        &self,
        request: &str,
        owner: &str,
        priority: Priority,
        runlevel: RunLevel,
    ) -> TaskSpec {
        if self.llm.is_available() {
            match self.llm.extract_parameters(request).await {
                Ok(params) => {
                    let spec = spec_from_parameters(request, owner, priority, runlevel, &params);
                    info!(
                        task_id = %spec.task_id,
                        constraints = spec.constraints.len(),
                        "created task spec from LLM analysis"
                    );
                    return spec;
                }
                Err(e) => warn!(error = %e, "LLM task creation failed, using basic task"),
            }
        } else {
            warn!("LLM planner not available, using basic task creation");
        }

        let spec = TaskSpec::new(generate_task_id(3), request, owner)
            .with_priority(priority)
            .with_runlevel(runlevel)
            .with_tag("user_request");
        info!(task_id = %spec.task_id, "created basic task spec");
        spec
    }

    pub async fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
        self.registry.read().await.get(task_id).map(|p| p.status)
    }

    pub async fn progress(&self, task_id: &str) -> Option<TaskProgress> {
        self.registry.read().await.get(task_id).cloned()
    }

    /// Ids of executions that have not reached the finalizer.
    pub async fn active_tasks(&self) -> Vec<String> {
        let registry = self.registry.read().await;
        let mut active: Vec<String> = registry
            .values()
            .filter(|p| !p.finished)
            .map(|p| p.task_id.clone())
            .collect();
        active.sort();
        active
    }

    async fn track(&self, state: &AgentState, step: Step, finished: bool) {
        let progress = TaskProgress {
            task_id: state.task_id().to_string(),
            status: state.status,
            step: step.as_str().to_string(),
            current_node: state.current_node.clone(),
            started_at: state.started_at,
            finished,
        };
        self.registry
            .write()
            .await
            .insert(progress.task_id.clone(), progress);
    }
}

/// The info-center node the failed node points at, if any.
fn escalation_target(state: &AgentState) -> Option<String> {
    let node = state.current()?;
    let target = state.task_graph.first_existing(&node.on_fail)?;
    state
        .task_graph
        .get(target)
        .filter(|t| t.pod() == Pod::InfoCenter && t.status == TaskStatus::Pending)
        .map(|t| t.node_id.clone())
}

/// `tg_{YYYYmmdd_HHMMSS}_{hex}`
pub fn generate_task_id(hex_len: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!(
        "tg_{}_{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        &hex[..hex_len.min(hex.len())]
    )
}

/// Constraints and tags derived from extracted parameters.
pub fn spec_from_parameters(
    request: &str,
    owner: &str,
    priority: Priority,
    runlevel: RunLevel,
    params: &ExtractedParameters,
) -> TaskSpec {
    let mut spec = TaskSpec::new(generate_task_id(4), request, owner)
        .with_priority(priority)
        .with_runlevel(runlevel)
        .with_tag("llm_generated");

    if let Some(voltage) = &params.voltage_range {
        spec = spec.with_constraint(format!("max_voltage={voltage}"));
    }
    if let Some(window) = &params.time_window {
        spec = spec.with_constraint(format!("window:{window}"));
    }
    if runlevel == RunLevel::Live {
        spec = spec.with_constraint("runlevel:live");
    }
    if let Some(kind) = &params.measurement_type {
        spec = spec.with_tag(kind.to_lowercase());
    }
    if let Some(device) = &params.device_id {
        spec = spec.with_tag(device.to_lowercase());
    }
    spec
}
