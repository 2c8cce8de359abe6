//! Implementation of the `lab-agent run` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::display::{
    colorize_status, create_spinner, output, CommandOutput, DetailView,
    ProgressBarExt,
};
use crate::domain::models::{Priority, RunLevel, TaskSpec, WorkflowResult};
use crate::services::planner::generate_task_id;
use crate::services::TaskGraphPlanner;

use super::{default_owner, open_context, parse_priority, parse_runlevel};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task goal, e.g. "Cooldown D14 to 20 mK and run a gate sweep"
    pub goal: String,

    /// Execution safety level: dry-run, sim or live
    #[arg(short, long, default_value = "dry-run", value_parser = parse_runlevel)]
    pub runlevel: RunLevel,

    /// Task owner (defaults to $USER)
    #[arg(short, long)]
    pub owner: Option<String>,

    #[arg(short, long, default_value = "normal", value_parser = parse_priority)]
    pub priority: Priority,

    /// Constraint such as "window:21:00-07:00" or "max_power=2mW" (repeatable)
    #[arg(short, long = "constraint")]
    pub constraints: Vec<String>,

    /// Classification tag (repeatable)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Reuse a task id instead of generating one
    #[arg(long)]
    pub task_id: Option<String>,
}

impl RunArgs {
    pub fn into_spec(self) -> TaskSpec {
        let task_id = self.task_id.unwrap_or_else(|| generate_task_id(3));
        let owner = self.owner.unwrap_or_else(default_owner);
        let spec = TaskSpec::new(task_id, self.goal, owner)
            .with_runlevel(self.runlevel)
            .with_priority(self.priority);
        let spec = self
            .constraints
            .into_iter()
            .fold(spec, TaskSpec::with_constraint);
        self.tags.into_iter().fold(spec, TaskSpec::with_tag)
    }
}

/// Final result of one execution.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct RunOutput {
    pub result: WorkflowResult,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let r = &self.result;
        let mut view = DetailView::new(&format!("Task {}", r.task_id))
            .field("Status", colorize_status(r.status.as_str()).to_string())
            .field("Time", format!("{:.2}s", r.execution_time))
            .field("Steps", r.nodes_executed.join(" → "))
            .field("Summary", r.summary.clone());

        view = view.section("Pending approvals");
        for id in &r.pending_approvals {
            view = view.item(format!("{id}  (lab-agent approvals approve {})", r.task_id));
        }
        view = view.section("Artifacts");
        for (id, content) in &r.artifacts {
            let first_line = content.lines().next().unwrap_or_default();
            view = view.item(format!("{id}: {first_line}"));
        }
        view = view.section("Errors");
        for error in &r.errors {
            view = view.item(error.clone());
        }
        view.render()
    }
}

/// Execute a spec behind a spinner and print the result.
pub(crate) async fn run_with_spinner(
    planner: &TaskGraphPlanner,
    spec: TaskSpec,
    json_mode: bool,
) -> WorkflowResult {
    let spinner = create_spinner(
        format!("Running {} [{}]", spec.task_id, spec.runlevel),
        json_mode,
    );
    let result = planner.execute_task(spec).await;
    if result.is_success() {
        spinner.finish_success(result.status.as_str());
    } else {
        spinner.finish_error(result.status.as_str());
    }
    result
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let ctx = open_context().await?;
    let planner = ctx.planner()?;

    let result = run_with_spinner(&planner, args.into_spec(), json_mode).await;
    output(&RunOutput { result }, json_mode);
    Ok(())
}
