//! Implementation of the `lab-agent request` command.
//!
//! Turns a natural-language request into a `TaskSpec` and optionally runs it.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::display::{colorize_priority, colorize_runlevel, output, CommandOutput, DetailView};
use crate::domain::models::{Priority, RunLevel, TaskSpec};

use super::run::{run_with_spinner, RunOutput};
use super::{default_owner, open_context, parse_priority, parse_runlevel};

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Natural-language request, e.g. "Sweep gate voltage -1 to 1 V on D14 tonight"
    pub text: String,

    #[arg(short, long, default_value = "dry-run", value_parser = parse_runlevel)]
    pub runlevel: RunLevel,

    /// Task owner (defaults to $USER)
    #[arg(short, long)]
    pub owner: Option<String>,

    #[arg(short, long, default_value = "normal", value_parser = parse_priority)]
    pub priority: Priority,

    /// Execute the generated task immediately
    #[arg(short, long)]
    pub execute: bool,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct SpecOutput {
    pub spec: TaskSpec,
}

impl CommandOutput for SpecOutput {
    fn to_human(&self) -> String {
        let spec = &self.spec;
        let tags = (!spec.tags.is_empty()).then(|| spec.tags.join(", "));
        let mut view = DetailView::new(&format!("Task {}", spec.task_id))
            .field("Goal", spec.goal.clone())
            .field("Owner", spec.owner.clone())
            .field("Runlevel", colorize_runlevel(spec.runlevel.as_str()).to_string())
            .field("Priority", colorize_priority(spec.priority.as_str()).to_string())
            .field_opt("Tags", tags.as_deref())
            .section("Constraints");
        for constraint in &spec.constraints {
            view = view.item(constraint.clone());
        }
        view.render()
    }
}

pub async fn execute(args: RequestArgs, json_mode: bool) -> Result<()> {
    let ctx = open_context().await?;
    let planner = ctx.planner()?;

    let owner = args.owner.unwrap_or_else(default_owner);
    let spec = planner
        .create_task_from_request(&args.text, &owner, args.priority, args.runlevel)
        .await;

    if args.execute {
        let result = run_with_spinner(&planner, spec, json_mode).await;
        output(&RunOutput { result }, json_mode);
    } else {
        output(&SpecOutput { spec }, json_mode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_output_shows_constraints() {
        let spec = TaskSpec::new("tg_1", "Sweep gate on D14", "alice")
            .with_runlevel(RunLevel::Live)
            .with_constraint("window:21:00-07:00")
            .with_tag("d14");
        let human = SpecOutput { spec }.to_human();
        assert!(human.contains("window:21:00-07:00"));
        assert!(human.contains("live"));
        assert!(human.contains("d14"));
    }
}
