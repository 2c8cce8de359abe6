//! Implementation of the `lab-agent runs` commands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::display::{
    colorize_runlevel, colorize_status, list_table, output, render_list, truncate, CommandOutput,
};
use crate::domain::ports::{WorkflowRun, WorkflowRunRepository};

use super::open_context;
use super::run::{run_with_spinner, RunOutput};

#[derive(Args, Debug)]
pub struct RunsArgs {
    #[command(subcommand)]
    pub command: RunsCommands,
}

#[derive(Subcommand, Debug)]
pub enum RunsCommands {
    /// List recent executions
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show the result of one execution
    Show {
        task_id: String,
    },
    /// Execute a stored task again, e.g. after its approval was granted
    Resume {
        task_id: String,
    },
}

#[derive(Debug, Serialize)]
pub struct RunListOutput {
    pub runs: Vec<WorkflowRun>,
    pub total: usize,
}

impl CommandOutput for RunListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["task id", "status", "runlevel", "goal", "steps", "finished"]);
        for run in &self.runs {
            table.add_row(vec![
                run.result.task_id.clone(),
                colorize_status(run.result.status.as_str()).to_string(),
                colorize_runlevel(run.task_spec.runlevel.as_str()).to_string(),
                truncate(&run.task_spec.goal, 40),
                run.result.nodes_executed.len().to_string(),
                run.result.finished_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]);
        }
        render_list("run", table, self.total)
    }
}

pub async fn execute(args: RunsArgs, json_mode: bool) -> Result<()> {
    let ctx = open_context().await?;

    match args.command {
        RunsCommands::List { limit } => {
            let runs = ctx
                .runs
                .list_recent(limit)
                .await
                .context("Failed to list runs")?;
            let total = runs.len();
            output(&RunListOutput { runs, total }, json_mode);
        }
        RunsCommands::Show { task_id } => {
            let run = ctx
                .runs
                .get(&task_id)
                .await
                .context("Failed to load run")?
                .ok_or_else(|| anyhow!("Run not found: {task_id}"))?;
            output(&RunOutput { result: run.result }, json_mode);
        }
        RunsCommands::Resume { task_id } => {
            let run = ctx
                .runs
                .get(&task_id)
                .await
                .context("Failed to load run")?
                .ok_or_else(|| anyhow!("Run not found: {task_id}"))?;
            let planner = ctx.planner()?;
            let result = run_with_spinner(&planner, run.task_spec, json_mode).await;
            output(&RunOutput { result }, json_mode);
        }
    }
    Ok(())
}
