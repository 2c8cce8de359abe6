//! Implementation of the `lab-agent approvals` commands.
//!
//! LIVE runs stop at the approval gate until a decision is recorded here;
//! `runs resume <task_id>` then picks the decision up.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::display::{
    action_failure, action_success, colorize_runlevel, list_table, output, render_list, truncate,
    CommandOutput,
};
use crate::domain::models::{ApprovalDecision, ApprovalRequest, ApprovalStatus};
use crate::domain::ports::ApprovalStore;

use super::{default_owner, open_context};

#[derive(Args, Debug)]
pub struct ApprovalsArgs {
    #[command(subcommand)]
    pub command: ApprovalsCommands,
}

#[derive(Subcommand, Debug)]
pub enum ApprovalsCommands {
    /// List requests waiting for a decision
    List,
    /// Approve a LIVE run
    Approve {
        task_id: String,
        /// Approver (defaults to $USER)
        #[arg(long)]
        by: Option<String>,
    },
    /// Reject a LIVE run
    Reject {
        task_id: String,
        #[arg(long)]
        by: Option<String>,
        /// Reason recorded with the decision
        #[arg(short, long)]
        note: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct ApprovalListOutput {
    pub approvals: Vec<ApprovalRequest>,
    pub total: usize,
}

impl CommandOutput for ApprovalListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["task id", "owner", "runlevel", "goal", "requested"]);
        for request in &self.approvals {
            table.add_row(vec![
                request.task_id.clone(),
                request.owner.clone(),
                colorize_runlevel(request.runlevel.as_str()).to_string(),
                truncate(&request.goal, 40),
                request.requested_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]);
        }
        render_list("pending approval", table, self.total)
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ApprovalDecisionOutput {
    pub request: ApprovalRequest,
}

impl CommandOutput for ApprovalDecisionOutput {
    fn to_human(&self) -> String {
        let r = &self.request;
        let by = r.decided_by.as_deref().unwrap_or("unknown");
        match r.status {
            ApprovalStatus::Approved => action_success(&format!(
                "Approved {} by {by}. Run `lab-agent runs resume {}` to continue.",
                r.task_id, r.task_id
            )),
            _ => {
                let note = r.note.as_deref().map(|n| format!(": {n}")).unwrap_or_default();
                action_failure(&format!("Rejected {} by {by}{note}", r.task_id))
            }
        }
    }
}

pub async fn execute(args: ApprovalsArgs, json_mode: bool) -> Result<()> {
    let ctx = open_context().await?;

    let decision = match args.command {
        ApprovalsCommands::List => {
            let approvals = ctx
                .approvals
                .pending()
                .await
                .context("Failed to list approvals")?;
            let total = approvals.len();
            output(&ApprovalListOutput { approvals, total }, json_mode);
            return Ok(());
        }
        ApprovalsCommands::Approve { task_id, by } => {
            (task_id, ApprovalDecision::approve(by.unwrap_or_else(default_owner)))
        }
        ApprovalsCommands::Reject { task_id, by, note } => (
            task_id,
            ApprovalDecision::reject(by.unwrap_or_else(default_owner), note),
        ),
    };

    let (task_id, decision) = decision;
    let request = ctx
        .approvals
        .decide(&task_id, decision)
        .await
        .with_context(|| format!("Failed to record decision for {task_id}"))?;
    output(&ApprovalDecisionOutput { request }, json_mode);
    Ok(())
}
