//! Command-line interface for the lab-agent planner.

pub mod commands;
pub mod display;

use clap::{Parser, Subcommand};

use commands::{
    approvals::ApprovalsArgs, init::InitArgs, request::RequestArgs, run::RunArgs, runs::RunsArgs,
    tools::ToolsArgs,
};

#[derive(Parser, Debug)]
#[command(name = "lab-agent")]
#[command(about = "Lab automation planner: plan, gate and run instrument tasks", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the default configuration and create the database
    Init(InitArgs),
    /// Plan and execute a task from a goal
    Run(RunArgs),
    /// Build a task from a natural-language request
    Request(RequestArgs),
    /// Execution history
    Runs(RunsArgs),
    /// Human approvals for LIVE runs
    Approvals(ApprovalsArgs),
    /// MCP tools
    Tools(ToolsArgs),
}

/// Report a command failure and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
