//! Implementation of the `lab-agent tools` commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::display::{
    action_failure, action_success, list_table, output, render_list, truncate, CommandOutput,
};
use crate::domain::ports::{McpClient, ToolInfo};

use super::open_context;

#[derive(Args, Debug)]
pub struct ToolsArgs {
    #[command(subcommand)]
    pub command: ToolsCommands,
}

#[derive(Subcommand, Debug)]
pub enum ToolsCommands {
    /// List tools advertised by the configured MCP servers
    List,
    /// Check that each configured MCP server responds
    Health,
}

#[derive(Debug, Serialize)]
pub struct ToolListOutput {
    pub tools: Vec<ToolInfo>,
    pub total: usize,
}

impl CommandOutput for ToolListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["tool", "arguments", "description"]);
        for tool in &self.tools {
            let arguments = tool
                .schema_properties()
                .map(|props| props.join(", "))
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                tool.name.clone(),
                truncate(&arguments, 40),
                truncate(&tool.description, 60),
            ]);
        }
        render_list("tool", table, self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct ServerHealth {
    pub server: String,
    pub healthy: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthOutput {
    pub servers: Vec<ServerHealth>,
}

impl CommandOutput for HealthOutput {
    fn to_human(&self) -> String {
        if self.servers.is_empty() {
            return "No MCP servers configured; all tools will be simulated.".to_string();
        }
        self.servers
            .iter()
            .map(|s| match &s.error {
                None => action_success(&s.server),
                Some(e) => action_failure(&format!("{}: {e}", s.server)),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub async fn execute(args: ToolsArgs, json_mode: bool) -> Result<()> {
    let ctx = open_context().await?;

    match args.command {
        ToolsCommands::List => {
            let mut tools = ctx
                .mcp
                .list_tools()
                .await
                .context("Failed to list MCP tools")?;
            tools.sort_by(|a, b| a.name.cmp(&b.name));
            let total = tools.len();
            output(&ToolListOutput { tools, total }, json_mode);
        }
        ToolsCommands::Health => {
            let mcp = &ctx.mcp;
            let checks = mcp.server_ids().into_iter().map(|server| {
                async move {
                    let error = mcp.health_check(server).await.err().map(|e| e.to_string());
                    ServerHealth {
                        healthy: error.is_none(),
                        server: server.to_string(),
                        error,
                    }
                }
            });
            let servers = futures::future::join_all(checks).await;
            output(&HealthOutput { servers }, json_mode);
        }
    }
    Ok(())
}
