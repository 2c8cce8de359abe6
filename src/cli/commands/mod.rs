//! Subcommand implementations.
//!
//! Each module exposes clap `Args`, output structs implementing
//! [`CommandOutput`](crate::cli::display::CommandOutput) and an async `execute`.

pub mod approvals;
pub mod init;
pub mod request;
pub mod run;
pub mod runs;
pub mod tools;

use anyhow::{Context, Result};

use crate::domain::models::{Priority, RunLevel};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::setup::AppContext;

/// Load the project configuration and open the database and adapters.
pub(crate) async fn open_context() -> Result<AppContext> {
    let config = ConfigLoader::load().context("Failed to load configuration")?;
    AppContext::open(config).await
}

pub(crate) fn parse_runlevel(s: &str) -> Result<RunLevel, String> {
    RunLevel::from_str(s).ok_or_else(|| format!("unknown runlevel '{s}' (dry-run, sim, live)"))
}

pub(crate) fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::from_str(s).ok_or_else(|| format!("unknown priority '{s}' (low, normal, high, urgent)"))
}

/// Default owner for tasks submitted from the terminal.
pub(crate) fn default_owner() -> String {
    std::env::var("USER")
        .ok()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "cli".to_string())
}
