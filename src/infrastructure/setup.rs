//! Project initialization and runtime wiring
//!
//! Handles:
//! - Configuration directory and default config file creation
//! - Database creation and migrations
//! - Building the planner and its adapters from `Config`

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::llm::OpenAiPlanner;
use crate::adapters::mcp::HttpMcpClient;
use crate::adapters::sqlite::{
    initialize_configured_database, SqliteApprovalRepository, SqliteWorkflowRunRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::{DisabledLlmPlanner, LlmPlanner, StaticInterlockMonitor};
use crate::infrastructure::config::CONFIG_DIR;
use crate::services::{PlannerDependencies, PlannerSettings, TaskGraphPlanner};

/// Default configuration template content
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# lab-agent configuration
# Override settings by editing this file, adding .lab-agent/local.yaml, or
# setting environment variables with the LAB_AGENT_ prefix
#
# Example environment variables:
#   export LAB_AGENT_PLANNER__MAX_RETRIES=5
#   export LAB_AGENT_LLM__ENABLED=false
#   export LAB_AGENT_LOGGING__LEVEL=debug

planner:
  # Retries per execution before escalation (LIVE/safety) or abort
  max_retries: 3

  # Simulated hardware delay for DRY-RUN workers, in milliseconds
  simulated_delay_ms: 100

  # Memory namespace is "{prefix}/{task_id}"
  memory_namespace_prefix: "tasks"

llm:
  # Use the LLM for request analysis and decomposition; rule-based plans otherwise
  enabled: true

  # API key; falls back to the OPENAI_API_KEY environment variable
  # api_key: "sk-..."

  base_url: "https://api.openai.com/v1"
  timeout_secs: 60

  rate_limit:
    requests_per_second: 2.0
    burst_size: 5

  retry:
    max_retries: 3
    initial_backoff_ms: 500
    max_backoff_ms: 30000

  models:
    task_decomposition:
      name: "gpt-4o"
      temperature: 0.2
      max_tokens: 2000
    parameter_extraction:
      name: "gpt-4o"
      temperature: 0.1
      max_tokens: 500
    safety_validation:
      name: "gpt-4o"
      temperature: 0.0
      max_tokens: 300

mcp:
  # Tool servers; tools are addressed as "{id}.{tool}"
  servers: []
  #  - id: "instrMCP"
  #    url: "http://localhost:8765/mcp"
  #  - id: "arxiv"
  #    url: "http://localhost:8766/mcp"
  timeout_secs: 30

database:
  path: ".lab-agent/lab-agent.db"
  max_connections: 5

logging:
  # Log level: trace, debug, info, warn, error
  level: "info"

  # Log format: json, pretty
  format: "pretty"

  # Rolling JSON log files are written here when set
  # log_dir: ".lab-agent/logs"

  # Rotation: daily, hourly, never
  rotation: "daily"
  retention_days: 30

safety:
  # Window allowed by "shift=night_ops" guards
  night_ops_window: "21:00-07:00"

  # Interlocks to report as tripped (e.g. cryostat_ok) while no live
  # interlock feed is connected
  tripped_interlocks: []
"#;

/// Setup paths and directories
pub struct SetupPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
}

impl SetupPaths {
    /// Get setup paths for the current directory
    pub fn new() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Ok(Self::for_root(current_dir))
    }

    pub fn for_root(root: impl AsRef<Path>) -> Self {
        let config_dir = root.as_ref().join(CONFIG_DIR);
        Self {
            config_file: config_dir.join("config.yaml"),
            config_dir,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.config_file.exists()
    }
}

/// Write the default config, keeping an existing one unless `force`.
/// Returns whether the file was written.
pub fn create_config_file(paths: &SetupPaths, force: bool) -> Result<bool> {
    fs::create_dir_all(&paths.config_dir).context("Failed to create config directory")?;
    if paths.config_file.exists() && !force {
        return Ok(false);
    }
    fs::write(&paths.config_file, DEFAULT_CONFIG_TEMPLATE)
        .context("Failed to write config file")?;
    Ok(true)
}

/// Adapters and storage shared by the CLI commands.
pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub approvals: Arc<SqliteApprovalRepository>,
    pub runs: Arc<SqliteWorkflowRunRepository>,
    pub mcp: Arc<HttpMcpClient>,
    pub llm: Arc<dyn LlmPlanner>,
}

impl AppContext {
    /// Open the database (applying migrations) and construct the adapters.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = initialize_configured_database(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;

        let llm: Arc<dyn LlmPlanner> = if config.llm.enabled {
            Arc::new(OpenAiPlanner::new(config.llm.clone())?)
        } else {
            Arc::new(DisabledLlmPlanner)
        };

        Ok(Self {
            approvals: Arc::new(SqliteApprovalRepository::new(pool.clone())),
            runs: Arc::new(SqliteWorkflowRunRepository::new(pool.clone())),
            mcp: Arc::new(HttpMcpClient::new(&config.mcp)),
            llm,
            pool,
            config,
        })
    }

    pub fn planner(&self) -> Result<TaskGraphPlanner> {
        let settings =
            PlannerSettings::from_config(&self.config).context("Invalid planner settings")?;
        let deps = PlannerDependencies::new(
            self.llm.clone(),
            self.mcp.clone(),
            self.approvals.clone(),
        )
        .with_interlocks(Arc::new(StaticInterlockMonitor::new(
            self.config.safety.tripped_interlocks.iter().cloned(),
        )))
        .with_run_repository(self.runs.clone());
        Ok(TaskGraphPlanner::new(deps, settings))
    }
}
