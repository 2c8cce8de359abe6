use serde::{Deserialize, Serialize};

/// Main configuration structure for lab-agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Planner execution settings
    #[serde(default)]
    pub planner: PlannerConfig,

    /// LLM planner configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// MCP tool aggregator configuration
    #[serde(default)]
    pub mcp: McpConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Safety settings
    #[serde(default)]
    pub safety: SafetyConfig,
}

/// Planner execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlannerConfig {
    /// Retries allowed per execution before escalation or abort
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Simulated hardware delay for dry-run workers, in milliseconds
    #[serde(default = "default_simulated_delay_ms")]
    pub simulated_delay_ms: u64,

    /// Prefix of the per-task memory namespace (`{prefix}/{task_id}`)
    #[serde(default = "default_namespace_prefix")]
    pub memory_namespace_prefix: String,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_simulated_delay_ms() -> u64 {
    100
}

fn default_namespace_prefix() -> String {
    "tasks".to_string()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            simulated_delay_ms: default_simulated_delay_ms(),
            memory_namespace_prefix: default_namespace_prefix(),
        }
    }
}

/// LLM planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    /// Use the LLM for decomposition; rule-based plans otherwise
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// API key (falls back to the `OPENAI_API_KEY` env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry policy for transient HTTP errors
    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-use-case model settings
    #[serde(default)]
    pub models: LlmModelsConfig,
}

const fn default_true() -> bool {
    true
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

const fn default_llm_timeout() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: default_llm_base_url(),
            timeout_secs: default_llm_timeout(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            models: LlmModelsConfig::default(),
        }
    }
}

/// Model name and sampling settings for one use case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModelSettings {
    pub name: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelSettings {
    fn gpt4o(temperature: f32, max_tokens: u32) -> Self {
        Self {
            name: "gpt-4o".to_string(),
            temperature,
            max_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmModelsConfig {
    #[serde(default = "default_decomposition_model")]
    pub task_decomposition: ModelSettings,

    #[serde(default = "default_extraction_model")]
    pub parameter_extraction: ModelSettings,

    #[serde(default = "default_safety_model")]
    pub safety_validation: ModelSettings,
}

fn default_decomposition_model() -> ModelSettings {
    ModelSettings::gpt4o(0.2, 2000)
}

fn default_extraction_model() -> ModelSettings {
    ModelSettings::gpt4o(0.1, 500)
}

fn default_safety_model() -> ModelSettings {
    ModelSettings::gpt4o(0.0, 300)
}

impl Default for LlmModelsConfig {
    fn default() -> Self {
        Self {
            task_decomposition: default_decomposition_model(),
            parameter_extraction: default_extraction_model(),
            safety_validation: default_safety_model(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Burst size for token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_second() -> f64 {
    2.0
}

const fn default_burst_size() -> u32 {
    5
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_http_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_http_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_http_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// MCP tool aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct McpConfig {
    /// Tool servers; tools are addressed as `{server id}.{tool}`
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,

    /// Per-call timeout in seconds
    #[serde(default = "default_mcp_timeout")]
    pub timeout_secs: u64,
}

const fn default_mcp_timeout() -> u64 {
    30
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            servers: vec![],
            timeout_secs: default_mcp_timeout(),
        }
    }
}

/// MCP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct McpServerConfig {
    /// Server id, the first segment of its tool names
    pub id: String,

    /// JSON-RPC endpoint
    pub url: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".lab-agent/lab-agent.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            retention_days: default_retention_days(),
        }
    }
}

/// Safety settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SafetyConfig {
    /// Window for `shift=night_ops` guards
    #[serde(default = "default_night_ops_window")]
    pub night_ops_window: String,

    /// Interlocks reported as tripped by the static interlock monitor
    #[serde(default)]
    pub tripped_interlocks: Vec<String>,
}

fn default_night_ops_window() -> String {
    "21:00-07:00".to_string()
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            night_ops_window: default_night_ops_window(),
            tripped_interlocks: vec![],
        }
    }
}
