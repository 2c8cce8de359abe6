//! Per-execution agent state.
//!
//! One `AgentState` is owned by one `execute_task` call. Nodes mutate it in
//! sequence; the router only reads it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::task_graph::{TaskGraph, TaskNode, TaskStatus};
use super::task_spec::{Priority, RunLevel, TaskSpec};

/// Where the task graph came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Llm,
    Rules,
}

/// Structured execution log event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    IntakeCompleted { source: PlanSource, node_count: usize },
    LlmFallback { reason: String },
    SafetyBlocking { issues: Vec<String> },
    PrecheckPassed { checks: Vec<String> },
    PrecheckFailed { errors: Vec<String> },
    ToolUnavailable { tool: String },
    AutoApproved { runlevel: RunLevel },
    ApprovalRequested { request_id: String },
    ApprovalDecided { approved: bool },
    NodeStarted { node_id: String, agent: String },
    NodeCompleted { node_id: String },
    NodeFailed { node_id: String, error: String },
    GuardWaived { node_id: String, guard: String, reason: String },
    GuardUnrecognized { node_id: String, guard: String },
    ResourceLocked { resource_id: String },
    RetryScheduled { node_id: String, attempt: u32 },
    Escalated { reason: String },
    Aborted { reason: String },
    BriefStored { artifact_id: String },
    NodeExecuted { node: String },
    StepBudgetExhausted { budget: usize },
    WorkflowCompleted { status: TaskStatus },
}

/// Execution log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: LogEvent,
}

/// Inter-agent message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "task.dispatch")]
    TaskDispatch,
    #[serde(rename = "status.update")]
    StatusUpdate,
    #[serde(rename = "artifact.new")]
    ArtifactNew,
    #[serde(rename = "alert")]
    Alert,
    #[serde(rename = "approval.request")]
    ApprovalRequest,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskDispatch => "task.dispatch",
            Self::StatusUpdate => "status.update",
            Self::ArtifactNew => "artifact.new",
            Self::Alert => "alert",
            Self::ApprovalRequest => "approval.request",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may see a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Visibility {
    #[default]
    #[serde(rename = "lab")]
    Lab,
    #[serde(rename = "owner")]
    Owner,
    #[serde(rename = "pi-only")]
    PiOnly,
}

/// Message exchanged between agent pods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub msg_id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub sender: String,
    pub task_id: String,
    pub namespace: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub requires_ack: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub visibility: Visibility,
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(
        message_type: MessageType,
        sender: impl Into<String>,
        task_id: impl Into<String>,
        namespace: impl Into<String>,
        payload: Value,
    ) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            msg_id: Uuid::new_v4().to_string(),
            message_type,
            sender: sender.into(),
            task_id: task_id.into(),
            namespace: namespace.into(),
            payload,
            requires_ack: false,
            priority: Priority::Normal,
            visibility: Visibility::Lab,
            timestamp: Utc::now(),
        }
    }

    pub fn requiring_ack(mut self) -> Self {
        self.requires_ack = true;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Lock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockType {
    #[default]
    Exclusive,
    Shared,
}

/// Symbolic lock on a lab resource (an instrument server, a fridge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLock {
    pub resource_id: String,
    /// Task id holding the lock
    pub locked_by: String,
    pub lock_type: LockType,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ResourceLock {
    pub fn exclusive(resource_id: impl Into<String>, locked_by: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            locked_by: locked_by.into(),
            lock_type: LockType::Exclusive,
            acquired_at: Utc::now(),
            expires_at: None,
            metadata: Map::new(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// One turn of LLM conversation kept for context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

/// Mutable state threaded through every step of one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub task_spec: TaskSpec,
    pub task_graph: TaskGraph,
    pub current_node: Option<String>,
    pub status: TaskStatus,
    pub runlevel: RunLevel,
    pub approved: bool,
    pub memory_namespace: String,
    pub conversation_history: Vec<ConversationTurn>,
    /// Artifact id to content or URI
    pub artifacts: BTreeMap<String, String>,
    pub execution_log: Vec<LogEntry>,
    pub metrics: Map<String, Value>,
    /// Full error history. Entries before `resolved_errors` were handled by a retry.
    pub errors: Vec<String>,
    pub resolved_errors: usize,
    pub retry_count: u32,
    pub max_retries: u32,
    pub messages: Vec<AgentMessage>,
    pub pending_approvals: Vec<String>,
    pub resource_locks: Vec<ResourceLock>,
    pub budget_consumed: f64,
    pub escalated: bool,
    pub started_at: DateTime<Utc>,
}

impl AgentState {
    pub fn new(task_spec: TaskSpec, max_retries: u32) -> Self {
        let runlevel = task_spec.runlevel;
        Self {
            task_spec,
            task_graph: TaskGraph::new(),
            current_node: None,
            status: TaskStatus::Pending,
            runlevel,
            approved: false,
            memory_namespace: String::new(),
            conversation_history: Vec::new(),
            artifacts: BTreeMap::new(),
            execution_log: Vec::new(),
            metrics: Map::new(),
            errors: Vec::new(),
            resolved_errors: 0,
            retry_count: 0,
            max_retries,
            messages: Vec::new(),
            pending_approvals: Vec::new(),
            resource_locks: Vec::new(),
            budget_consumed: 0.0,
            escalated: false,
            started_at: Utc::now(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_spec.task_id
    }

    /// Append a log entry. Timestamps are kept strictly increasing even when
    /// the wall clock does not advance between two events.
    pub fn log(&mut self, event: LogEvent) {
        let mut timestamp = Utc::now();
        if let Some(last) = self.execution_log.last() {
            if timestamp <= last.timestamp {
                timestamp = last.timestamp + Duration::microseconds(1);
            }
        }
        self.execution_log.push(LogEntry { timestamp, event });
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Errors raised since the last retry.
    pub fn unresolved_errors(&self) -> &[String] {
        self.errors.get(self.resolved_errors..).unwrap_or_default()
    }

    pub fn has_unresolved_errors(&self) -> bool {
        !self.unresolved_errors().is_empty()
    }

    pub fn resolve_errors(&mut self) {
        self.resolved_errors = self.errors.len();
    }

    pub fn current(&self) -> Option<&TaskNode> {
        self.current_node
            .as_deref()
            .and_then(|id| self.task_graph.get(id))
    }

    pub fn current_mut(&mut self) -> Option<&mut TaskNode> {
        match self.current_node.as_deref() {
            Some(id) => self.task_graph.get_mut(id),
            None => None,
        }
    }

    /// Move `current_node` along the current node's success or failure links.
    /// Clears it when no linked node exists.
    pub fn advance(&mut self, succeeded: bool) {
        let next = self.current().and_then(|node| {
            let links = if succeeded { &node.on_success } else { &node.on_fail };
            self.task_graph.first_existing(links).map(str::to_string)
        });
        self.current_node = next;
    }

    pub fn post_message(&mut self, message: AgentMessage) {
        self.messages.push(message);
    }

    pub fn set_metric(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metrics.insert(key.into(), value.into());
    }

    pub fn elapsed_seconds(&self) -> f64 {
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_microseconds().map_or(0.0, |us| us as f64 / 1_000_000.0)
    }
}
