//! Task graph model.
//!
//! A `TaskGraph` is an insertion-ordered set of `TaskNode`s keyed by id.
//! The first node is the entry node. Links (`on_success`/`on_fail`) must
//! resolve to ids in the same graph and `on_success` edges must be acyclic.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::errors::{DomainError, DomainResult};

/// Status of a node, and of the overall task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent pod a node is dispatched to, derived from the agent's capability prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pod {
    Worker,
    Assistant,
    Consultant,
    InfoCenter,
}

impl Pod {
    pub const ALL: [Pod; 4] = [Pod::Worker, Pod::Assistant, Pod::Consultant, Pod::InfoCenter];

    /// Pod for a dotted agent name such as `worker.cooldown`.
    ///
    /// Unknown prefixes run on the worker pod as generic tasks.
    pub fn for_agent(agent: &str) -> Self {
        let prefix = agent.split('.').next().unwrap_or_default();
        match prefix {
            "assistant" => Self::Assistant,
            "consultant" => Self::Consultant,
            "info_center" => Self::InfoCenter,
            _ => Self::Worker,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Assistant => "assistant",
            Self::Consultant => "consultant",
            Self::InfoCenter => "info_center",
        }
    }
}

impl fmt::Display for Pod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual task graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    pub node_id: String,
    /// Agent pod assignment (e.g. `worker.cooldown`)
    pub agent: String,
    /// Required MCP tools, dotted `server.tool`
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Safety/interlock guards
    #[serde(default)]
    pub guards: Vec<String>,
    #[serde(default)]
    pub on_success: Vec<String>,
    #[serde(default)]
    pub on_fail: Vec<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<Map<String, Value>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskNode {
    pub fn new(node_id: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            agent: agent.into(),
            tools: Vec::new(),
            params: Map::new(),
            guards: Vec::new(),
            on_success: Vec::new(),
            on_fail: Vec::new(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set params from a JSON object; non-object values are ignored.
    pub fn with_params(mut self, params: Value) -> Self {
        if let Value::Object(map) = params {
            self.params = map;
        }
        self
    }

    pub fn with_guards<I, S>(mut self, guards: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guards = guards.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_success<I, S>(mut self, next: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_success = next.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_fail<I, S>(mut self, next: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_fail = next.into_iter().map(Into::into).collect();
        self
    }

    pub fn pod(&self) -> Pod {
        Pod::for_agent(&self.agent)
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        self.error = None;
    }

    pub fn complete(&mut self, result: Map<String, Value>) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Put the node back in the queue for another attempt.
    pub fn reset(&mut self) {
        self.status = TaskStatus::Pending;
        self.result = None;
        self.error = None;
        self.started_at = None;
        self.completed_at = None;
    }
}

/// Insertion-ordered graph of task nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph and validate it.
    pub fn from_nodes(nodes: Vec<TaskNode>) -> DomainResult<Self> {
        let graph = Self { nodes };
        graph.validate()?;
        Ok(graph)
    }

    /// Append a node, replacing any existing node with the same id in place.
    pub fn insert(&mut self, node: TaskNode) {
        match self.nodes.iter_mut().find(|n| n.node_id == node.node_id) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    pub fn get(&self, node_id: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    pub fn get_mut(&mut self, node_id: &str) -> Option<&mut TaskNode> {
        self.nodes.iter_mut().find(|n| n.node_id == node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.get(node_id).is_some()
    }

    /// Entry node id.
    pub fn first_id(&self) -> Option<&str> {
        self.nodes.first().map(|n| n.node_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.node_id.as_str()).collect()
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.nodes.iter().filter(|n| n.status == status).count()
    }

    /// All distinct tool identifiers across the graph, in first-seen order.
    pub fn required_tools(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.nodes
            .iter()
            .flat_map(|n| n.tools.iter())
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect()
    }

    /// First link target in `links` that exists in this graph.
    pub fn first_existing<'a>(&self, links: &'a [String]) -> Option<&'a str> {
        links.iter().map(String::as_str).find(|id| self.contains(id))
    }

    /// Remove links to ids that are not part of the graph. Returns the removed
    /// `(node_id, target)` pairs.
    pub fn prune_dangling_links(&mut self) -> Vec<(String, String)> {
        let ids: HashSet<String> = self.nodes.iter().map(|n| n.node_id.clone()).collect();
        let mut removed = Vec::new();
        for node in &mut self.nodes {
            for links in [&mut node.on_success, &mut node.on_fail] {
                links.retain(|target| {
                    let keep = ids.contains(target);
                    if !keep {
                        removed.push((node.node_id.clone(), target.clone()));
                    }
                    keep
                });
            }
        }
        removed
    }

    pub fn validate(&self) -> DomainResult<()> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if node.node_id.trim().is_empty() {
                return Err(DomainError::InvalidGraph("node id cannot be empty".to_string()));
            }
            if !ids.insert(node.node_id.as_str()) {
                return Err(DomainError::InvalidGraph(format!(
                    "duplicate node id '{}'",
                    node.node_id
                )));
            }
        }

        for node in &self.nodes {
            for target in node.on_success.iter().chain(node.on_fail.iter()) {
                if !ids.contains(target.as_str()) {
                    return Err(DomainError::InvalidGraph(format!(
                        "node '{}' links to unknown node '{}'",
                        node.node_id, target
                    )));
                }
            }
        }

        if let Some(cycle) = self.find_success_cycle() {
            return Err(DomainError::InvalidGraph(format!(
                "on_success cycle: {}",
                cycle.join(" -> ")
            )));
        }

        Ok(())
    }

    fn find_success_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a TaskGraph,
            id: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(id) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|p| *p == id).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|s| (*s).to_string()).collect();
                    cycle.push(id.to_string());
                    return Some(cycle);
                }
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            path.push(id);
            if let Some(node) = graph.get(id) {
                for next in &node.on_success {
                    if let Some(cycle) = visit(graph, next, marks, path) {
                        return Some(cycle);
                    }
                }
            }
            path.pop();
            marks.insert(id, Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        for node in &self.nodes {
            let mut path = Vec::new();
            if let Some(cycle) = visit(self, &node.node_id, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
        None
    }
}

impl<'a> IntoIterator for &'a TaskGraph {
    type Item = &'a TaskNode;
    type IntoIter = std::slice::Iter<'a, TaskNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
