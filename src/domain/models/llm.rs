//! Structured outputs exchanged with the LLM planner.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::task_graph::{TaskGraph, TaskNode};

/// Parameters pulled out of a natural-language request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedParameters {
    /// Target temperature with units
    #[serde(default)]
    pub temperature: Option<String>,
    /// Voltage range or limit
    #[serde(default)]
    pub voltage_range: Option<String>,
    /// Device identifier (e.g. D14)
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub time_window: Option<String>,
    #[serde(default)]
    pub measurement_type: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub safety_level: Option<String>,
    #[serde(default)]
    pub additional_params: Map<String, Value>,
}

impl ExtractedParameters {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Risk level assigned by safety validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Safety validation of a proposed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub safety_issues: Vec<String>,
    #[serde(default)]
    pub required_guards: Vec<String>,
    /// Issues that prevent execution
    #[serde(default)]
    pub blocking_issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl SafetyAssessment {
    /// Assessment used when validation itself could not run.
    pub fn conservative() -> Self {
        Self {
            risk_level: RiskLevel::High,
            safety_issues: vec!["Safety validation failed".to_string()],
            required_guards: Vec::new(),
            blocking_issues: vec!["Unable to assess safety - requires manual review".to_string()],
            recommendations: Vec::new(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        !self.blocking_issues.is_empty()
    }
}

/// Node as proposed by the LLM, before it joins a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDraft {
    pub node_id: String,
    #[serde(default = "default_agent")]
    pub agent: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub guards: Vec<String>,
    #[serde(default)]
    pub on_success: Vec<String>,
    #[serde(default)]
    pub on_fail: Vec<String>,
}

fn default_agent() -> String {
    "worker.generic".to_string()
}

impl From<NodeDraft> for TaskNode {
    fn from(draft: NodeDraft) -> Self {
        let mut node = TaskNode::new(draft.node_id, draft.agent)
            .with_tools(draft.tools)
            .with_guards(draft.guards)
            .on_success(draft.on_success)
            .on_fail(draft.on_fail);
        node.params = draft.params;
        node
    }
}

/// Task graph proposal returned by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPlan {
    /// Nodes in execution entry order
    pub nodes: Vec<NodeDraft>,
    #[serde(default)]
    pub execution_summary: String,
    #[serde(default)]
    pub estimated_duration: String,
    #[serde(default)]
    pub safety_requirements: Vec<String>,
    #[serde(default)]
    pub required_approvals: Vec<String>,
}

impl GeneratedPlan {
    /// Build an unvalidated graph from the proposed nodes.
    pub fn into_graph(self) -> TaskGraph {
        let mut graph = TaskGraph::new();
        for draft in self.nodes {
            graph.insert(draft.into());
        }
        graph
    }
}
