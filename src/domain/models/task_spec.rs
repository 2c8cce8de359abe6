//! Task specification model.
//!
//! A `TaskSpec` is created once per user request and never mutated afterwards.
//! Constraints travel as opaque strings (`runlevel:dry-run`,
//! `window:21:00-07:00`, `max_power=2mW`) and are parsed on demand.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Execution safety level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RunLevel {
    /// Nothing touches hardware; every operation is simulated.
    #[default]
    #[serde(rename = "dry-run")]
    DryRun,
    #[serde(rename = "sim")]
    Sim,
    #[serde(rename = "live")]
    Live,
}

impl RunLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DryRun => "dry-run",
            Self::Sim => "sim",
            Self::Live => "live",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dry-run" | "dry_run" | "dryrun" => Some(Self::DryRun),
            "sim" => Some(Self::Sim),
            "live" => Some(Self::Live),
            _ => None,
        }
    }
}

impl fmt::Display for RunLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" | "critical" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique task identifier
    pub task_id: String,
    /// High-level task objective
    pub goal: String,
    /// Execution constraints
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Required/expected artifacts
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Task owner/requestor
    pub owner: String,
    /// Service level agreement (ISO 8601 duration)
    #[serde(default = "default_sla")]
    pub sla: String,
    /// Classification tags
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub runlevel: RunLevel,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_sla() -> String {
    "P1D".to_string()
}

impl TaskSpec {
    /// Create a task spec with default priority, runlevel and SLA.
    pub fn new(task_id: impl Into<String>, goal: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            goal: goal.into(),
            constraints: Vec::new(),
            artifacts: Vec::new(),
            owner: owner.into(),
            sla: default_sla(),
            tags: Vec::new(),
            priority: Priority::default(),
            runlevel: RunLevel::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifacts.push(artifact.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_runlevel(mut self, runlevel: RunLevel) -> Self {
        self.runlevel = runlevel;
        self
    }

    /// Parse every constraint, keeping parse failures alongside the raw text.
    pub fn parsed_constraints(&self) -> Vec<(String, DomainResult<Constraint>)> {
        self.constraints
            .iter()
            .map(|raw| (raw.clone(), Constraint::parse(raw)))
            .collect()
    }
}

/// Parsed view of a constraint string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `runlevel:<level>`
    Runlevel(RunLevel),
    /// `window:HH:MM-HH:MM`
    Window(TimeWindow),
    /// `max_power=<value>`
    MaxPower(String),
    /// `max_voltage=<value>`
    MaxVoltage(String),
    /// Anything else, carried verbatim.
    Other(String),
}

impl Constraint {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let raw = raw.trim();
        if let Some(level) = raw.strip_prefix("runlevel:") {
            return RunLevel::from_str(level)
                .map(Self::Runlevel)
                .ok_or_else(|| DomainError::InvalidConstraint(format!("unknown runlevel '{level}'")));
        }
        if let Some(window) = raw.strip_prefix("window:") {
            return TimeWindow::parse(window).map(Self::Window);
        }
        if let Some(power) = raw.strip_prefix("max_power=") {
            return Ok(Self::MaxPower(power.trim().to_string()));
        }
        if let Some(voltage) = raw.strip_prefix("max_voltage=") {
            return Ok(Self::MaxVoltage(voltage.trim().to_string()));
        }
        Ok(Self::Other(raw.to_string()))
    }
}

/// Daily hour window such as `21:00-07:00`.
///
/// Both ends are inclusive at hour granularity. A start later than the end
/// wraps midnight. Ends must fall on the hour: `17:30` is rejected rather
/// than rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TimeWindow {
    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self { start_hour, end_hour }
    }

    pub fn parse(window: &str) -> DomainResult<Self> {
        let (start, end) = window
            .trim()
            .split_once('-')
            .ok_or_else(|| DomainError::InvalidTimeWindow(window.to_string()))?;
        Ok(Self {
            start_hour: parse_hour(start, window)?,
            end_hour: parse_hour(end, window)?,
        })
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        if self.start_hour > self.end_hour {
            hour >= self.start_hour || hour <= self.end_hour
        } else {
            self.start_hour <= hour && hour <= self.end_hour
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }
}

fn parse_hour(part: &str, window: &str) -> DomainResult<u32> {
    let invalid = || DomainError::InvalidTimeWindow(window.to_string());
    let part = part.trim();
    let (hour_text, minute_text) = part.split_once(':').unwrap_or((part, "00"));
    if minute_text != "00" {
        return Err(invalid());
    }
    match hour_text.parse::<u32>() {
        Ok(hour) if hour < 24 => Ok(hour),
        _ => Err(invalid()),
    }
}
