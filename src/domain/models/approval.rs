//! Human approval records for LIVE executions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task_spec::{RunLevel, TaskSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for a human to approve a task before it touches hardware.
///
/// A decision covers exactly the goal, constraints and runlevel that were
/// shown to the approver, captured in `fingerprint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: String,
    pub task_id: String,
    pub goal: String,
    pub owner: String,
    pub runlevel: RunLevel,
    #[serde(default)]
    pub fingerprint: String,
    pub status: ApprovalStatus,
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub note: Option<String>,
}

impl ApprovalRequest {
    pub fn for_task(spec: &TaskSpec) -> Self {
        Self {
            request_id: format!("approval_{}", Uuid::new_v4().simple()),
            task_id: spec.task_id.clone(),
            goal: spec.goal.clone(),
            owner: spec.owner.clone(),
            runlevel: spec.runlevel,
            fingerprint: Self::fingerprint_for(spec),
            status: ApprovalStatus::Pending,
            requested_at: Utc::now(),
            decided_at: None,
            decided_by: None,
            note: None,
        }
    }

    /// Canonical text of everything an approval vouches for.
    pub fn fingerprint_for(spec: &TaskSpec) -> String {
        serde_json::json!({
            "goal": spec.goal.trim(),
            "constraints": spec.constraints,
            "runlevel": spec.runlevel.as_str(),
        })
        .to_string()
    }

    /// Whether this request was raised for the same work as `spec`.
    pub fn covers(&self, spec: &TaskSpec) -> bool {
        self.fingerprint == Self::fingerprint_for(spec)
    }

    pub fn apply(&mut self, decision: &ApprovalDecision) {
        self.status = if decision.approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        self.decided_at = Some(Utc::now());
        self.decided_by = Some(decision.decided_by.clone());
        self.note.clone_from(&decision.note);
    }
}

/// A human decision on an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub decided_by: String,
    pub note: Option<String>,
}

impl ApprovalDecision {
    pub fn approve(decided_by: impl Into<String>) -> Self {
        Self {
            approved: true,
            decided_by: decided_by.into(),
            note: None,
        }
    }

    pub fn reject(decided_by: impl Into<String>, note: Option<String>) -> Self {
        Self {
            approved: false,
            decided_by: decided_by.into(),
            note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_decision() {
        let spec = TaskSpec::new("t1", "sweep gate", "alice").with_runlevel(RunLevel::Live);
        let mut request = ApprovalRequest::for_task(&spec);
        assert_eq!(request.status, ApprovalStatus::Pending);
        assert!(request.request_id.starts_with("approval_"));

        request.apply(&ApprovalDecision::reject("pi", Some("fridge warming".to_string())));
        assert_eq!(request.status, ApprovalStatus::Rejected);
        assert_eq!(request.decided_by.as_deref(), Some("pi"));
        assert_eq!(request.note.as_deref(), Some("fridge warming"));
        assert!(request.decided_at.is_some());
    }

    #[test]
    fn test_fingerprint_tracks_goal_constraints_and_runlevel() {
        let spec = TaskSpec::new("t1", "sweep gate", "alice")
            .with_runlevel(RunLevel::Live)
            .with_constraint("window:21:00-07:00");
        let request = ApprovalRequest::for_task(&spec);
        assert!(request.covers(&spec));

        let other_owner = TaskSpec::new("t1", "sweep gate", "bob")
            .with_runlevel(RunLevel::Live)
            .with_constraint("window:21:00-07:00");
        assert!(request.covers(&other_owner));

        let other_goal = TaskSpec::new("t1", "ramp magnet to 12 T", "alice")
            .with_runlevel(RunLevel::Live)
            .with_constraint("window:21:00-07:00");
        assert!(!request.covers(&other_goal));

        let looser = TaskSpec::new("t1", "sweep gate", "alice").with_runlevel(RunLevel::Live);
        assert!(!request.covers(&looser));
    }
}
