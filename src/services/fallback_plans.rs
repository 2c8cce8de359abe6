//! Rule-based task graphs used when the LLM planner is unavailable or its
//! proposal is rejected.
//!
//! Every plan ends in `brief_update`, and failure links point at it so that
//! all links resolve inside the graph.

use serde_json::json;

use crate::domain::models::{TaskGraph, TaskNode};

pub const BRIEF_NODE_ID: &str = "brief_update";

/// Workflow family picked from goal keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    CooldownMeasurement,
    Literature,
    Admin,
    Generic,
}

impl PlanKind {
    pub fn for_goal(goal: &str) -> Self {
        let goal = goal.to_lowercase();
        let has = |word: &str| goal.contains(word);

        if has("cooldown") && (has("gate") || has("sweep")) {
            Self::CooldownMeasurement
        } else if has("arxiv") || has("papers") || has("literature") {
            Self::Literature
        } else if has("receipt") || has("expense") || has("admin") {
            Self::Admin
        } else {
            Self::Generic
        }
    }
}

/// Build the rule-based graph for a goal.
pub fn fallback_plan(goal: &str) -> TaskGraph {
    let nodes = match PlanKind::for_goal(goal) {
        PlanKind::CooldownMeasurement => vec![
            TaskNode::new("cooldown_setup", "worker.cooldown")
                .with_tools(["instrMCP.cryostat", "instrMCP.temperature"])
                .with_params(json!({"target_T": "20 mK", "rate": "<=5 mK/min"}))
                .with_guards(["interlock.cryostat_ok", "shift=night_ops"])
                .on_success(["measurement"])
                .on_fail([BRIEF_NODE_ID]),
            TaskNode::new("measurement", "worker.sweep")
                .with_tools(["instrMCP.sweep", "instrMCP.daq"])
                .with_params(json!({"type": "auto_detect", "range": "auto"}))
                .with_guards(["capability: DAC ≤ 50 mV"])
                .on_success([BRIEF_NODE_ID])
                .on_fail([BRIEF_NODE_ID]),
        ],
        PlanKind::Literature => vec![TaskNode::new("arxiv_search", "consultant.arxiv")
            .with_tools(["arxiv.search", "paper.score"])
            .with_params(json!({"keywords": "auto_extract", "days": 7}))
            .on_success([BRIEF_NODE_ID])
            .on_fail([BRIEF_NODE_ID])],
        PlanKind::Admin => vec![TaskNode::new("admin_processing", "assistant.forms")
            .with_tools(["forms.process", "policy.validate"])
            .with_params(json!({"auto_process": true}))
            .on_success([BRIEF_NODE_ID])
            .on_fail([BRIEF_NODE_ID])],
        PlanKind::Generic => vec![TaskNode::new("execute_task", "worker.generic")
            .with_tools(["generic.execute"])
            .with_params(json!({"goal": goal}))
            .on_success([BRIEF_NODE_ID])
            .on_fail([BRIEF_NODE_ID])],
    };

    let mut graph = TaskGraph::new();
    for node in nodes {
        graph.insert(node);
    }
    graph.insert(brief_node());
    graph
}

fn brief_node() -> TaskNode {
    TaskNode::new(BRIEF_NODE_ID, "info_center.brief")
        .with_tools(["brief.update"])
        .with_params(json!({"type": "completion"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_gate_plan() {
        let graph = fallback_plan("Cooldown device D14 and run a gate sweep overnight");
        assert_eq!(graph.node_ids(), vec!["cooldown_setup", "measurement", "brief_update"]);
        let cooldown = graph.get("cooldown_setup").unwrap();
        assert_eq!(cooldown.params["target_T"], "20 mK");
        assert_eq!(cooldown.guards, vec!["interlock.cryostat_ok", "shift=night_ops"]);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_cooldown_without_measurement_is_generic() {
        assert_eq!(PlanKind::for_goal("cooldown the fridge"), PlanKind::Generic);
    }

    #[test]
    fn test_literature_plan() {
        let graph = fallback_plan("Summarize new arXiv papers on twisted bilayers");
        assert_eq!(graph.node_ids(), vec!["arxiv_search", "brief_update"]);
        assert_eq!(graph.get("arxiv_search").unwrap().params["days"], 7);
    }

    #[test]
    fn test_admin_plan() {
        let graph = fallback_plan("File the expense receipt from the conference");
        assert_eq!(graph.node_ids(), vec!["admin_processing", "brief_update"]);
    }

    #[test]
    fn test_generic_plan_carries_goal() {
        let graph = fallback_plan("Calibrate the lock-in");
        assert_eq!(graph.node_ids(), vec!["execute_task", "brief_update"]);
        assert_eq!(graph.get("execute_task").unwrap().params["goal"], "Calibrate the lock-in");
    }

    #[test]
    fn test_every_plan_is_valid_and_ends_in_brief() {
        for goal in ["cooldown + sweep", "literature", "admin", "anything"] {
            let graph = fallback_plan(goal);
            assert!(graph.validate().is_ok(), "{goal}");
            assert_eq!(graph.iter().last().unwrap().node_id, BRIEF_NODE_ID);
            assert_eq!(graph.get(BRIEF_NODE_ID).unwrap().agent, "info_center.brief");
        }
    }
}
