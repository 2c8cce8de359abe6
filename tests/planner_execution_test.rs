//! End-to-end planner executions against in-memory adapters.

mod common;

use std::sync::Arc;

use common::{PlannerFixture, D14_GOAL};
use lab_agent::adapters::llm::MockLlmPlanner;
use lab_agent::adapters::mcp::MockMcpClient;
use lab_agent::domain::models::{ApprovalDecision, GeneratedPlan, RunLevel, TaskSpec, TaskStatus};
use lab_agent::domain::ports::{ApprovalStore, McpError, ToolInfo};
use serde_json::json;

fn count(nodes: &[String], step: &str) -> usize {
    nodes.iter().filter(|n| n.as_str() == step).count()
}

#[tokio::test]
async fn test_d14_dry_run_completes_with_brief() {
    common::setup_test_logging();
    let planner = PlannerFixture::new().at_hour(23).build();

    let result = planner
        .execute_task(TaskSpec::new("tg_d14", D14_GOAL, "alice"))
        .await;

    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(
        result.nodes_executed,
        vec![
            "intake",
            "precheck",
            "approval_gate",
            "worker",
            "worker",
            "info_center",
            "finalizer"
        ]
    );
    assert!(result.briefs().count() >= 1);
    assert!(result.errors.is_empty());
    assert_eq!(result.metrics["nodes_completed"], 3);
    assert_eq!(result.metrics["plan_source"], "rules");
}

#[tokio::test]
async fn test_dry_run_waives_night_guard_at_noon() {
    let planner = PlannerFixture::new().at_hour(12).build();
    let result = planner
        .execute_task(TaskSpec::new("tg_noon", D14_GOAL, "alice"))
        .await;
    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(count(&result.nodes_executed, "worker"), 2);
}

#[tokio::test]
async fn test_live_run_waits_for_approval_then_completes() {
    let fixture = PlannerFixture::new().at_hour(23);
    let planner = fixture.build();
    let spec = TaskSpec::new("tg_live", D14_GOAL, "alice").with_runlevel(RunLevel::Live);

    let first = planner.execute_task(spec.clone()).await;
    assert_eq!(first.status, TaskStatus::Cancelled);
    assert_eq!(
        first.nodes_executed,
        vec!["intake", "precheck", "approval_gate", "finalizer"]
    );
    assert_eq!(first.pending_approvals.len(), 1);
    assert_eq!(fixture.approvals.pending().await.unwrap().len(), 1);

    fixture
        .approvals
        .decide("tg_live", ApprovalDecision::approve("pi"))
        .await
        .unwrap();

    let second = planner.execute_task(spec).await;
    assert_eq!(second.status, TaskStatus::Completed);
    assert!(second.pending_approvals.is_empty());
    assert_eq!(count(&second.nodes_executed, "worker"), 2);
    assert_eq!(second.metrics["resources_released"], 1);
    assert!(fixture.approvals.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reused_task_id_with_new_goal_needs_fresh_approval() {
    let fixture = PlannerFixture::new().at_hour(23);
    let planner = fixture.build();
    let approved = TaskSpec::new("tg_same", D14_GOAL, "alice").with_runlevel(RunLevel::Live);

    planner.execute_task(approved.clone()).await;
    fixture
        .approvals
        .decide("tg_same", ApprovalDecision::approve("pi"))
        .await
        .unwrap();

    let swapped = TaskSpec::new(
        "tg_same",
        "Ramp the magnet to 12 T and sweep gate to 5 V",
        "mallory",
    )
    .with_runlevel(RunLevel::Live);
    let result = planner.execute_task(swapped).await;

    assert_eq!(result.status, TaskStatus::Cancelled);
    assert_eq!(
        result.nodes_executed,
        vec!["intake", "precheck", "approval_gate", "finalizer"]
    );
    assert_eq!(result.pending_approvals.len(), 1);
    let pending = fixture.approvals.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].owner, "mallory");

    // The earlier approval is gone, so the original goal has to be approved again too.
    let rerun = planner.execute_task(approved).await;
    assert_eq!(rerun.status, TaskStatus::Cancelled);
    assert_eq!(count(&rerun.nodes_executed, "worker"), 0);
}

#[tokio::test]
async fn test_rejected_live_run_is_cancelled() {
    let fixture = PlannerFixture::new();
    let planner = fixture.build();
    let spec = TaskSpec::new("tg_rej", D14_GOAL, "alice").with_runlevel(RunLevel::Live);

    planner.execute_task(spec.clone()).await;
    fixture
        .approvals
        .decide(
            "tg_rej",
            ApprovalDecision::reject("pi", Some("fridge warming".to_string())),
        )
        .await
        .unwrap();

    let result = planner.execute_task(spec).await;
    assert_eq!(result.status, TaskStatus::Cancelled);
    assert_eq!(count(&result.nodes_executed, "worker"), 0);
    assert!(result.pending_approvals.is_empty());
}

#[tokio::test]
async fn test_sim_guard_failure_retries_then_escalates_to_brief() {
    let planner = PlannerFixture::new().at_hour(12).build();
    let spec = TaskSpec::new("tg_sim", D14_GOAL, "alice").with_runlevel(RunLevel::Sim);

    let result = planner.execute_task(spec).await;

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(count(&result.nodes_executed, "worker"), 4);
    assert_eq!(count(&result.nodes_executed, "error_handler"), 4);
    assert_eq!(
        &result.nodes_executed[result.nodes_executed.len() - 2..],
        ["info_center", "finalizer"]
    );
    assert!(result.briefs().count() >= 1);
    assert!(result
        .errors
        .iter()
        .any(|e| e.contains("shift=night_ops")));
    assert_eq!(result.metrics["retry_count"], 4);
}

#[tokio::test]
async fn test_transient_tool_error_aborts_after_retries() {
    let mcp = Arc::new(
        MockMcpClient::new()
            .with_tool(ToolInfo::new("instrMCP.cryostat", "Cryostat control"))
            .with_error("instrMCP.cryostat", McpError::Timeout),
    );
    let planner = PlannerFixture::new()
        .at_hour(23)
        .with_mcp(mcp.clone())
        .with_max_retries(1)
        .build();
    let spec = TaskSpec::new("tg_timeout", D14_GOAL, "alice").with_runlevel(RunLevel::Sim);

    let result = planner.execute_task(spec).await;

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(
        result.nodes_executed,
        vec![
            "intake",
            "precheck",
            "approval_gate",
            "worker",
            "error_handler",
            "worker",
            "error_handler",
            "finalizer"
        ]
    );
    let calls = mcp.calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "instrMCP.cryostat");
    assert_eq!(calls[0].1["target_temperature"], "20 mK");
    assert_eq!(calls[0].1["runlevel"], "sim");
}

#[tokio::test]
async fn test_llm_plan_is_executed() {
    let plan: GeneratedPlan = serde_json::from_value(json!({
        "nodes": [
            {
                "node_id": "lockin_setup",
                "agent": "worker.lockin",
                "tools": ["instrMCP.lockin"],
                "params": {"frequency": "17 Hz"},
                "on_success": ["report"],
                "on_fail": ["report"]
            },
            {"node_id": "report", "agent": "info_center.brief"}
        ],
        "execution_summary": "Configure the lock-in and report"
    }))
    .unwrap();
    let planner = PlannerFixture::new()
        .with_llm(MockLlmPlanner::new().with_plan(plan))
        .build();

    let result = planner
        .execute_task(TaskSpec::new("tg_llm", "Set up lock-in at 17 Hz", "alice"))
        .await;

    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.metrics["plan_source"], "llm");
    assert_eq!(
        result.nodes_executed,
        vec!["intake", "precheck", "approval_gate", "worker", "info_center", "finalizer"]
    );
}

#[tokio::test]
async fn test_invalid_llm_plan_falls_back_to_rules() {
    let plan: GeneratedPlan = serde_json::from_value(json!({
        "nodes": [
            {"node_id": "a", "agent": "worker.generic", "on_success": ["b"]},
            {"node_id": "b", "agent": "worker.generic", "on_success": ["a"]}
        ]
    }))
    .unwrap();
    let planner = PlannerFixture::new()
        .with_llm(MockLlmPlanner::new().with_plan(plan))
        .build();

    let result = planner
        .execute_task(TaskSpec::new("tg_cycle", D14_GOAL, "alice"))
        .await;

    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.metrics["plan_source"], "rules");
    assert_eq!(count(&result.nodes_executed, "worker"), 2);
}

#[tokio::test]
async fn test_concurrent_runs_are_tracked_separately() {
    let planner = Arc::new(PlannerFixture::new().build());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let planner = planner.clone();
            tokio::spawn(async move {
                planner
                    .execute_task(TaskSpec::new(format!("tg_par_{i}"), D14_GOAL, "alice"))
                    .await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles).await;
    for result in results {
        assert_eq!(result.unwrap().status, TaskStatus::Completed);
    }
    for i in 0..4 {
        assert_eq!(
            planner.task_status(&format!("tg_par_{i}")).await,
            Some(TaskStatus::Completed)
        );
    }
    assert!(planner.active_tasks().await.is_empty());
}
