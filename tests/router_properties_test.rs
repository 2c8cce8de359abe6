//! Property tests for routing, time windows and execution termination.

mod common;

use common::PlannerFixture;
use lab_agent::domain::models::{AgentState, RunLevel, TaskNode, TaskSpec, TimeWindow};
use lab_agent::services::{next_step, ConditionalRouter, Route, Step};
use lab_agent::TaskGraphPlanner;
use proptest::prelude::*;

/// State whose current node failed with `error` after `retry_count` retries.
fn failed_state(error: &str, runlevel: RunLevel, retry_count: u32, max_retries: u32) -> AgentState {
    let spec = TaskSpec::new("t_prop", "Gate sweep", "alice").with_runlevel(runlevel);
    let mut state = AgentState::new(spec, max_retries);
    let mut node = TaskNode::new("measurement", "worker.sweep");
    node.fail(error);
    state.task_graph.insert(node);
    state.current_node = Some("measurement".to_string());
    state.record_error(format!("Worker task failed: {error}"));
    state.retry_count = retry_count;
    state
}

fn runlevel() -> impl Strategy<Value = RunLevel> {
    prop_oneof![Just(RunLevel::DryRun), Just(RunLevel::Sim), Just(RunLevel::Live)]
}

#[test]
fn test_night_window_examples() {
    let window = TimeWindow::parse("21:00-07:00").unwrap();
    for hour in [23, 3, 21, 7] {
        assert!(window.contains_hour(hour), "{hour}");
    }
    assert!(!window.contains_hour(12));
}

#[test_strategy::proptest]
fn prop_wrapping_window_membership(
    #[strategy(13u32..24)] start: u32,
    #[strategy(0u32..12)] end: u32,
    #[strategy(0u32..24)] hour: u32,
) {
    let window = TimeWindow::new(start, end);
    prop_assert_eq!(window.contains_hour(hour), hour >= start || hour <= end);
}

#[test_strategy::proptest]
fn prop_window_round_trips_through_display(
    #[strategy(0u32..24)] start: u32,
    #[strategy(0u32..24)] end: u32,
) {
    let window = TimeWindow::new(start, end);
    prop_assert_eq!(TimeWindow::parse(&window.to_string()).unwrap(), window);
}

proptest! {
    /// A timeout under budget is retried on the failed node's pod.
    #[test]
    fn prop_timeout_under_budget_retries(
        max_retries in 1u32..6,
        used in 0u32..6,
        level in runlevel(),
    ) {
        prop_assume!(used < max_retries);
        let state = failed_state("Connection timeout", level, used, max_retries);
        prop_assert!(matches!(
            ConditionalRouter::route_after_error(&state),
            Route::Retry(_)
        ));
    }

    /// Once the budget is spent, ordinary errors abort unless the run is LIVE.
    #[test]
    fn prop_exhausted_budget_aborts_or_escalates(
        max_retries in 0u32..6,
        extra in 0u32..3,
        level in runlevel(),
    ) {
        let state = failed_state("Connection timeout", level, max_retries + extra, max_retries);
        let expected = if level == RunLevel::Live { Route::Escalate } else { Route::Abort };
        prop_assert_eq!(ConditionalRouter::route_after_error(&state), expected);
    }

    /// Non-retryable errors never retry, whatever the budget.
    #[test]
    fn prop_permission_errors_never_retry(max_retries in 1u32..6, level in runlevel()) {
        let state = failed_state("Permission denied on /dev/dac0", level, 0, max_retries);
        prop_assert!(!matches!(
            ConditionalRouter::route_after_error(&state),
            Route::Retry(_)
        ));
    }

    /// Safety-related errors always reach a human once retries are spent.
    #[test]
    fn prop_safety_errors_escalate(max_retries in 0u32..4, level in runlevel()) {
        let state = failed_state("interlock cryostat_ok not OK", level, max_retries, max_retries);
        prop_assert_eq!(ConditionalRouter::route_after_error(&state), Route::Escalate);
    }
}

#[test]
fn test_transition_table_shape() {
    for route in Route::all() {
        assert_eq!(next_step(Step::Finalizer, route), None, "{route}");
        assert_ne!(next_step(Step::ErrorHandler, route), Some(Step::ErrorHandler));
        assert_ne!(next_step(Step::Intake, route), Some(Step::Intake));
    }
    for step in Step::ALL {
        if step != Step::Finalizer && step != Step::ErrorHandler && step != Step::Precheck {
            assert_eq!(next_step(step, Route::Error), Some(Step::ErrorHandler), "{step}");
        }
    }
}

fn goal() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Cooldown D14 and run a gate sweep".to_string()),
        Just("Summarize new arXiv papers on moiré graphene".to_string()),
        Just("File the expense receipt".to_string()),
        "[a-z ]{0,40}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Every run reaches the finalizer within the step budget.
    #[test]
    fn prop_execution_terminates_within_budget(
        goal in goal(),
        level in runlevel(),
        hour in 0u32..24,
        max_retries in 0u32..4,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let planner = PlannerFixture::new()
            .at_hour(hour)
            .with_max_retries(max_retries)
            .build();
        let spec = TaskSpec::new("t_budget", goal, "alice").with_runlevel(level);

        let result = runtime.block_on(planner.execute_task(spec));

        prop_assert!(result.status.is_terminal());
        prop_assert_eq!(result.nodes_executed.last().map(String::as_str), Some("finalizer"));
        // Rule-based plans have at most three nodes.
        prop_assert!(result.nodes_executed.len() <= TaskGraphPlanner::step_budget(3, max_retries) + 1);
    }
}
