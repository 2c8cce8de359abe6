//! Conditional routing between planner steps.
//!
//! Routing is split in two: pure functions read an `AgentState` and return a
//! `Route` label, and `next_step` maps `(Step, Route)` to the step that runs
//! next. The pair table is finite; a `None` means the pair is not legal.

use std::fmt;

use crate::domain::models::{AgentState, Pod, RunLevel, TaskStatus};

/// Error text that must not be retried.
const NON_RETRYABLE_KEYWORDS: [&str; 5] = [
    "permission denied",
    "unauthorized",
    "invalid credentials",
    "syntax error",
    "malformed request",
];

/// Error text known to be transient.
const RETRYABLE_KEYWORDS: [&str; 6] = [
    "timeout",
    "connection",
    "network",
    "temporary",
    "rate limit",
    "server error",
];

/// Error text that requires a human.
const CRITICAL_KEYWORDS: [&str; 5] = [
    "safety",
    "interlock",
    "emergency",
    "critical",
    "hardware damage",
];

/// A planner step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Intake,
    Precheck,
    ApprovalGate,
    Worker,
    Assistant,
    Consultant,
    InfoCenter,
    ErrorHandler,
    Finalizer,
}

impl Step {
    pub const ALL: [Step; 9] = [
        Step::Intake,
        Step::Precheck,
        Step::ApprovalGate,
        Step::Worker,
        Step::Assistant,
        Step::Consultant,
        Step::InfoCenter,
        Step::ErrorHandler,
        Step::Finalizer,
    ];

    /// Step names with a fixed place in every run.
    pub const FIXED_STEPS: usize = 5;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Precheck => "precheck",
            Self::ApprovalGate => "approval_gate",
            Self::Worker => "worker",
            Self::Assistant => "assistant",
            Self::Consultant => "consultant",
            Self::InfoCenter => "info_center",
            Self::ErrorHandler => "error_handler",
            Self::Finalizer => "finalizer",
        }
    }

    pub fn is_pod(&self) -> bool {
        self.pod().is_some()
    }

    pub fn pod(&self) -> Option<Pod> {
        match self {
            Self::Worker => Some(Pod::Worker),
            Self::Assistant => Some(Pod::Assistant),
            Self::Consultant => Some(Pod::Consultant),
            Self::InfoCenter => Some(Pod::InfoCenter),
            _ => None,
        }
    }
}

impl From<Pod> for Step {
    fn from(pod: Pod) -> Self {
        match pod {
            Pod::Worker => Self::Worker,
            Pod::Assistant => Self::Assistant,
            Pod::Consultant => Self::Consultant,
            Pod::InfoCenter => Self::InfoCenter,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing label produced after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Continue along the fixed prefix (intake, precheck)
    Next,
    /// Dispatch to the pod owning the current node
    To(Pod),
    /// No node left to run
    Complete,
    /// Approval requested but not yet decided
    Pending,
    Rejected,
    Error,
    Retry(Pod),
    Escalate,
    Abort,
}

impl Route {
    /// Every route label, with each pod-carrying variant expanded.
    pub fn all() -> Vec<Route> {
        let mut routes = vec![
            Route::Next,
            Route::Complete,
            Route::Pending,
            Route::Rejected,
            Route::Error,
            Route::Escalate,
            Route::Abort,
        ];
        for pod in Pod::ALL {
            routes.push(Route::To(pod));
            routes.push(Route::Retry(pod));
        }
        routes
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next => f.write_str("next"),
            Self::To(pod) => write!(f, "to_{pod}"),
            Self::Complete => f.write_str("complete"),
            Self::Pending => f.write_str("pending"),
            Self::Rejected => f.write_str("rejected"),
            Self::Error => f.write_str("error"),
            Self::Retry(pod) => write!(f, "retry_{pod}"),
            Self::Escalate => f.write_str("escalate"),
            Self::Abort => f.write_str("abort"),
        }
    }
}

/// Transition table. Returns `None` for pairs that cannot occur.
pub fn next_step(step: Step, route: Route) -> Option<Step> {
    use Route as R;
    use Step as S;

    match (step, route) {
        (S::Intake, R::Next) => Some(S::Precheck),
        (S::Intake, R::Error) => Some(S::ErrorHandler),

        (S::Precheck, R::Next) => Some(S::ApprovalGate),
        (S::Precheck, R::Abort) => Some(S::Finalizer),

        (S::ApprovalGate, R::To(pod)) => Some(pod.into()),
        (S::ApprovalGate, R::Complete | R::Pending | R::Rejected) => Some(S::Finalizer),
        (S::ApprovalGate, R::Error) => Some(S::ErrorHandler),

        (S::Worker | S::Assistant | S::Consultant | S::InfoCenter, R::To(pod)) => Some(pod.into()),
        (S::Worker | S::Assistant | S::Consultant | S::InfoCenter, R::Complete) => {
            Some(S::Finalizer)
        }
        (S::Worker | S::Assistant | S::Consultant | S::InfoCenter, R::Error) => {
            Some(S::ErrorHandler)
        }

        (S::ErrorHandler, R::Retry(pod)) => Some(pod.into()),
        (S::ErrorHandler, R::Escalate) => Some(S::InfoCenter),
        (S::ErrorHandler, R::Abort) => Some(S::Finalizer),

        _ => None,
    }
}

/// How the approval gate left the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Pending,
    Rejected,
}

/// Classification of a batch of error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

/// Classify errors: any non-retryable keyword wins; everything else,
/// including unknown text, is retryable.
pub fn classify_errors<S: AsRef<str>>(errors: &[S]) -> ErrorClass {
    let any_match = |keywords: &[&str]| {
        errors.iter().any(|error| {
            let lower = error.as_ref().to_lowercase();
            keywords.iter().any(|keyword| lower.contains(keyword))
        })
    };

    if any_match(&NON_RETRYABLE_KEYWORDS) {
        return ErrorClass::NonRetryable;
    }
    if any_match(&RETRYABLE_KEYWORDS) {
        return ErrorClass::Retryable;
    }
    ErrorClass::Retryable
}

/// Whether any error mentions a critical safety condition.
pub fn is_critical<S: AsRef<str>>(errors: &[S]) -> bool {
    errors.iter().any(|error| {
        let lower = error.as_ref().to_lowercase();
        CRITICAL_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
    })
}

/// Pure routing decisions over agent state.
pub struct ConditionalRouter;

impl ConditionalRouter {
    pub fn route_after_intake(state: &AgentState) -> Route {
        if Self::has_failed(state) {
            Route::Error
        } else {
            Route::Next
        }
    }

    /// Precheck failures are validation errors and are never retried.
    pub fn route_after_precheck(state: &AgentState) -> Route {
        if state.status == TaskStatus::Failed {
            Route::Abort
        } else {
            Route::Next
        }
    }

    pub fn approval_outcome(state: &AgentState) -> ApprovalOutcome {
        if !state.pending_approvals.is_empty() && !state.approved {
            ApprovalOutcome::Pending
        } else if state.approved {
            ApprovalOutcome::Approved
        } else {
            ApprovalOutcome::Rejected
        }
    }

    /// An approved run dispatches straight to the pod of its entry node.
    pub fn route_after_approval(state: &AgentState) -> Route {
        if state.status == TaskStatus::Failed {
            return Route::Error;
        }
        match Self::approval_outcome(state) {
            ApprovalOutcome::Approved => Self::next_pod(state),
            ApprovalOutcome::Pending => Route::Pending,
            ApprovalOutcome::Rejected => Route::Rejected,
        }
    }

    pub fn route_after_worker(state: &AgentState) -> Route {
        Self::route_after_pod(state)
    }

    pub fn route_after_assistant(state: &AgentState) -> Route {
        Self::route_after_pod(state)
    }

    pub fn route_after_consultant(state: &AgentState) -> Route {
        Self::route_after_pod(state)
    }

    /// After an escalation the brief is the last thing that runs.
    pub fn route_after_info_center(state: &AgentState) -> Route {
        if state.escalated {
            return Route::Complete;
        }
        Self::route_after_pod(state)
    }

    pub fn route_after_error(state: &AgentState) -> Route {
        let errors = state.unresolved_errors();

        if state.retry_count < state.max_retries
            && classify_errors(errors) == ErrorClass::Retryable
        {
            if let Some(node) = state.current() {
                if node.status == TaskStatus::Failed {
                    return Route::Retry(node.pod());
                }
            }
        }

        if is_critical(errors) || state.runlevel == RunLevel::Live {
            return Route::Escalate;
        }

        Route::Abort
    }

    /// Route for a step, dispatching to the matching function.
    pub fn route(step: Step, state: &AgentState) -> Route {
        match step {
            Step::Intake => Self::route_after_intake(state),
            Step::Precheck => Self::route_after_precheck(state),
            Step::ApprovalGate => Self::route_after_approval(state),
            Step::Worker => Self::route_after_worker(state),
            Step::Assistant => Self::route_after_assistant(state),
            Step::Consultant => Self::route_after_consultant(state),
            Step::InfoCenter => Self::route_after_info_center(state),
            Step::ErrorHandler => Self::route_after_error(state),
            Step::Finalizer => Route::Complete,
        }
    }

    fn route_after_pod(state: &AgentState) -> Route {
        if Self::has_failed(state) {
            return Route::Error;
        }
        Self::next_pod(state)
    }

    fn has_failed(state: &AgentState) -> bool {
        state.status == TaskStatus::Failed || state.has_unresolved_errors()
    }

    fn next_pod(state: &AgentState) -> Route {
        match state.current() {
            Some(node) if node.status == TaskStatus::Pending => Route::To(node.pod()),
            _ => Route::Complete,
        }
    }
}
