//! Safety guard evaluation.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Guard, Quantity, Shift, TaskNode, TimeWindow};
use crate::domain::ports::{Clock, InterlockMonitor};

/// Result of checking one guard.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardVerdict {
    Pass,
    Fail(String),
    /// Guard text not understood; treated as passing.
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardCheck {
    pub raw: String,
    pub guard: Guard,
    pub verdict: GuardVerdict,
}

impl GuardCheck {
    pub fn failed(&self) -> bool {
        matches!(self.verdict, GuardVerdict::Fail(_))
    }
}

/// Evaluates node guards against the injected clock and interlock monitor.
#[derive(Clone)]
pub struct GuardEvaluator {
    clock: Arc<dyn Clock>,
    interlocks: Arc<dyn InterlockMonitor>,
    night_ops: TimeWindow,
}

impl GuardEvaluator {
    pub const DEFAULT_NIGHT_OPS: TimeWindow = TimeWindow::new(21, 7);

    pub fn new(
        clock: Arc<dyn Clock>,
        interlocks: Arc<dyn InterlockMonitor>,
        night_ops: TimeWindow,
    ) -> Self {
        Self {
            clock,
            interlocks,
            night_ops,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Check every guard on the node, in order.
    pub async fn evaluate(&self, node: &TaskNode) -> DomainResult<Vec<GuardCheck>> {
        let mut checks = Vec::with_capacity(node.guards.len());
        for raw in &node.guards {
            let guard = Guard::parse(raw);
            let verdict = self.check(&guard, node).await?;
            debug!(node_id = %node.node_id, guard = %raw, ?verdict, "guard evaluated");
            checks.push(GuardCheck {
                raw: raw.clone(),
                guard,
                verdict,
            });
        }
        Ok(checks)
    }

    async fn check(&self, guard: &Guard, node: &TaskNode) -> DomainResult<GuardVerdict> {
        let verdict = match guard {
            Guard::TimeWindow(shift) => {
                let window = match shift {
                    Shift::NightOps => self.night_ops,
                    Shift::Explicit(window) => *window,
                };
                let hour = self.clock.hour();
                if window.contains_hour(hour) {
                    GuardVerdict::Pass
                } else {
                    GuardVerdict::Fail(format!("current hour {hour:02}:00 is outside {window}"))
                }
            }
            Guard::Interlock(name) => {
                if self.interlocks.is_ok(name).await? {
                    GuardVerdict::Pass
                } else {
                    GuardVerdict::Fail(format!("interlock {name} not OK"))
                }
            }
            Guard::Capability { name, limit } => match exceeding_param(node, limit) {
                Some((key, found)) => GuardVerdict::Fail(format!(
                    "{name} limit {limit} exceeded by {key} = {found}"
                )),
                None => GuardVerdict::Pass,
            },
            Guard::Unrecognized(_) => GuardVerdict::Unrecognized,
        };
        Ok(verdict)
    }
}

/// First param carrying a quantity in the limit's dimension whose magnitude
/// is above the limit. Quantities in unrelated units are ignored.
fn exceeding_param(node: &TaskNode, limit: &Quantity) -> Option<(String, Quantity)> {
    node.params.iter().find_map(|(key, value)| {
        let Value::String(text) = value else {
            return None;
        };
        Quantity::scan(text)
            .into_iter()
            .find(|q| {
                q.value_in(limit)
                    .is_some_and(|value| value.abs() > limit.value.abs())
            })
            .map(|q| (key.clone(), q))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{FixedClock, StaticInterlockMonitor};
    use serde_json::json;

    fn evaluator(hour: u32, tripped: &[&str]) -> GuardEvaluator {
        GuardEvaluator::new(
            Arc::new(FixedClock::at_hour(hour)),
            Arc::new(StaticInterlockMonitor::new(tripped.iter().copied())),
            GuardEvaluator::DEFAULT_NIGHT_OPS,
        )
    }

    fn cooldown_node() -> TaskNode {
        TaskNode::new("cooldown_setup", "worker.cooldown")
            .with_guards(["interlock.cryostat_ok", "shift=night_ops"])
    }

    #[tokio::test]
    async fn test_night_shift_passes_at_night() {
        let checks = evaluator(23, &[]).evaluate(&cooldown_node()).await.unwrap();
        assert_eq!(checks.len(), 2);
        assert!(checks.iter().all(|c| c.verdict == GuardVerdict::Pass));
    }

    #[tokio::test]
    async fn test_night_shift_fails_at_noon() {
        let checks = evaluator(12, &[]).evaluate(&cooldown_node()).await.unwrap();
        assert!(!checks[0].failed());
        assert!(checks[1].failed());
    }

    #[tokio::test]
    async fn test_tripped_interlock_fails() {
        let checks = evaluator(2, &["cryostat_ok"]).evaluate(&cooldown_node()).await.unwrap();
        assert_eq!(
            checks[0].verdict,
            GuardVerdict::Fail("interlock cryostat_ok not OK".to_string())
        );
    }

    #[tokio::test]
    async fn test_capability_limit() {
        let within = TaskNode::new("m", "worker.sweep")
            .with_params(json!({"range": "-40 mV..40 mV", "type": "auto_detect"}))
            .with_guards(["capability: DAC ≤ 50 mV"]);
        let checks = evaluator(12, &[]).evaluate(&within).await.unwrap();
        assert_eq!(checks[0].verdict, GuardVerdict::Pass);

        let beyond = within.clone().with_params(json!({"range": "-80 mV..80 mV"}));
        let checks = evaluator(12, &[]).evaluate(&beyond).await.unwrap();
        assert!(checks[0].failed());

        let unrelated = within.with_params(json!({"temperature": "800 mK"}));
        let checks = evaluator(12, &[]).evaluate(&unrelated).await.unwrap();
        assert_eq!(checks[0].verdict, GuardVerdict::Pass);
    }

    #[tokio::test]
    async fn test_capability_symmetric_range() {
        let node = TaskNode::new("m", "worker.sweep")
            .with_params(json!({"range": "±100 mV"}))
            .with_guards(["capability: DAC ≤ 50 mV"]);
        let checks = evaluator(12, &[]).evaluate(&node).await.unwrap();
        assert!(checks[0].failed(), "±100 mV must exceed 50 mV: {:?}", checks[0].verdict);

        let node = node.with_params(json!({"range": "±10 mV"}));
        let checks = evaluator(12, &[]).evaluate(&node).await.unwrap();
        assert_eq!(checks[0].verdict, GuardVerdict::Pass);

        let node = node.with_params(json!({"range": "+/- 60 mV"}));
        let checks = evaluator(12, &[]).evaluate(&node).await.unwrap();
        assert!(checks[0].failed());
    }

    #[tokio::test]
    async fn test_capability_converts_units() {
        let node = TaskNode::new("m", "worker.sweep")
            .with_params(json!({"range": "0.08 V"}))
            .with_guards(["capability: DAC ≤ 50 mV"]);
        let checks = evaluator(12, &[]).evaluate(&node).await.unwrap();
        assert!(checks[0].failed());

        let node = node.with_params(json!({"range": "-0.04 V..0.04 V"}));
        let checks = evaluator(12, &[]).evaluate(&node).await.unwrap();
        assert_eq!(checks[0].verdict, GuardVerdict::Pass);

        let node = TaskNode::new("c", "worker.cooldown")
            .with_params(json!({"target_temperature": "1.5 K"}))
            .with_guards(["capability: fridge ≤ 900 mK"]);
        let checks = evaluator(12, &[]).evaluate(&node).await.unwrap();
        assert!(checks[0].failed());
    }

    #[tokio::test]
    async fn test_unrecognized_guard_passes() {
        let node = TaskNode::new("x", "worker.generic").with_guards(["operator_present"]);
        let checks = evaluator(12, &[]).evaluate(&node).await.unwrap();
        assert_eq!(checks[0].verdict, GuardVerdict::Unrecognized);
        assert!(!checks[0].failed());
    }
}
