//! Common test utilities for integration tests
//!
//! Provides planner fixtures wired to in-memory adapters and a fixed clock.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use lab_agent::adapters::llm::MockLlmPlanner;
use lab_agent::adapters::mcp::MockMcpClient;
use lab_agent::adapters::memory::InMemoryApprovalStore;
use lab_agent::domain::ports::{
    ApprovalStore, DisabledLlmPlanner, FixedClock, LlmPlanner, McpClient, StaticInterlockMonitor,
};
use lab_agent::{PlannerDependencies, PlannerSettings, TaskGraphPlanner};

/// Goal that decomposes into the cooldown, measurement and brief plan.
pub const D14_GOAL: &str = "Cooldown device D14, then 2D gate map at 20 mK";

/// Planner settings with no simulated instrument delay.
pub fn fast_settings() -> PlannerSettings {
    PlannerSettings {
        simulated_delay: Duration::ZERO,
        ..PlannerSettings::default()
    }
}

/// Builder for planners under test.
pub struct PlannerFixture {
    pub llm: Arc<dyn LlmPlanner>,
    pub mcp: Arc<dyn McpClient>,
    pub approvals: Arc<InMemoryApprovalStore>,
    pub hour: u32,
    pub tripped: Vec<String>,
    pub settings: PlannerSettings,
}

impl PlannerFixture {
    /// LLM disabled, every tool simulated, 23:00 lab time.
    pub fn new() -> Self {
        Self {
            llm: Arc::new(DisabledLlmPlanner),
            mcp: Arc::new(MockMcpClient::new()),
            approvals: Arc::new(InMemoryApprovalStore::new()),
            hour: 23,
            tripped: Vec::new(),
            settings: fast_settings(),
        }
    }

    pub fn at_hour(mut self, hour: u32) -> Self {
        self.hour = hour;
        self
    }

    pub fn with_llm(mut self, llm: MockLlmPlanner) -> Self {
        self.llm = Arc::new(llm);
        self
    }

    pub fn with_mcp(mut self, mcp: Arc<dyn McpClient>) -> Self {
        self.mcp = mcp;
        self
    }

    pub fn with_tripped_interlock(mut self, name: &str) -> Self {
        self.tripped.push(name.to_string());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.settings.max_retries = max_retries;
        self
    }

    pub fn build(&self) -> TaskGraphPlanner {
        let approvals: Arc<dyn ApprovalStore> = self.approvals.clone();
        let deps = PlannerDependencies::new(self.llm.clone(), self.mcp.clone(), approvals)
            .with_clock(Arc::new(FixedClock::at_hour(self.hour)))
            .with_interlocks(Arc::new(StaticInterlockMonitor::new(self.tripped.iter().cloned())));
        TaskGraphPlanner::new(deps, self.settings.clone())
    }
}

impl Default for PlannerFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Setup test logging
///
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
