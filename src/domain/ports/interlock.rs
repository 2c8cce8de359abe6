use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Port for reading hardware interlock state (e.g. `cryostat_ok`).
#[async_trait]
pub trait InterlockMonitor: Send + Sync {
    /// Whether the named interlock currently reports a safe state
    async fn is_ok(&self, name: &str) -> DomainResult<bool>;
}

/// Interlock monitor with a fixed set of tripped interlocks; every other
/// interlock reads as OK.
#[derive(Debug, Clone, Default)]
pub struct StaticInterlockMonitor {
    tripped: HashSet<String>,
}

impl StaticInterlockMonitor {
    pub fn new<I, S>(tripped: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tripped: tripped.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl InterlockMonitor for StaticInterlockMonitor {
    async fn is_ok(&self, name: &str) -> DomainResult<bool> {
        Ok(!self.tripped.contains(name))
    }
}
