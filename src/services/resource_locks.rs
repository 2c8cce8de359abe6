//! Symbolic lock table shared by concurrent executions.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ResourceLock;

/// Exclusive locks keyed by resource id (an instrument server such as
/// `instrMCP`). Locks are re-entrant for the holding task.
#[derive(Debug, Default)]
pub struct ResourceLockTable {
    locks: Mutex<HashMap<String, ResourceLock>>,
}

impl ResourceLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `resource_id` for `task_id`.
    ///
    /// # Errors
    /// `DomainError::ResourceConflict` when another task holds an unexpired lock.
    pub async fn acquire(&self, resource_id: &str, task_id: &str) -> DomainResult<ResourceLock> {
        let mut locks = self.locks.lock().await;
        let now = Utc::now();

        if let Some(existing) = locks.get(resource_id) {
            if existing.locked_by == task_id {
                return Ok(existing.clone());
            }
            if !existing.is_expired(now) {
                return Err(DomainError::ResourceConflict {
                    resource: resource_id.to_string(),
                    holder: existing.locked_by.clone(),
                });
            }
            debug!(resource_id, holder = %existing.locked_by, "replacing expired lock");
        }

        let lock = ResourceLock::exclusive(resource_id, task_id);
        locks.insert(resource_id.to_string(), lock.clone());
        info!(resource_id, task_id, "resource locked");
        Ok(lock)
    }

    /// Release every lock held by `task_id`, returning the released ids.
    pub async fn release_all(&self, task_id: &str) -> Vec<String> {
        let mut locks = self.locks.lock().await;
        let mut released: Vec<String> = locks
            .iter()
            .filter(|(_, lock)| lock.locked_by == task_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &released {
            locks.remove(id);
        }
        released.sort();
        if !released.is_empty() {
            info!(task_id, resources = ?released, "resources released");
        }
        released
    }

    pub async fn holder(&self, resource_id: &str) -> Option<String> {
        self.locks
            .lock()
            .await
            .get(resource_id)
            .map(|lock| lock.locked_by.clone())
    }

    pub async fn snapshot(&self) -> Vec<ResourceLock> {
        self.locks.lock().await.values().cloned().collect()
    }
}
