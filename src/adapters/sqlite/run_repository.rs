//! SQLite implementation of the WorkflowRunRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::models::{TaskSpec, WorkflowResult};
use crate::domain::ports::{DatabaseError, WorkflowRun, WorkflowRunRepository};

#[derive(Clone)]
pub struct SqliteWorkflowRunRepository {
    pool: SqlitePool,
}

impl SqliteWorkflowRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    task_spec: String,
    result: String,
}

impl TryFrom<RunRow> for WorkflowRun {
    type Error = DatabaseError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(Self {
            task_spec: serde_json::from_str(&row.task_spec)?,
            result: serde_json::from_str(&row.result)?,
        })
    }
}

#[async_trait]
impl WorkflowRunRepository for SqliteWorkflowRunRepository {
    async fn save(&self, spec: &TaskSpec, result: &WorkflowResult) -> Result<(), DatabaseError> {
        let spec_json = serde_json::to_string(spec)?;
        let result_json = serde_json::to_string(result)?;

        sqlx::query(
            "INSERT INTO workflow_runs (task_id, goal, owner, runlevel, status, task_spec, result, execution_time, finished_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(task_id) DO UPDATE SET
                status = excluded.status,
                task_spec = excluded.task_spec,
                result = excluded.result,
                execution_time = excluded.execution_time,
                finished_at = excluded.finished_at",
        )
        .bind(&result.task_id)
        .bind(&spec.goal)
        .bind(&spec.owner)
        .bind(spec.runlevel.as_str())
        .bind(result.status.as_str())
        .bind(&spec_json)
        .bind(&result_json)
        .bind(result.execution_time)
        .bind(result.finished_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<WorkflowRun>, DatabaseError> {
        let row: Option<RunRow> =
            sqlx::query_as("SELECT task_spec, result FROM workflow_runs WHERE task_id = ?")
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(WorkflowRun::try_from).transpose()
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<WorkflowRun>, DatabaseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<RunRow> = sqlx::query_as(
            "SELECT task_spec, result FROM workflow_runs ORDER BY finished_at DESC, task_id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WorkflowRun::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{RunLevel, TaskStatus};
    use chrono::{Duration, Utc};
    use serde_json::Map;
    use std::collections::BTreeMap;

    fn result(task_id: &str, status: TaskStatus, minutes_ago: i64) -> WorkflowResult {
        WorkflowResult {
            task_id: task_id.to_string(),
            status,
            artifacts: BTreeMap::from([(format!("brief_{task_id}"), "# Task Brief".to_string())]),
            execution_time: 1.5,
            nodes_executed: vec!["intake".to_string(), "finalizer".to_string()],
            errors: vec![],
            metrics: Map::new(),
            pending_approvals: vec![],
            summary: format!("Task {task_id}: {status}"),
            finished_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    async fn repo() -> SqliteWorkflowRunRepository {
        SqliteWorkflowRunRepository::new(create_migrated_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let repo = repo().await;
        let spec = TaskSpec::new("tg_1", "Cooldown D14", "alice").with_runlevel(RunLevel::Sim);
        let saved = result("tg_1", TaskStatus::Completed, 0);
        repo.save(&spec, &saved).await.unwrap();

        let run = repo.get("tg_1").await.unwrap().unwrap();
        assert_eq!(run.task_spec, spec);
        assert_eq!(run.result, saved);
        assert!(repo.get("tg_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_run() {
        let repo = repo().await;
        let spec = TaskSpec::new("tg_1", "Sweep", "alice").with_runlevel(RunLevel::Live);
        repo.save(&spec, &result("tg_1", TaskStatus::Cancelled, 5)).await.unwrap();
        repo.save(&spec, &result("tg_1", TaskStatus::Completed, 0)).await.unwrap();

        let runs = repo.list_recent(10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].result.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let repo = repo().await;
        for (id, age) in [("a", 30), ("b", 10), ("c", 20)] {
            let spec = TaskSpec::new(id, "goal", "alice");
            repo.save(&spec, &result(id, TaskStatus::Completed, age)).await.unwrap();
        }
        let ids: Vec<String> = repo
            .list_recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.result.task_id)
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
