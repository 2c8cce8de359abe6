//! SQLite implementation of the ApprovalStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::models::{ApprovalDecision, ApprovalRequest, ApprovalStatus, RunLevel};
use crate::domain::ports::{ApprovalStore, DatabaseError};

const COLUMNS: &str = "request_id, task_id, goal, owner, runlevel, fingerprint, status, \
                       requested_at, decided_at, decided_by, note";

#[derive(Clone)]
pub struct SqliteApprovalRepository {
    pool: SqlitePool,
}

impl SqliteApprovalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ApprovalRow {
    request_id: String,
    task_id: String,
    goal: String,
    owner: String,
    runlevel: String,
    fingerprint: String,
    status: String,
    requested_at: String,
    decided_at: Option<String>,
    decided_by: Option<String>,
    note: Option<String>,
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

impl TryFrom<ApprovalRow> for ApprovalRequest {
    type Error = DatabaseError;

    fn try_from(row: ApprovalRow) -> Result<Self, Self::Error> {
        let runlevel = RunLevel::from_str(&row.runlevel).ok_or_else(|| DatabaseError::InvalidValue {
            column: "runlevel".to_string(),
            value: row.runlevel.clone(),
        })?;
        let status = ApprovalStatus::from_str(&row.status).ok_or_else(|| DatabaseError::InvalidValue {
            column: "status".to_string(),
            value: row.status.clone(),
        })?;

        Ok(Self {
            request_id: row.request_id,
            task_id: row.task_id,
            goal: row.goal,
            owner: row.owner,
            runlevel,
            fingerprint: row.fingerprint,
            status,
            requested_at: parse_timestamp(&row.requested_at)?,
            decided_at: row.decided_at.as_deref().map(parse_timestamp).transpose()?,
            decided_by: row.decided_by,
            note: row.note,
        })
    }
}

#[async_trait]
impl ApprovalStore for SqliteApprovalRepository {
    async fn record_request(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalRequest, DatabaseError> {
        sqlx::query(
            "INSERT INTO approvals
                 (request_id, task_id, goal, owner, runlevel, fingerprint, status, requested_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(task_id) DO UPDATE SET
                 request_id = excluded.request_id,
                 goal = excluded.goal,
                 owner = excluded.owner,
                 runlevel = excluded.runlevel,
                 fingerprint = excluded.fingerprint,
                 status = excluded.status,
                 requested_at = excluded.requested_at,
                 decided_at = NULL,
                 decided_by = NULL,
                 note = NULL
             WHERE approvals.fingerprint != excluded.fingerprint",
        )
        .bind(&request.request_id)
        .bind(&request.task_id)
        .bind(&request.goal)
        .bind(&request.owner)
        .bind(request.runlevel.as_str())
        .bind(&request.fingerprint)
        .bind(request.status.as_str())
        .bind(request.requested_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get(&request.task_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("approval for task {}", request.task_id)))
    }

    async fn get(&self, task_id: &str) -> Result<Option<ApprovalRequest>, DatabaseError> {
        let row: Option<ApprovalRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM approvals WHERE task_id = ?"))
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(ApprovalRequest::try_from).transpose()
    }

    async fn decision(&self, task_id: &str) -> Result<Option<ApprovalDecision>, DatabaseError> {
        Ok(self.get(task_id).await?.and_then(|request| match request.status {
            ApprovalStatus::Pending => None,
            status => Some(ApprovalDecision {
                approved: status == ApprovalStatus::Approved,
                decided_by: request.decided_by.unwrap_or_default(),
                note: request.note,
            }),
        }))
    }

    async fn decide(
        &self,
        task_id: &str,
        decision: ApprovalDecision,
    ) -> Result<ApprovalRequest, DatabaseError> {
        let mut request = self
            .get(task_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("approval for task {task_id}")))?;
        request.apply(&decision);

        sqlx::query(
            "UPDATE approvals SET status = ?, decided_at = ?, decided_by = ?, note = ? WHERE task_id = ?",
        )
        .bind(request.status.as_str())
        .bind(request.decided_at.map(|t| t.to_rfc3339()))
        .bind(&request.decided_by)
        .bind(&request.note)
        .bind(task_id)
        .execute(&self.pool)
        .await?;

        Ok(request)
    }

    async fn pending(&self) -> Result<Vec<ApprovalRequest>, DatabaseError> {
        let rows: Vec<ApprovalRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM approvals WHERE status = 'pending' ORDER BY requested_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ApprovalRequest::try_from).collect()
    }
}
