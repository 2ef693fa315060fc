//! SQLite implementation of the TaskRepository, including TaskClaim storage.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ClaimState, Task, TaskClaim, TaskStatus};
use crate::domain::ports::{TaskFilter, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        let scope_json = serde_json::to_string(&task.scope)?;
        sqlx::query(
            r#"INSERT INTO tasks (id, repo_id, goal, description, scope, priority, status,
               acceptance_criteria, assignee_agent_id, blocked_reason, progress, summary, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(task.repo_id.map(|id| id.to_string()))
        .bind(&task.goal)
        .bind(&task.description)
        .bind(&scope_json)
        .bind(task.priority)
        .bind(task.status.as_str())
        .bind(&task.acceptance_criteria)
        .bind(task.assignee_agent_id.map(|id| id.to_string()))
        .bind(&task.blocked_reason)
        .bind(task.progress)
        .bind(&task.summary)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let scope_json = serde_json::to_string(&task.scope)?;
        let result = sqlx::query(
            r#"UPDATE tasks SET repo_id = ?, goal = ?, description = ?, scope = ?, priority = ?,
               status = ?, acceptance_criteria = ?, assignee_agent_id = ?, blocked_reason = ?,
               progress = ?, summary = ?, updated_at = ? WHERE id = ?"#,
        )
        .bind(task.repo_id.map(|id| id.to_string()))
        .bind(&task.goal)
        .bind(&task.description)
        .bind(&scope_json)
        .bind(task.priority)
        .bind(task.status.as_str())
        .bind(&task.acceptance_criteria)
        .bind(task.assignee_agent_id.map(|id| id.to_string()))
        .bind(&task.blocked_reason)
        .bind(task.progress)
        .bind(&task.summary)
        .bind(task.updated_at.to_rfc3339())
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("task {} not found", task.id)));
        }
        Ok(())
    }

    async fn list(&self, filter: &TaskFilter) -> DomainResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(assignee_agent_id) = filter.assignee_agent_id {
            query.push_str(" AND assignee_agent_id = ?");
            bindings.push(assignee_agent_id.to_string());
        }
        if let Some(ref component) = filter.scope_component {
            query.push_str(" AND json_extract(scope, '$.component') = ?");
            bindings.push(component.clone());
        }
        query.push_str(" ORDER BY created_at DESC");

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }
        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_assignable(&self, limit: i64) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"SELECT * FROM tasks WHERE status IN ('pending', 'stalled')
               ORDER BY priority DESC, created_at ASC LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_for_agent_active(&self, agent_id: Uuid, task_id: Option<Uuid>, limit: i64) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = match task_id {
            Some(task_id) => {
                sqlx::query_as(
                    r#"SELECT * FROM tasks WHERE assignee_agent_id = ? AND status IN ('claimed', 'in_progress') AND id = ?
                       ORDER BY priority DESC, created_at ASC LIMIT ?"#,
                )
                .bind(agent_id.to_string())
                .bind(task_id.to_string())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"SELECT * FROM tasks WHERE assignee_agent_id = ? AND status IN ('claimed', 'in_progress')
                       ORDER BY priority DESC, created_at ASC LIMIT ?"#,
                )
                .bind(agent_id.to_string())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_completed(&self, limit: i64) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM tasks WHERE status = 'completed' ORDER BY updated_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_claim(&self, claim: &TaskClaim) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO task_claims (id, task_id, agent_id, resource_key, lease_ttl_seconds, state, claimed_at, expires_at, released_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(claim.id.to_string())
        .bind(claim.task_id.to_string())
        .bind(claim.agent_id.to_string())
        .bind(&claim.resource_key)
        .bind(claim.lease_ttl_seconds)
        .bind(claim.state.as_str())
        .bind(claim.claimed_at.to_rfc3339())
        .bind(claim.expires_at.to_rfc3339())
        .bind(claim.released_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_claim(&self, claim: &TaskClaim) -> DomainResult<()> {
        sqlx::query(
            "UPDATE task_claims SET state = ?, expires_at = ?, released_at = ? WHERE id = ?",
        )
        .bind(claim.state.as_str())
        .bind(claim.expires_at.to_rfc3339())
        .bind(claim.released_at.map(|t| t.to_rfc3339()))
        .bind(claim.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_claim_for_task(&self, task_id: Uuid, now: DateTime<Utc>) -> DomainResult<Option<TaskClaim>> {
        let row: Option<ClaimRow> = sqlx::query_as(
            r#"SELECT * FROM task_claims WHERE task_id = ? AND state = 'active' AND expires_at >= ?
               ORDER BY claimed_at DESC LIMIT 1"#,
        )
        .bind(task_id.to_string())
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn stale_active_claims(&self, task_id: Option<Uuid>, now: DateTime<Utc>) -> DomainResult<Vec<TaskClaim>> {
        let rows: Vec<ClaimRow> = match task_id {
            Some(task_id) => {
                sqlx::query_as(
                    "SELECT * FROM task_claims WHERE task_id = ? AND state = 'active' AND expires_at < ?",
                )
                .bind(task_id.to_string())
                .bind(now.to_rfc3339())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM task_claims WHERE state = 'active' AND expires_at < ?")
                    .bind(now.to_rfc3339())
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn active_claims_for_task_agent(&self, task_id: Uuid, agent_id: Uuid, now: DateTime<Utc>) -> DomainResult<Vec<TaskClaim>> {
        let rows: Vec<ClaimRow> = sqlx::query_as(
            "SELECT * FROM task_claims WHERE task_id = ? AND agent_id = ? AND state = 'active' AND expires_at >= ?",
        )
        .bind(task_id.to_string())
        .bind(agent_id.to_string())
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    repo_id: Option<String>,
    goal: String,
    description: String,
    scope: Option<String>,
    priority: i32,
    status: String,
    acceptance_criteria: Option<String>,
    assignee_agent_id: Option<String>,
    blocked_reason: Option<String>,
    progress: i32,
    summary: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::parse_str(&row.status)
            .ok_or_else(|| DomainError::Validation(format!("invalid task status: {}", row.status)))?;
        let scope: HashMap<String, serde_json::Value> = super::parse_json_or_default(row.scope)?;
        Ok(Task {
            id: super::parse_uuid(&row.id)?,
            repo_id: super::parse_optional_uuid(row.repo_id)?,
            goal: row.goal,
            description: row.description,
            scope,
            priority: row.priority,
            status,
            acceptance_criteria: row.acceptance_criteria,
            assignee_agent_id: super::parse_optional_uuid(row.assignee_agent_id)?,
            blocked_reason: row.blocked_reason,
            progress: row.progress,
            summary: row.summary,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ClaimRow {
    id: String,
    task_id: String,
    agent_id: String,
    resource_key: String,
    lease_ttl_seconds: i64,
    state: String,
    claimed_at: String,
    expires_at: String,
    released_at: Option<String>,
}

impl TryFrom<ClaimRow> for TaskClaim {
    type Error = DomainError;

    fn try_from(row: ClaimRow) -> Result<Self, Self::Error> {
        let state = ClaimState::parse_str(&row.state)
            .ok_or_else(|| DomainError::Validation(format!("invalid claim state: {}", row.state)))?;
        Ok(TaskClaim {
            id: super::parse_uuid(&row.id)?,
            task_id: super::parse_uuid(&row.task_id)?,
            agent_id: super::parse_uuid(&row.agent_id)?,
            resource_key: row.resource_key,
            lease_ttl_seconds: row.lease_ttl_seconds,
            state,
            claimed_at: super::parse_datetime(&row.claimed_at)?,
            expires_at: super::parse_datetime(&row.expires_at)?,
            released_at: super::parse_optional_datetime(row.released_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use std::collections::HashMap as Map;

    async fn setup() -> SqliteTaskRepository {
        SqliteTaskRepository::new(create_migrated_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn create_and_get() {
        let repo = setup().await;
        let task = Task::new("ship it", "desc", Map::new(), 3, None);
        repo.create(&task).await.unwrap();

        let fetched = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.goal, "ship it");
        assert_eq!(fetched.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn update_missing_task_is_not_found() {
        let repo = setup().await;
        let task = Task::new("ghost", "", Map::new(), 3, None);
        let err = repo.update(&task).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn list_assignable_orders_by_priority_then_age() {
        let repo = setup().await;
        let low = Task::new("low", "", Map::new(), 1, None);
        let high = Task::new("high", "", Map::new(), 9, None);
        repo.create(&low).await.unwrap();
        repo.create(&high).await.unwrap();

        let assignable = repo.list_assignable(10).await.unwrap();
        assert_eq!(assignable[0].goal, "high");
    }

    #[tokio::test]
    async fn claim_lifecycle() {
        let repo = setup().await;
        let task = Task::new("claim me", "", Map::new(), 3, None);
        repo.create(&task).await.unwrap();

        let agent_id = Uuid::new_v4();
        let claim = TaskClaim::new(task.id, agent_id, format!("task:{}", task.id), 60);
        repo.create_claim(&claim).await.unwrap();

        let active = repo.active_claim_for_task(task.id, Utc::now()).await.unwrap();
        assert!(active.is_some());

        let stale = repo.stale_active_claims(Some(task.id), Utc::now() + chrono::Duration::seconds(61)).await.unwrap();
        assert_eq!(stale.len(), 1);
    }
}
