//! SQLite implementation of the SessionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentSession, SessionStatus};
use crate::domain::ports::SessionRepository;

#[derive(Clone)]
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, session: &AgentSession) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO agent_sessions (id, agent_id, status, current_task_id, last_heartbeat_at, expires_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session.id.to_string())
        .bind(session.agent_id.to_string())
        .bind(session.status.as_str())
        .bind(session.current_task_id.map(|id| id.to_string()))
        .bind(session.last_heartbeat_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, session: &AgentSession) -> DomainResult<()> {
        sqlx::query(
            r#"UPDATE agent_sessions SET status = ?, current_task_id = ?, last_heartbeat_at = ?, expires_at = ?
               WHERE id = ?"#,
        )
        .bind(session.status.as_str())
        .bind(session.current_task_id.map(|id| id.to_string()))
        .bind(session.last_heartbeat_at.to_rfc3339())
        .bind(session.expires_at.to_rfc3339())
        .bind(session.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_for_agent(&self, agent_id: Uuid, now: DateTime<Utc>) -> DomainResult<Option<AgentSession>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"SELECT * FROM agent_sessions WHERE agent_id = ? AND status = 'active' AND expires_at >= ?
               ORDER BY expires_at DESC LIMIT 1"#,
        )
        .bind(agent_id.to_string())
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn stale_active_sessions(&self, now: DateTime<Utc>) -> DomainResult<Vec<AgentSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM agent_sessions WHERE status = 'active' AND expires_at < ?",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn has_active_session(&self, agent_id: Uuid, now: DateTime<Utc>) -> DomainResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM agent_sessions WHERE agent_id = ? AND status = 'active' AND expires_at >= ? LIMIT 1",
        )
        .bind(agent_id.to_string())
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    agent_id: String,
    status: String,
    current_task_id: Option<String>,
    last_heartbeat_at: String,
    expires_at: String,
}

impl TryFrom<SessionRow> for AgentSession {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = SessionStatus::parse_str(&row.status)
            .ok_or_else(|| crate::domain::errors::DomainError::Validation(format!("invalid session status: {}", row.status)))?;
        Ok(AgentSession {
            id: super::parse_uuid(&row.id)?,
            agent_id: super::parse_uuid(&row.agent_id)?,
            status,
            current_task_id: super::parse_optional_uuid(row.current_task_id)?,
            last_heartbeat_at: super::parse_datetime(&row.last_heartbeat_at)?,
            expires_at: super::parse_datetime(&row.expires_at)?,
        })
    }
}
