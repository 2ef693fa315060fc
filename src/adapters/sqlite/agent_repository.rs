//! SQLite implementation of the AgentRepository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentStatus};
use crate::domain::ports::AgentRepository;

#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn create(&self, agent: &Agent) -> DomainResult<()> {
        let capabilities_json = serde_json::to_string(&agent.capabilities)?;
        sqlx::query(
            r#"INSERT INTO agents (id, repo_id, name, type, status, capabilities, last_heartbeat_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(agent.id.to_string())
        .bind(agent.repo_id.map(|id| id.to_string()))
        .bind(&agent.name)
        .bind(&agent.r#type)
        .bind(agent.status.as_str())
        .bind(&capabilities_json)
        .bind(agent.last_heartbeat_at.map(|t| t.to_rfc3339()))
        .bind(agent.created_at.to_rfc3339())
        .bind(agent.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, agent: &Agent) -> DomainResult<()> {
        let capabilities_json = serde_json::to_string(&agent.capabilities)?;
        sqlx::query(
            r#"UPDATE agents SET repo_id = ?, name = ?, type = ?, status = ?, capabilities = ?,
               last_heartbeat_at = ?, updated_at = ? WHERE id = ?"#,
        )
        .bind(agent.repo_id.map(|id| id.to_string()))
        .bind(&agent.name)
        .bind(&agent.r#type)
        .bind(agent.status.as_str())
        .bind(&capabilities_json)
        .bind(agent.last_heartbeat_at.map(|t| t.to_rfc3339()))
        .bind(agent.updated_at.to_rfc3339())
        .bind(agent.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_name(&self, name: &str, repo_id: Option<Uuid>) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = match repo_id {
            Some(repo_id) => {
                sqlx::query_as("SELECT * FROM agents WHERE name = ? AND repo_id = ? ORDER BY created_at DESC LIMIT 1")
                    .bind(name)
                    .bind(repo_id.to_string())
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM agents WHERE name = ? AND repo_id IS NULL ORDER BY created_at DESC LIMIT 1")
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, repo_id: Option<Uuid>) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = match repo_id {
            Some(repo_id) => {
                sqlx::query_as("SELECT * FROM agents WHERE repo_id = ? ORDER BY created_at DESC")
                    .bind(repo_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM agents ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_active_workers(&self, min_heartbeat: DateTime<Utc>) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as(
            r#"SELECT * FROM agents
               WHERE status = 'active' AND type != 'orchestrator' AND last_heartbeat_at >= ?
               ORDER BY last_heartbeat_at DESC"#,
        )
        .bind(min_heartbeat.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    repo_id: Option<String>,
    name: String,
    r#type: String,
    status: String,
    capabilities: Option<String>,
    last_heartbeat_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AgentRow> for Agent {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        let status = AgentStatus::parse_str(&row.status)
            .ok_or_else(|| crate::domain::errors::DomainError::Validation(format!("invalid agent status: {}", row.status)))?;
        let capabilities: HashMap<String, serde_json::Value> = super::parse_json_or_default(row.capabilities)?;
        Ok(Agent {
            id: super::parse_uuid(&row.id)?,
            repo_id: super::parse_optional_uuid(row.repo_id)?,
            name: row.name,
            r#type: row.r#type,
            status,
            capabilities,
            last_heartbeat_at: super::parse_optional_datetime(row.last_heartbeat_at)?,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup() -> SqliteAgentRepository {
        SqliteAgentRepository::new(create_migrated_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn create_and_get() {
        let repo = setup().await;
        let agent = Agent::new("worker-1", "worker", None);
        repo.create(&agent).await.unwrap();

        let fetched = repo.get(agent.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "worker-1");
        assert_eq!(fetched.status, AgentStatus::Active);
    }

    #[tokio::test]
    async fn find_by_name_scoped_to_repo() {
        let repo = setup().await;
        let agent = Agent::new("worker-1", "worker", None);
        repo.create(&agent).await.unwrap();

        let found = repo.find_by_name("worker-1", None).await.unwrap();
        assert!(found.is_some());
        assert!(repo.find_by_name("worker-1", Some(Uuid::new_v4())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_active_workers_excludes_orchestrator_and_stale_heartbeats() {
        let repo = setup().await;
        let mut worker = Agent::new("worker-1", "worker", None);
        worker.touch_heartbeat(AgentStatus::Active);
        repo.create(&worker).await.unwrap();

        let orchestrator = Agent::new("orchestrator", crate::domain::models::agent::ORCHESTRATOR_AGENT_TYPE, None);
        repo.create(&orchestrator).await.unwrap();

        let active = repo.list_active_workers(Utc::now() - chrono::Duration::seconds(60)).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, worker.id);
    }
}
