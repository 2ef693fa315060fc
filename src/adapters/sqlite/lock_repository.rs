//! SQLite implementation of the LockRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{LockState, ResourceLock};
use crate::domain::ports::LockRepository;

#[derive(Clone)]
pub struct SqliteLockRepository {
    pool: SqlitePool,
}

impl SqliteLockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockRepository for SqliteLockRepository {
    async fn create(&self, lock: &ResourceLock) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO resource_locks (id, resource_key, owner_agent_id, state, created_at, expires_at, released_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(lock.id.to_string())
        .bind(&lock.resource_key)
        .bind(lock.owner_agent_id.to_string())
        .bind(lock.state.as_str())
        .bind(lock.created_at.to_rfc3339())
        .bind(lock.expires_at.to_rfc3339())
        .bind(lock.released_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, lock: &ResourceLock) -> DomainResult<()> {
        sqlx::query(
            "UPDATE resource_locks SET state = ?, expires_at = ?, released_at = ? WHERE id = ?",
        )
        .bind(lock.state.as_str())
        .bind(lock.expires_at.to_rfc3339())
        .bind(lock.released_at.map(|t| t.to_rfc3339()))
        .bind(lock.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn active_for_key(&self, resource_key: &str, now: DateTime<Utc>) -> DomainResult<Option<ResourceLock>> {
        let row: Option<LockRow> = sqlx::query_as(
            r#"SELECT * FROM resource_locks WHERE resource_key = ? AND state = 'active' AND expires_at >= ?
               ORDER BY expires_at DESC LIMIT 1"#,
        )
        .bind(resource_key)
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn stale_active_locks(&self, now: DateTime<Utc>) -> DomainResult<Vec<ResourceLock>> {
        let rows: Vec<LockRow> = sqlx::query_as(
            "SELECT * FROM resource_locks WHERE state = 'active' AND expires_at < ?",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_for_owner(&self, owner_agent_id: Uuid) -> DomainResult<Vec<ResourceLock>> {
        let rows: Vec<LockRow> = sqlx::query_as(
            "SELECT * FROM resource_locks WHERE owner_agent_id = ? ORDER BY created_at DESC",
        )
        .bind(owner_agent_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct LockRow {
    id: String,
    resource_key: String,
    owner_agent_id: String,
    state: String,
    created_at: String,
    expires_at: String,
    released_at: Option<String>,
}

impl TryFrom<LockRow> for ResourceLock {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: LockRow) -> Result<Self, Self::Error> {
        let state = LockState::parse_str(&row.state)
            .ok_or_else(|| crate::domain::errors::DomainError::Validation(format!("invalid lock state: {}", row.state)))?;
        Ok(ResourceLock {
            id: super::parse_uuid(&row.id)?,
            resource_key: row.resource_key,
            owner_agent_id: super::parse_uuid(&row.owner_agent_id)?,
            state,
            created_at: super::parse_datetime(&row.created_at)?,
            expires_at: super::parse_datetime(&row.expires_at)?,
            released_at: super::parse_optional_datetime(row.released_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup() -> SqliteLockRepository {
        SqliteLockRepository::new(create_migrated_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn create_and_find_active() {
        let repo = setup().await;
        let lock = ResourceLock::new("file:a.rs", Uuid::new_v4(), 60);
        repo.create(&lock).await.unwrap();

        let found = repo.active_for_key("file:a.rs", Utc::now()).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn released_lock_is_not_active() {
        let repo = setup().await;
        let mut lock = ResourceLock::new("file:a.rs", Uuid::new_v4(), 60);
        repo.create(&lock).await.unwrap();
        lock.release(Utc::now());
        repo.update(&lock).await.unwrap();

        assert!(repo.active_for_key("file:a.rs", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_active_locks_finds_expired() {
        let repo = setup().await;
        let lock = ResourceLock::new("file:a.rs", Uuid::new_v4(), 0);
        repo.create(&lock).await.unwrap();

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(repo.stale_active_locks(later).await.unwrap().len(), 1);
    }
}
