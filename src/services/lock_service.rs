//! Lock Service: leased exclusive ownership of a string `resource_key`.
//!
//! Every operation sweeps expired locks before acting, so the
//! sweep-then-check-then-write pattern is the sole enforcement mechanism for
//! "at most one active lock per `resource_key`" across serialized calls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ResourceLock;
use crate::domain::ports::{Clock, LockRepository};

pub struct LockService<R: LockRepository> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: LockRepository> LockService<R> {
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Expire any active locks whose TTL has elapsed.
    async fn sweep(&self) -> DomainResult<()> {
        let now = self.clock.now();
        for mut lock in self.repository.stale_active_locks(now).await? {
            lock.expire();
            self.repository.update(&lock).await?;
            tracing::info!(resource_key = %lock.resource_key, lock_id = %lock.id, "lock expired by sweep");
        }
        Ok(())
    }

    pub async fn acquire(&self, resource_key: &str, agent_id: Uuid, ttl_seconds: i64) -> DomainResult<ResourceLock> {
        self.sweep().await?;
        let now = self.clock.now();

        if let Some(mut existing) = self.repository.active_for_key(resource_key, now).await? {
            if existing.owner_agent_id != agent_id {
                return Err(DomainError::Conflict(format!(
                    "resource_key {resource_key} is held by another agent"
                )));
            }
            existing.extend(now, ttl_seconds);
            self.repository.update(&existing).await?;
            tracing::info!(resource_key, agent_id = %agent_id, "lock extended");
            return Ok(existing);
        }

        let lock = ResourceLock::new(resource_key, agent_id, ttl_seconds);
        self.repository.create(&lock).await?;
        tracing::info!(resource_key, agent_id = %agent_id, lock_id = %lock.id, "lock acquired");
        Ok(lock)
    }

    pub async fn renew(&self, lock_id: Uuid, agent_id: Uuid, ttl_seconds: i64) -> DomainResult<ResourceLock> {
        self.sweep().await?;
        let now = self.clock.now();
        let owned = self
            .repository
            .list_for_owner(agent_id)
            .await?
            .into_iter()
            .find(|l| l.id == lock_id && l.is_active_at(now));

        let mut lock = match owned {
            Some(lock) => lock,
            None => return Err(DomainError::NotFound(format!("no active lock {lock_id} owned by {agent_id}"))),
        };
        lock.extend(now, ttl_seconds);
        self.repository.update(&lock).await?;
        Ok(lock)
    }

    pub async fn release(&self, lock_id: Uuid, agent_id: Uuid) -> DomainResult<ResourceLock> {
        let now = self.clock.now();
        let owned = self
            .repository
            .list_for_owner(agent_id)
            .await?
            .into_iter()
            .find(|l| l.id == lock_id);

        let mut lock = match owned {
            Some(lock) => lock,
            None => return Err(DomainError::NotFound(format!("lock {lock_id} not owned by {agent_id}"))),
        };
        lock.release(now);
        self.repository.update(&lock).await?;
        tracing::info!(lock_id = %lock_id, agent_id = %agent_id, "lock released");
        Ok(lock)
    }

    pub async fn active_for(&self, agent_id: Option<Uuid>, resource_key: Option<&str>) -> DomainResult<Vec<ResourceLock>> {
        self.sweep().await?;
        let now = self.clock.now();
        let locks = match (agent_id, resource_key) {
            (Some(agent_id), Some(key)) => self
                .repository
                .list_for_owner(agent_id)
                .await?
                .into_iter()
                .filter(|l| l.resource_key == key)
                .collect(),
            (Some(agent_id), None) => self.repository.list_for_owner(agent_id).await?,
            (None, Some(key)) => self.repository.active_for_key(key, now).await?.into_iter().collect(),
            (None, None) => Vec::new(),
        };
        Ok(locks.into_iter().filter(|l| l.is_active_at(now)).collect())
    }

    /// Release an agent's active lock on `resource_key`, if any. Used by
    /// `AdapterService` after a task completes successfully.
    pub async fn release_for_key(&self, resource_key: &str, agent_id: Uuid) -> DomainResult<()> {
        let now = self.clock.now();
        if let Some(mut lock) = self.repository.active_for_key(resource_key, now).await? {
            if lock.owner_agent_id == agent_id {
                lock.release(now);
                self.repository.update(&lock).await?;
            }
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteLockRepository};
    use crate::domain::ports::SystemClock;

    async fn setup() -> LockService<SqliteLockRepository> {
        let pool = create_migrated_test_pool().await.unwrap();
        LockService::new(Arc::new(SqliteLockRepository::new(pool)), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn acquire_then_conflict_for_other_agent() {
        let service = setup().await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        service.acquire("repo://x", a, 60).await.unwrap();
        let err = service.acquire("repo://x", b, 60).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn acquire_same_owner_extends() {
        let service = setup().await;
        let a = Uuid::new_v4();
        let first = service.acquire("repo://x", a, 10).await.unwrap();
        let second = service.acquire("repo://x", a, 60).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.expires_at > first.expires_at);
    }

    #[tokio::test]
    async fn release_is_owner_only() {
        let service = setup().await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let lock = service.acquire("repo://x", a, 60).await.unwrap();
        let err = service.release(lock.id, b).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        service.release(lock.id, a).await.unwrap();
    }

    #[tokio::test]
    async fn expired_lock_can_be_acquired_by_new_owner() {
        let service = setup().await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        service.acquire("repo://x", a, 0).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let lock = service.acquire("repo://x", b, 60).await.unwrap();
        assert_eq!(lock.owner_agent_id, b);
    }
}
