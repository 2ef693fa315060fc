//! ResourceLock repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ResourceLock;

#[async_trait]
pub trait LockRepository: Send + Sync {
    async fn create(&self, lock: &ResourceLock) -> DomainResult<()>;
    async fn update(&self, lock: &ResourceLock) -> DomainResult<()>;

    /// The active, non-expired lock on `resource_key`, if any.
    async fn active_for_key(&self, resource_key: &str, now: DateTime<Utc>) -> DomainResult<Option<ResourceLock>>;

    /// All locks in state `active` with `expires_at < now`.
    async fn stale_active_locks(&self, now: DateTime<Utc>) -> DomainResult<Vec<ResourceLock>>;

    async fn list_for_owner(&self, owner_agent_id: Uuid) -> DomainResult<Vec<ResourceLock>>;
}
