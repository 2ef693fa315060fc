//! Artifact repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Artifact;

#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    async fn create(&self, artifact: &Artifact) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Artifact>>;

    /// `created_at desc`.
    async fn list_for_task(&self, task_id: Uuid) -> DomainResult<Vec<Artifact>>;
}
