//! Repo repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Repo;

#[async_trait]
pub trait RepoRepository: Send + Sync {
    async fn create(&self, repo: &Repo) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Repo>>;
    async fn find_by_name(&self, name: &str) -> DomainResult<Option<Repo>>;
    async fn list(&self) -> DomainResult<Vec<Repo>>;
}
