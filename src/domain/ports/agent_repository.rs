//! Agent repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Agent;

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn create(&self, agent: &Agent) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>>;
    async fn update(&self, agent: &Agent) -> DomainResult<()>;

    /// Most recent agent matching `(name, repo_id)`, used by `register`'s
    /// identity-reuse lookup and by recipient-name resolution in `event.log`.
    async fn find_by_name(&self, name: &str, repo_id: Option<Uuid>) -> DomainResult<Option<Agent>>;

    /// `created_at desc`, optionally scoped to a repo.
    async fn list(&self, repo_id: Option<Uuid>) -> DomainResult<Vec<Agent>>;

    /// Candidate workers: `status=active`, `type != "orchestrator"`,
    /// `last_heartbeat_at >= min_heartbeat`, ordered by `last_heartbeat_at desc`.
    async fn list_active_workers(&self, min_heartbeat: DateTime<Utc>) -> DomainResult<Vec<Agent>>;
}
