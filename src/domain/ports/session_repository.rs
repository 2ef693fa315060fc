//! AgentSession repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::AgentSession;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &AgentSession) -> DomainResult<()>;
    async fn update(&self, session: &AgentSession) -> DomainResult<()>;

    /// The active, non-expired session for an agent, if any.
    async fn active_for_agent(&self, agent_id: Uuid, now: DateTime<Utc>) -> DomainResult<Option<AgentSession>>;

    /// Active sessions with `expires_at < now`, across all agents.
    async fn stale_active_sessions(&self, now: DateTime<Utc>) -> DomainResult<Vec<AgentSession>>;

    /// Whether `agent_id` has any active, non-expired session remaining
    /// (used by `mark_stale_sessions` to decide whether to deactivate the agent).
    async fn has_active_session(&self, agent_id: Uuid, now: DateTime<Utc>) -> DomainResult<bool>;
}
