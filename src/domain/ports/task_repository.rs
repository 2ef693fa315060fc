//! Task and TaskClaim repository ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskClaim, TaskStatus};

/// Filter criteria for `TaskService::list`.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    /// Matched against `scope.component`.
    pub scope_component: Option<String>,
    pub assignee_agent_id: Option<Uuid>,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;
    async fn update(&self, task: &Task) -> DomainResult<()>;

    /// `created_at desc`.
    async fn list(&self, filter: &TaskFilter) -> DomainResult<Vec<Task>>;

    /// `status in {pending, stalled}`, ordered by `(priority desc, created_at asc)`, limited.
    async fn list_assignable(&self, limit: i64) -> DomainResult<Vec<Task>>;

    /// Tasks assigned to `agent_id` with `status in {claimed, in_progress}`,
    /// ordered by `(priority desc, created_at asc)`.
    async fn list_for_agent_active(&self, agent_id: Uuid, task_id: Option<Uuid>, limit: i64) -> DomainResult<Vec<Task>>;

    /// `status = completed`, ordered by `updated_at desc`, limited.
    async fn list_completed(&self, limit: i64) -> DomainResult<Vec<Task>>;

    // --- Claims ---

    async fn create_claim(&self, claim: &TaskClaim) -> DomainResult<()>;
    async fn update_claim(&self, claim: &TaskClaim) -> DomainResult<()>;

    /// The single active, non-expired claim on a task, if any.
    async fn active_claim_for_task(&self, task_id: Uuid, now: DateTime<Utc>) -> DomainResult<Option<TaskClaim>>;

    /// All claims in state `active` with `expires_at < now`, optionally scoped to one task.
    async fn stale_active_claims(&self, task_id: Option<Uuid>, now: DateTime<Utc>) -> DomainResult<Vec<TaskClaim>>;

    async fn active_claims_for_task_agent(&self, task_id: Uuid, agent_id: Uuid, now: DateTime<Utc>) -> DomainResult<Vec<TaskClaim>>;
}
