//! Task Service: task CRUD, claim-with-lease, status transitions,
//! stale-claim sweep.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskClaim, TaskStatus};
use crate::domain::ports::{Clock, LockRepository, TaskFilter, TaskRepository};
use crate::services::lock_service::LockService;

pub struct TaskService<T: TaskRepository, L: LockRepository> {
    tasks: Arc<T>,
    locks: Arc<LockService<L>>,
    clock: Arc<dyn Clock>,
}

impl<T: TaskRepository, L: LockRepository> TaskService<T, L> {
    pub fn new(tasks: Arc<T>, locks: Arc<LockService<L>>, clock: Arc<dyn Clock>) -> Self {
        Self { tasks, locks, clock }
    }

    pub async fn create(
        &self,
        goal: &str,
        description: &str,
        scope: HashMap<String, Value>,
        priority: i32,
        acceptance_criteria: Option<String>,
        repo_id: Option<Uuid>,
    ) -> DomainResult<Task> {
        let mut task = Task::new(goal, description, scope, priority, repo_id);
        if let Some(criteria) = acceptance_criteria {
            task = task.with_acceptance_criteria(criteria);
        }
        self.tasks.create(&task).await?;
        tracing::info!(task_id = %task.id, "task created");
        Ok(task)
    }

    pub async fn get(&self, task_id: Uuid) -> DomainResult<Option<Task>> {
        self.tasks.get(task_id).await
    }

    pub async fn list(&self, filter: &TaskFilter) -> DomainResult<Vec<Task>> {
        self.expire_stale_claims(None).await?;
        self.tasks.list(filter).await
    }

    pub async fn list_assignable(&self, limit: i64) -> DomainResult<Vec<Task>> {
        self.tasks.list_assignable(limit).await
    }

    /// Tasks assigned to `agent_id` with `status in {claimed, in_progress}`,
    /// used by `AdapterService::execute`.
    pub async fn list_for_agent_active(&self, agent_id: Uuid, task_id: Option<Uuid>, limit: i64) -> DomainResult<Vec<Task>> {
        self.tasks.list_for_agent_active(agent_id, task_id, limit).await
    }

    /// `status = completed`, ordered by `updated_at desc`, used by `Summarizer`.
    pub async fn list_completed(&self, limit: i64) -> DomainResult<Vec<Task>> {
        self.tasks.list_completed(limit).await
    }

    /// The task's current active, non-expired claim, if any.
    pub async fn active_claim(&self, task_id: Uuid) -> DomainResult<Option<TaskClaim>> {
        self.tasks.active_claim_for_task(task_id, self.clock.now()).await
    }

    /// Release `agent_id`'s active claims on `task_id` (there is at most
    /// one, per the claim-exclusivity invariant). Used after a successful
    /// adapter execution.
    pub async fn release_claims_for_task_agent(&self, task_id: Uuid, agent_id: Uuid) -> DomainResult<()> {
        let now = self.clock.now();
        for mut claim in self.tasks.active_claims_for_task_agent(task_id, agent_id, now).await? {
            claim.state = crate::domain::models::ClaimState::Released;
            claim.released_at = Some(now);
            self.tasks.update_claim(&claim).await?;
        }
        Ok(())
    }

    /// Claim `task_id` for `agent_id`, auto-acquiring `resource_key`'s lock.
    pub async fn claim(&self, task_id: Uuid, agent_id: Uuid, resource_key: &str, lease_ttl_seconds: i64) -> DomainResult<TaskClaim> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("task {task_id} not found")))?;

        if task.status == TaskStatus::Completed {
            return Err(DomainError::Conflict(format!("task {task_id} is already completed")));
        }

        self.locks.acquire(resource_key, agent_id, lease_ttl_seconds).await?;

        self.expire_stale_claims(Some(task_id)).await?;

        let now = self.clock.now();
        if let Some(existing) = self.tasks.active_claim_for_task(task_id, now).await? {
            if existing.agent_id != agent_id {
                return Err(DomainError::Conflict(format!("task {task_id} already claimed by another agent")));
            }
        }

        let claim = TaskClaim::new(task_id, agent_id, resource_key, lease_ttl_seconds);
        self.tasks.create_claim(&claim).await?;

        let mut task = task;
        task.mark_claimed(agent_id);
        self.tasks.update(&task).await?;

        tracing::info!(task_id = %task_id, agent_id = %agent_id, resource_key, "task claimed");
        Ok(claim)
    }

    pub async fn update(
        &self,
        task_id: Uuid,
        status: Option<TaskStatus>,
        progress: Option<i32>,
        summary: Option<String>,
        blocked_reason: Option<String>,
    ) -> DomainResult<Task> {
        let mut task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("task {task_id} not found")))?;

        task.apply_update(status, progress, summary, blocked_reason)?;
        self.tasks.update(&task).await?;
        tracing::info!(task_id = %task_id, status = task.status.as_str(), "task updated");
        Ok(task)
    }

    /// Expire claims past their lease and stall the tasks they were holding
    /// open. Returns the count of claims transitioned.
    pub async fn expire_stale_claims(&self, task_id: Option<Uuid>) -> DomainResult<i64> {
        let now = Utc::now();
        let stale = self.tasks.stale_active_claims(task_id, now).await?;
        let mut count = 0i64;
        for mut claim in stale {
            claim.state = crate::domain::models::ClaimState::Expired;
            claim.released_at = Some(now);
            self.tasks.update_claim(&claim).await?;
            count += 1;

            if let Some(mut task) = self.tasks.get(claim.task_id).await? {
                if matches!(task.status, TaskStatus::Claimed | TaskStatus::InProgress) {
                    task.mark_stalled();
                    self.tasks.update(&task).await?;
                    tracing::warn!(task_id = %claim.task_id, claim_id = %claim.id, "claim expired, task stalled");
                }
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteLockRepository, SqliteTaskRepository};
    use crate::domain::ports::SystemClock;

    async fn setup() -> TaskService<SqliteTaskRepository, SqliteLockRepository> {
        let pool = create_migrated_test_pool().await.unwrap();
        let locks = Arc::new(LockService::new(Arc::new(SqliteLockRepository::new(pool.clone())), Arc::new(SystemClock)));
        TaskService::new(Arc::new(SqliteTaskRepository::new(pool)), locks, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn create_task_starts_pending() {
        let service = setup().await;
        let task = service.create("ship it", "", HashMap::new(), 3, None, None).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn claim_completed_task_conflicts() {
        let service = setup().await;
        let mut task = service.create("ship it", "", HashMap::new(), 3, None, None).await.unwrap();
        task.status = TaskStatus::Completed;
        service.tasks.update(&task).await.unwrap();
        let err = service.claim(task.id, Uuid::new_v4(), "repo://x", 60).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn claim_acquires_lock_and_transitions_task() {
        let service = setup().await;
        let task = service.create("ship it", "", HashMap::new(), 3, None, None).await.unwrap();
        let agent_id = Uuid::new_v4();
        let claim = service.claim(task.id, agent_id, "repo://x", 60).await.unwrap();
        assert_eq!(claim.agent_id, agent_id);
        let updated = service.get(task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Claimed);
        assert_eq!(updated.assignee_agent_id, Some(agent_id));
    }

    #[tokio::test]
    async fn claim_by_second_agent_conflicts() {
        let service = setup().await;
        let task = service.create("ship it", "", HashMap::new(), 3, None, None).await.unwrap();
        service.claim(task.id, Uuid::new_v4(), "repo://x", 60).await.unwrap();
        let err = service.claim(task.id, Uuid::new_v4(), "repo://x", 60).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn expire_stale_claims_stalls_task() {
        let service = setup().await;
        let task = service.create("ship it", "", HashMap::new(), 3, None, None).await.unwrap();
        let agent_id = Uuid::new_v4();
        service.claim(task.id, agent_id, "repo://x", 0).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let count = service.expire_stale_claims(Some(task.id)).await.unwrap();
        assert_eq!(count, 1);

        let updated = service.get(task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Stalled);
    }

    #[tokio::test]
    async fn stalled_task_can_be_reclaimed() {
        let service = setup().await;
        let task = service.create("ship it", "", HashMap::new(), 3, None, None).await.unwrap();
        let agent_a = Uuid::new_v4();
        service.claim(task.id, agent_a, "repo://x", 0).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        service.expire_stale_claims(Some(task.id)).await.unwrap();

        let agent_b = Uuid::new_v4();
        let claim = service.claim(task.id, agent_b, "repo://x", 60).await.unwrap();
        assert_eq!(claim.agent_id, agent_b);
        let updated = service.get(task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Claimed);
        assert_eq!(updated.assignee_agent_id, Some(agent_b));
    }
}
