//! Context Bundle: a read-only snapshot of a task's scope, recent events,
//! and the assignee's active locks, for hand-off to an adapter or a human
//! reviewer.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Event, EventFilter, ResourceLock, SortDirection, Task};
use crate::domain::ports::{EventRepository, LockRepository, TaskRepository};
use crate::services::lock_service::LockService;
use crate::services::task_service::TaskService;

const RECENT_EVENTS_COUNT: i64 = 20;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextBundle {
    pub task: Task,
    pub scope_files: Vec<String>,
    pub recent_events: Vec<Event>,
    pub lock_status: Vec<ResourceLock>,
    pub mode: String,
}

pub struct ContextBundleService<T: TaskRepository, L: LockRepository, E: EventRepository> {
    tasks: Arc<TaskService<T, L>>,
    locks: Arc<LockService<L>>,
    events: Arc<E>,
}

impl<T: TaskRepository, L: LockRepository, E: EventRepository> ContextBundleService<T, L, E> {
    pub fn new(tasks: Arc<TaskService<T, L>>, locks: Arc<LockService<L>>, events: Arc<E>) -> Self {
        Self { tasks, locks, events }
    }

    pub async fn bundle(&self, task_id: Uuid, mode: &str, include_recent: bool) -> DomainResult<ContextBundle> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("task {task_id} not found")))?;

        let mut scope_files = task.scope_files();
        scope_files.sort();

        let recent_events = if include_recent {
            let mut filter = EventFilter::new();
            filter.task_id = Some(task_id);
            filter.direction = SortDirection::Desc;
            filter.limit = RECENT_EVENTS_COUNT;
            self.events.list(&filter).await?
        } else {
            Vec::new()
        };

        let mut lock_status = match task.assignee_agent_id {
            Some(agent_id) => self.locks.active_for(Some(agent_id), None).await?,
            None => Vec::new(),
        };
        lock_status.sort_by(|a, b| a.resource_key.cmp(&b.resource_key));

        Ok(ContextBundle { task, scope_files, recent_events, lock_status, mode: mode.to_string() })
    }
}
