//! Task and TaskClaim domain models.
//!
//! The task lifecycle state machine:
//!
//! ```text
//! pending ──claim──► claimed ──update(in_progress)──► in_progress
//!                       │                                  │
//!                       │                                  ├─update(completed)─► completed (terminal)
//!                       │                                  ├─update(blocked)───► blocked
//!                       ▼                                  ▼
//!                   (claim expires) ─► stalled ─► (re-claim) ─► claimed
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Claimed,
    InProgress,
    Blocked,
    Completed,
    Stalled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Stalled => "stalled",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "claimed" => Some(Self::Claimed),
            "in_progress" => Some(Self::InProgress),
            "blocked" => Some(Self::Blocked),
            "completed" => Some(Self::Completed),
            "stalled" => Some(Self::Stalled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Statuses `TaskService::update` accepts as a target, mirroring the
    /// original service's `ALLOWED_STATUSES` set.
    pub fn allowed_update_targets() -> &'static [TaskStatus] {
        &[
            Self::Pending,
            Self::Claimed,
            Self::InProgress,
            Self::Blocked,
            Self::Completed,
            Self::Stalled,
        ]
    }

    /// Whether a direct `update(status)` call may move the task from `self`
    /// to `target`. `claim` moves `pending`/`stalled` to `claimed` directly
    /// and is not gated by this table.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        if *self == target {
            return false;
        }
        if self.is_terminal() {
            return false;
        }
        match (*self, target) {
            (Self::Claimed, Self::InProgress | Self::Blocked | Self::Completed | Self::Stalled) => true,
            (Self::InProgress, Self::Completed | Self::Blocked | Self::Stalled) => true,
            (Self::Stalled, Self::Claimed | Self::InProgress) => true,
            (Self::Pending, Self::Claimed) => true,
            (Self::Blocked, Self::InProgress | Self::Claimed | Self::Stalled) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimState {
    Active,
    Released,
    Expired,
}

impl ClaimState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Released => "released",
            Self::Expired => "expired",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "released" => Some(Self::Released),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskClaim {
    pub id: Uuid,
    pub task_id: Uuid,
    pub agent_id: Uuid,
    pub resource_key: String,
    pub lease_ttl_seconds: i64,
    pub state: ClaimState,
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl TaskClaim {
    pub fn new(task_id: Uuid, agent_id: Uuid, resource_key: impl Into<String>, lease_ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_id,
            agent_id,
            resource_key: resource_key.into(),
            lease_ttl_seconds,
            state: ClaimState::Active,
            claimed_at: now,
            expires_at: now + Duration::seconds(lease_ttl_seconds),
            released_at: None,
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state == ClaimState::Active && self.expires_at >= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub repo_id: Option<Uuid>,
    pub goal: String,
    pub description: String,
    /// Free-form map; recognized keys: `files: [string]`, `component: string`,
    /// `resource_key: string`, and an `adapter` sub-map consumed by
    /// `AdapterService` (`command`, `cwd`, `timeout_seconds`,
    /// `prepass_commands`, `tier`, `profile`).
    pub scope: HashMap<String, Value>,
    pub priority: i32,
    pub status: TaskStatus,
    pub acceptance_criteria: Option<String>,
    pub assignee_agent_id: Option<Uuid>,
    pub blocked_reason: Option<String>,
    pub progress: i32,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_PRIORITY: i32 = 3;

impl Task {
    pub fn new(goal: impl Into<String>, description: impl Into<String>, scope: HashMap<String, Value>, priority: i32, repo_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            repo_id,
            goal: goal.into(),
            description: description.into(),
            scope,
            priority,
            status: TaskStatus::Pending,
            acceptance_criteria: None,
            assignee_agent_id: None,
            blocked_reason: None,
            progress: 0,
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_acceptance_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.acceptance_criteria = Some(criteria.into());
        self
    }

    /// `scope.component`, used by `TaskService::list`'s `scope` filter.
    pub fn scope_component(&self) -> Option<&str> {
        self.scope.get("component").and_then(Value::as_str)
    }

    /// `scope.files`, used by orchestrator `resource_key` derivation and
    /// `ContextBundle`.
    pub fn scope_files(&self) -> Vec<String> {
        self.scope
            .get("files")
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub fn scope_resource_key(&self) -> Option<&str> {
        self.scope.get("resource_key").and_then(Value::as_str)
    }

    pub fn adapter_scope(&self) -> Option<&serde_json::Map<String, Value>> {
        self.scope.get("adapter").and_then(Value::as_object)
    }

    /// Assign the task to `agent_id` and move it to `claimed`. Used only by
    /// `TaskService::claim`, which has already validated the FSM edge.
    pub fn mark_claimed(&mut self, agent_id: Uuid) {
        self.status = TaskStatus::Claimed;
        self.assignee_agent_id = Some(agent_id);
        self.updated_at = Utc::now();
    }

    /// Force the task to `stalled` after a claim-expiry sweep, bypassing the
    /// normal transition table (the task may be re-claimed from here).
    pub fn mark_stalled(&mut self) {
        self.status = TaskStatus::Stalled;
        self.updated_at = Utc::now();
    }

    /// Validate and apply `update(status, progress, summary, blocked_reason)`.
    pub fn apply_update(
        &mut self,
        status: Option<TaskStatus>,
        progress: Option<i32>,
        summary: Option<String>,
        blocked_reason: Option<String>,
    ) -> Result<(), DomainError> {
        if let Some(p) = progress {
            if !(0..=100).contains(&p) {
                return Err(DomainError::Validation(format!("progress must be between 0 and 100, got {p}")));
            }
        }
        if let Some(target) = status {
            if !self.status.can_transition_to(target) {
                return Err(DomainError::Validation(format!(
                    "cannot transition task from {} to {}",
                    self.status.as_str(),
                    target.as_str()
                )));
            }
            self.status = target;
        }
        if let Some(p) = progress {
            self.progress = p;
        }
        if let Some(s) = summary {
            self.summary = Some(s);
        }
        if let Some(r) = blocked_reason {
            self.blocked_reason = Some(r);
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new("ship it", "", HashMap::new(), DEFAULT_PRIORITY, None)
    }

    #[test]
    fn new_task_starts_pending() {
        let t = task();
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.progress, 0);
    }

    #[test]
    fn claimed_to_in_progress_is_valid() {
        assert!(TaskStatus::Claimed.can_transition_to(TaskStatus::InProgress));
    }

    #[test]
    fn completed_is_terminal() {
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Stalled));
    }

    #[test]
    fn pending_cannot_jump_to_in_progress() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
    }

    #[test]
    fn stalled_can_be_reclaimed() {
        assert!(TaskStatus::Stalled.can_transition_to(TaskStatus::Claimed));
    }

    #[test]
    fn self_transition_rejected() {
        assert!(!TaskStatus::InProgress.can_transition_to(TaskStatus::InProgress));
    }

    #[test]
    fn apply_update_rejects_invalid_progress() {
        let mut t = task();
        t.status = TaskStatus::Claimed;
        let err = t.apply_update(None, Some(150), None, None).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn apply_update_rejects_invalid_transition() {
        let mut t = task();
        let err = t.apply_update(Some(TaskStatus::Completed), None, None, None).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn apply_update_applies_valid_transition() {
        let mut t = task();
        t.status = TaskStatus::Claimed;
        t.apply_update(Some(TaskStatus::InProgress), Some(10), None, None).unwrap();
        assert_eq!(t.status, TaskStatus::InProgress);
        assert_eq!(t.progress, 10);
    }

    #[test]
    fn scope_files_reads_string_array() {
        let mut scope = HashMap::new();
        scope.insert("files".to_string(), serde_json::json!(["a.rs", "b.rs"]));
        let t = Task::new("x", "", scope, DEFAULT_PRIORITY, None);
        assert_eq!(t.scope_files(), vec!["a.rs".to_string(), "b.rs".to_string()]);
    }

    #[test]
    fn claim_is_active_only_before_expiry() {
        let claim = TaskClaim::new(Uuid::new_v4(), Uuid::new_v4(), "k", 0);
        let later = Utc::now() + Duration::seconds(1);
        assert!(!claim.is_active_at(later));
    }
}
