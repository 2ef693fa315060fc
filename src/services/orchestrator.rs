//! Orchestrator Engine: assigns pending/stalled tasks to live workers.
//!
//! The round-robin index persists across `run_once` calls (not reset per
//! cycle), for fleet-scale fairness across many short cycles; see DESIGN.md.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentStatus, NewEvent, Task, TaskStatus, ORCHESTRATOR_AGENT_TYPE};
use crate::domain::ports::{AgentRepository, Clock, EventRepository, LockRepository, SessionRepository, TaskRepository};
use crate::services::agent_service::AgentService;
use crate::services::routing_policy::RoutingPolicy;
use crate::services::stream_broker::StreamBroker;
use crate::services::task_service::TaskService;

const ORCHESTRATION_CHANNEL: &str = "orchestration";
const ORCHESTRATOR_AGENT_NAME: &str = "orchestrator";

#[derive(Debug, Clone, serde::Serialize)]
pub struct Assignment {
    pub task_id: Uuid,
    pub agent_id: Uuid,
    pub tier: String,
    pub profile: String,
    pub resource_key: String,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct OrchestratorReport {
    pub assignments: Vec<Assignment>,
    pub candidate_count: usize,
    pub pending_count: usize,
}

pub struct OrchestratorEngine<A: AgentRepository, S: SessionRepository, T: TaskRepository, L: LockRepository, E: EventRepository> {
    agents: Arc<AgentService<A, S>>,
    tasks: Arc<TaskService<T, L>>,
    events: Arc<E>,
    broker: Arc<StreamBroker>,
    clock: Arc<dyn Clock>,
    session_ttl_seconds: i64,
    round_robin_index: AtomicUsize,
}

impl<A: AgentRepository, S: SessionRepository, T: TaskRepository, L: LockRepository, E: EventRepository> OrchestratorEngine<A, S, T, L, E> {
    pub fn new(
        agents: Arc<AgentService<A, S>>,
        tasks: Arc<TaskService<T, L>>,
        events: Arc<E>,
        broker: Arc<StreamBroker>,
        clock: Arc<dyn Clock>,
        session_ttl_seconds: i64,
    ) -> Self {
        Self {
            agents,
            tasks,
            events,
            broker,
            clock,
            session_ttl_seconds,
            round_robin_index: AtomicUsize::new(0),
        }
    }

    pub async fn run_once(&self, max_assignments: i64) -> DomainResult<OrchestratorReport> {
        let orchestrator = self
            .agents
            .register(ORCHESTRATOR_AGENT_NAME, ORCHESTRATOR_AGENT_TYPE, HashMap::new(), None, true, true)
            .await?;
        self.agents.heartbeat(orchestrator.id, AgentStatus::Active, None).await?;

        self.agents.mark_stale_sessions().await?;
        self.tasks.expire_stale_claims(None).await?;

        let min_heartbeat = self.clock.now() - Duration::seconds(2 * self.session_ttl_seconds);
        let candidates = self.agents.list_active_workers(min_heartbeat).await?;
        let pending = self.tasks.list_assignable(max_assignments).await?;

        let mut report = OrchestratorReport {
            candidate_count: candidates.len(),
            pending_count: pending.len(),
            assignments: Vec::new(),
        };

        if candidates.is_empty() {
            return Ok(report);
        }

        for task in pending {
            let decision = RoutingPolicy::decide(&task);
            let matching: Vec<&Agent> = candidates.iter().filter(|agent| RoutingPolicy::supports(agent, &decision)).collect();
            let pool: Vec<&Agent> = if matching.is_empty() { candidates.iter().collect() } else { matching };
            if pool.is_empty() {
                continue;
            }

            let index = self.round_robin_index.fetch_add(1, Ordering::SeqCst) % pool.len();
            let worker = pool[index];
            let resource_key = derive_resource_key(&task);

            match self.tasks.claim(task.id, worker.id, &resource_key, self.session_ttl_seconds).await {
                Ok(_) => {
                    self.tasks.update(task.id, Some(TaskStatus::InProgress), Some(0), None, None).await?;

                    let event = crate::domain::models::Event::from_new(NewEvent {
                        r#type: "orchestrator.assignment".to_string(),
                        payload: HashMap::from([
                            ("task_id".to_string(), json!(task.id)),
                            ("agent_id".to_string(), json!(worker.id)),
                            ("tier".to_string(), json!(decision.tier)),
                            ("profile".to_string(), json!(decision.profile)),
                            ("reason".to_string(), json!(decision.reason)),
                            ("resource_key".to_string(), json!(resource_key)),
                        ]),
                        task_id: Some(task.id),
                        agent_id: Some(orchestrator.id),
                        repo_id: task.repo_id,
                        recipient_id: Some(worker.id),
                        parent_message_id: None,
                        channel: Some(ORCHESTRATION_CHANNEL.to_string()),
                        ..Default::default()
                    });
                    self.events.create(&event).await?;
                    self.broker.publish(&event);

                    tracing::info!(task_id = %task.id, agent_id = %worker.id, tier = %decision.tier, "task assigned");
                    report.assignments.push(Assignment {
                        task_id: task.id,
                        agent_id: worker.id,
                        tier: decision.tier,
                        profile: decision.profile,
                        resource_key,
                    });
                }
                Err(err) if err.code() == "CONFLICT" => {
                    tracing::debug!(task_id = %task.id, "assignment skipped: resource conflict");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(report)
    }
}

/// `scope.resource_key` > `file:<first file>` > `component:<name>` > `task:<id>`.
fn derive_resource_key(task: &Task) -> String {
    if let Some(key) = task.scope_resource_key() {
        if !key.is_empty() {
            return key.to_string();
        }
    }
    if let Some(first) = task.scope_files().first() {
        return format!("file:{first}");
    }
    if let Some(component) = task.scope_component() {
        if !component.is_empty() {
            return format!("component:{component}");
        }
    }
    format!("task:{}", task.id)
}
