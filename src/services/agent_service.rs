//! Agent Service: registration with identity reuse, heartbeats, session
//! lease, stale-session sweep.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentSession, AgentStatus};
use crate::domain::ports::{AgentRepository, Clock, SessionRepository};

pub struct AgentService<A: AgentRepository, S: SessionRepository> {
    agents: Arc<A>,
    sessions: Arc<S>,
    clock: Arc<dyn Clock>,
    session_ttl_seconds: i64,
}

impl<A: AgentRepository, S: SessionRepository> AgentService<A, S> {
    pub fn new(agents: Arc<A>, sessions: Arc<S>, clock: Arc<dyn Clock>, session_ttl_seconds: i64) -> Self {
        Self { agents, sessions, clock, session_ttl_seconds }
    }

    /// Register an agent, reusing an existing `(name, repo_id)` identity
    /// slot when possible.
    pub async fn register(
        &self,
        name: &str,
        agent_type: &str,
        capabilities: HashMap<String, Value>,
        repo_id: Option<Uuid>,
        reuse_existing: bool,
        takeover_if_stale: bool,
    ) -> DomainResult<Agent> {
        self.mark_stale_sessions().await?;
        let now = self.clock.now();

        if reuse_existing {
            if let Some(mut agent) = self.agents.find_by_name(name, repo_id).await? {
                if let Some(session) = self.sessions.active_for_agent(agent.id, now).await? {
                    agent.r#type = agent_type.to_string();
                    agent.capabilities = capabilities;
                    agent.touch_heartbeat(AgentStatus::Active);
                    self.agents.update(&agent).await?;
                    self.renew_session(agent.id, now, session.current_task_id).await?;
                    return Ok(agent);
                }
                if takeover_if_stale {
                    agent.r#type = agent_type.to_string();
                    agent.capabilities = capabilities;
                    agent.touch_heartbeat(AgentStatus::Active);
                    self.agents.update(&agent).await?;
                    let session = AgentSession::new(agent.id, self.session_ttl_seconds);
                    self.sessions.create(&session).await?;
                    tracing::info!(agent_id = %agent.id, name, "agent reactivated from stale session");
                    return Ok(agent);
                }
            }
        }

        let agent = Agent::new(name, agent_type, repo_id).with_capabilities(capabilities);
        self.agents.create(&agent).await?;
        let session = AgentSession::new(agent.id, self.session_ttl_seconds);
        self.sessions.create(&session).await?;
        tracing::info!(agent_id = %agent.id, name, "agent registered");
        Ok(agent)
    }

    async fn renew_session(&self, agent_id: Uuid, now: DateTime<Utc>, current_task: Option<Uuid>) -> DomainResult<()> {
        if let Some(mut session) = self.sessions.active_for_agent(agent_id, now).await? {
            session.renew(now, self.session_ttl_seconds);
            session.current_task_id = current_task;
            self.sessions.update(&session).await?;
        } else {
            let mut session = AgentSession::new(agent_id, self.session_ttl_seconds);
            session.current_task_id = current_task;
            self.sessions.create(&session).await?;
        }
        Ok(())
    }

    pub async fn heartbeat(&self, agent_id: Uuid, status: AgentStatus, current_task: Option<Uuid>) -> DomainResult<Agent> {
        let mut agent = self
            .agents
            .get(agent_id)
            .await?
            .ok_or_else(|| crate::domain::errors::DomainError::NotFound(format!("agent {agent_id} not found")))?;

        agent.touch_heartbeat(status);
        self.agents.update(&agent).await?;
        self.renew_session(agent_id, self.clock.now(), current_task).await?;
        Ok(agent)
    }

    pub async fn list(&self, repo_id: Option<Uuid>) -> DomainResult<Vec<Agent>> {
        self.mark_stale_sessions().await?;
        self.agents.list(repo_id).await
    }

    pub async fn get(&self, agent_id: Uuid) -> DomainResult<Option<Agent>> {
        self.agents.get(agent_id).await
    }

    pub async fn find_by_name(&self, name: &str, repo_id: Option<Uuid>) -> DomainResult<Option<Agent>> {
        self.agents.find_by_name(name, repo_id).await
    }

    pub async fn list_active_workers(&self, min_heartbeat: DateTime<Utc>) -> DomainResult<Vec<Agent>> {
        self.agents.list_active_workers(min_heartbeat).await
    }

    /// Transition any active session past its `expires_at` to `stale`; if the
    /// owning agent has no remaining active session, mark it `inactive`.
    /// Returns the count of transitioned sessions.
    pub async fn mark_stale_sessions(&self) -> DomainResult<i64> {
        let now = self.clock.now();
        let stale_sessions = self.sessions.stale_active_sessions(now).await?;
        let mut count = 0i64;
        for mut session in stale_sessions {
            session.mark_stale();
            self.sessions.update(&session).await?;
            count += 1;

            if !self.sessions.has_active_session(session.agent_id, now).await? {
                if let Some(mut agent) = self.agents.get(session.agent_id).await? {
                    if agent.status != AgentStatus::Inactive {
                        agent.status = AgentStatus::Inactive;
                        agent.updated_at = now;
                        self.agents.update(&agent).await?;
                    }
                }
            }
        }
        if count > 0 {
            tracing::info!(count, "marked sessions stale");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteAgentRepository, SqliteSessionRepository};
    use crate::domain::ports::SystemClock;

    async fn setup() -> AgentService<SqliteAgentRepository, SqliteSessionRepository> {
        let pool = create_migrated_test_pool().await.unwrap();
        AgentService::new(
            Arc::new(SqliteAgentRepository::new(pool.clone())),
            Arc::new(SqliteSessionRepository::new(pool)),
            Arc::new(SystemClock),
            120,
        )
    }

    #[tokio::test]
    async fn register_twice_reuses_identity() {
        let service = setup().await;
        let a = service.register("shared-agent", "worker", HashMap::new(), None, true, true).await.unwrap();
        let b = service.register("shared-agent", "worker", HashMap::new(), None, true, true).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn register_without_reuse_creates_distinct_ids() {
        let service = setup().await;
        let a = service.register("shared-agent", "worker", HashMap::new(), None, true, true).await.unwrap();
        let b = service.register("shared-agent", "worker", HashMap::new(), None, false, true).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn mark_stale_sessions_deactivates_agent() {
        let service = setup().await;
        let agent = service.register("ephemeral", "worker", HashMap::new(), None, true, true).await.unwrap();

        let now = service.clock.now();
        let mut session = service.sessions.active_for_agent(agent.id, now).await.unwrap().unwrap();
        session.renew(now, 0);
        service.sessions.update(&session).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let count = service.mark_stale_sessions().await.unwrap();
        assert_eq!(count, 1);

        let updated = service.agents.get(agent.id).await.unwrap().unwrap();
        assert_eq!(updated.status, AgentStatus::Inactive);
    }

    #[tokio::test]
    async fn heartbeat_refreshes_session_expiry() {
        let service = setup().await;
        let agent = service.register("worker-1", "worker", HashMap::new(), None, true, true).await.unwrap();
        let updated = service.heartbeat(agent.id, AgentStatus::Active, None).await.unwrap();
        assert!(updated.last_heartbeat_at.is_some());
    }

    #[tokio::test]
    async fn heartbeat_persists_current_task_on_session() {
        let service = setup().await;
        let agent = service.register("worker-2", "worker", HashMap::new(), None, true, true).await.unwrap();
        let task_id = Uuid::new_v4();
        service.heartbeat(agent.id, AgentStatus::Active, Some(task_id)).await.unwrap();

        let now = service.clock.now();
        let session = service.sessions.active_for_agent(agent.id, now).await.unwrap().unwrap();
        assert_eq!(session.current_task_id, Some(task_id));
    }
}
