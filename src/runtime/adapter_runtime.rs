//! Adapter runtime: fixed-interval loop that executes claimed work for
//! every active non-orchestrator agent.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use futures::FutureExt;
use serde_json::json;

use crate::domain::ports::{AgentRepository, EventRepository, LockRepository, SessionRepository, TaskRepository};
use crate::runtime::supervisor::Supervisor;
use crate::services::adapter_service::AdapterService;
use crate::services::agent_service::AgentService;

pub struct AdapterRuntime {
    pub supervisor: Supervisor,
}

impl AdapterRuntime {
    pub fn new<A, S, T, L, E>(
        agents: Arc<AgentService<A, S>>,
        adapter: Arc<AdapterService<T, L, E>>,
        max_tasks_per_agent_cycle: i64,
        active_window_seconds: i64,
    ) -> Self
    where
        A: AgentRepository + 'static,
        S: SessionRepository + 'static,
        T: TaskRepository + 'static,
        L: LockRepository + 'static,
        E: EventRepository + 'static,
    {
        let cycle = Arc::new(move || {
            let agents = agents.clone();
            let adapter = adapter.clone();
            async move {
                let min_heartbeat = Utc::now() - chrono::Duration::seconds(active_window_seconds);
                let workers = agents.list_active_workers(min_heartbeat).await?;
                let mut reports = Vec::with_capacity(workers.len());
                for worker in workers {
                    let report = adapter.execute(worker.id, None, false, max_tasks_per_agent_cycle).await?;
                    reports.push(json!({ "agent_id": worker.id, "results": report.results }));
                }
                Ok(json!({ "agents": reports }))
            }
            .boxed()
        });

        Self { supervisor: Supervisor::new(cycle) }
    }

    pub async fn start(&self, poll_seconds: u64) {
        let wait_for_next = move || tokio::time::sleep(StdDuration::from_secs(poll_seconds)).boxed();
        self.supervisor.start(wait_for_next).await;
    }

    pub async fn stop(&self) {
        self.supervisor.stop().await;
    }
}
