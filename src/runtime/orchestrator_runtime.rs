//! Orchestrator runtime: wakes on stream broker activity for the
//! `orchestration` channel, falling back to a fixed poll interval, and runs
//! one `OrchestratorEngine::run_once` per wakeup.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use futures::FutureExt;
use serde_json::json;

use crate::domain::ports::{AgentRepository, EventRepository, LockRepository, SessionRepository, TaskRepository};
use crate::runtime::supervisor::Supervisor;
use crate::services::orchestrator::OrchestratorEngine;
use crate::services::stream_broker::StreamBroker;

pub struct OrchestratorRuntime {
    pub supervisor: Supervisor,
}

impl OrchestratorRuntime {
    pub fn new<A, S, T, L, E>(engine: Arc<OrchestratorEngine<A, S, T, L, E>>, dispatch_limit: i64) -> Self
    where
        A: AgentRepository + 'static,
        S: SessionRepository + 'static,
        T: TaskRepository + 'static,
        L: LockRepository + 'static,
        E: EventRepository + 'static,
    {
        let cycle_engine = engine.clone();
        let cycle = Arc::new(move || {
            let engine = cycle_engine.clone();
            async move {
                let report = engine.run_once(dispatch_limit).await?;
                Ok(json!(report))
            }
            .boxed()
        });

        Self { supervisor: Supervisor::new(cycle) }
    }

    pub async fn start(&self, broker: Arc<StreamBroker>, poll_seconds: u64) {
        let wait_for_next = move || {
            let broker = broker.clone();
            async move {
                tokio::select! {
                    () = broker.notified() => {},
                    () = tokio::time::sleep(StdDuration::from_secs(poll_seconds)) => {},
                }
            }
            .boxed()
        };
        self.supervisor.start(wait_for_next).await;
    }

    pub async fn stop(&self) {
        self.supervisor.stop().await;
    }
}
