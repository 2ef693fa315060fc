//! Summarizer runtime: fixed-interval loop, minimum 5 seconds, that rolls
//! up completed tasks.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use futures::FutureExt;
use serde_json::json;

use crate::domain::ports::{EventRepository, LockRepository, TaskRepository};
use crate::runtime::supervisor::Supervisor;
use crate::services::summarizer::Summarizer;

const MIN_POLL_SECONDS: u64 = 5;

pub struct SummarizerRuntime {
    pub supervisor: Supervisor,
}

impl SummarizerRuntime {
    pub fn new<T, L, E>(summarizer: Arc<Summarizer<T, L, E>>, max_tasks_per_cycle: i64) -> Self
    where
        T: TaskRepository + 'static,
        L: LockRepository + 'static,
        E: EventRepository + 'static,
    {
        let cycle = Arc::new(move || {
            let summarizer = summarizer.clone();
            async move {
                let report = summarizer.run_once(max_tasks_per_cycle).await?;
                Ok(json!(report))
            }
            .boxed()
        });

        Self { supervisor: Supervisor::new(cycle) }
    }

    pub async fn start(&self, poll_seconds: u64) {
        let effective = poll_seconds.max(MIN_POLL_SECONDS);
        let wait_for_next = move || tokio::time::sleep(StdDuration::from_secs(effective)).boxed();
        self.supervisor.start(wait_for_next).await;
    }

    pub async fn stop(&self) {
        self.supervisor.stop().await;
    }
}
