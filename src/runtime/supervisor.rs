//! Generic supervisor: wraps a background cycle closure with
//! start/stop/status/run_once_sync semantics shared by the
//! orchestrator/adapter/summarizer runtimes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::domain::errors::DomainResult;

/// One supervised cycle. Returns a JSON-serializable report used to surface
/// component counters (`assignments`, `executed_tasks`, `compressed`, ...)
/// via `status`.
pub type CycleFn = Arc<dyn Fn() -> BoxFuture<'static, DomainResult<Value>> + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct SupervisorStatus {
    pub running: bool,
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<Value>,
}

struct SupervisorState {
    status: SupervisorStatus,
    handle: Option<JoinHandle<()>>,
}

/// `loop_body` drives the wait-for-next-cycle policy (fixed sleep, or
/// broker-subscription-with-timeout); the supervisor only owns start/stop
/// bookkeeping and counters, run generically over any such loop.
pub struct Supervisor {
    cycle: CycleFn,
    state: Arc<AsyncMutex<SupervisorState>>,
    cancel: Arc<Notify>,
}

impl Supervisor {
    pub fn new(cycle: CycleFn) -> Self {
        Self {
            cycle,
            state: Arc::new(AsyncMutex::new(SupervisorState { status: SupervisorStatus::default(), handle: None })),
            cancel: Arc::new(Notify::new()),
        }
    }

    async fn run_cycle_and_record(state: &Arc<AsyncMutex<SupervisorState>>, cycle: &CycleFn) {
        let result = (cycle)().await;
        let mut guard = state.lock().await;
        guard.status.cycles += 1;
        guard.status.last_cycle_at = Some(Utc::now());
        match result {
            Ok(report) => {
                guard.status.last_report = Some(report);
                guard.status.last_error = None;
            }
            Err(err) => {
                guard.status.last_error = Some(err.to_string());
            }
        }
    }

    /// Run one cycle immediately, independent of whether a background loop
    /// is running. Safe to call concurrently with `start`.
    pub async fn run_once_sync(&self) {
        Self::run_cycle_and_record(&self.state, &self.cycle).await;
    }

    pub async fn status(&self) -> SupervisorStatus {
        self.state.lock().await.status.clone()
    }

    /// Start a background loop that waits on `wait_for_next` between
    /// cycles. Idempotent: a second `start` while already running is a
    /// no-op.
    pub async fn start<W>(&self, wait_for_next: W)
    where
        W: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let mut guard = self.state.lock().await;
        if guard.status.running {
            return;
        }
        guard.status.running = true;

        let state = self.state.clone();
        let cycle = self.cycle.clone();
        let cancel = self.cancel.clone();
        let wait_for_next = Arc::new(wait_for_next);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.notified() => break,
                    () = (wait_for_next)() => {
                        Self::run_cycle_and_record(&state, &cycle).await;
                    }
                }
            }
            let mut guard = state.lock().await;
            guard.status.running = false;
        });
        guard.handle = Some(handle);
    }

    /// Cancel the background loop and wait for it to exit.
    pub async fn stop(&self) {
        let handle = {
            let mut guard = self.state.lock().await;
            guard.handle.take()
        };
        if let Some(handle) = handle {
            self.cancel.notify_waiters();
            let _ = handle.await;
        }
    }
}
