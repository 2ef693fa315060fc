//! Coordinator: the single composition root bundling every concretized
//! service, its runtime supervisor (if any), and the shared dependencies
//! (clock, broker, code tools) that the MCP dispatcher is written against.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::adapters::codetools::FsCodeTools;
use crate::adapters::sqlite::{
    SqliteAgentRepository, SqliteArtifactRepository, SqliteEventRepository, SqliteLockRepository, SqliteRepoRepository, SqliteSessionRepository,
    SqliteTaskRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::{CodeTools, SystemClock};
use crate::runtime::{AdapterRuntime, OrchestratorRuntime, SummarizerRuntime};
use crate::services::{AdapterService, AgentService, ContextBundleService, LockService, OrchestratorEngine, StreamBroker, Summarizer, TaskService};

pub type AppAgentService = AgentService<SqliteAgentRepository, SqliteSessionRepository>;
pub type AppTaskService = TaskService<SqliteTaskRepository, SqliteLockRepository>;
pub type AppLockService = LockService<SqliteLockRepository>;
pub type AppOrchestrator = OrchestratorEngine<SqliteAgentRepository, SqliteSessionRepository, SqliteTaskRepository, SqliteLockRepository, SqliteEventRepository>;
pub type AppAdapterService = AdapterService<SqliteTaskRepository, SqliteLockRepository, SqliteEventRepository>;
pub type AppSummarizer = Summarizer<SqliteTaskRepository, SqliteLockRepository, SqliteEventRepository>;
pub type AppContextBundle = ContextBundleService<SqliteTaskRepository, SqliteLockRepository, SqliteEventRepository>;

/// Everything a request handler needs, wired once at startup.
pub struct Coordinator {
    pub config: Config,
    pub agents: Arc<AppAgentService>,
    pub tasks: Arc<AppTaskService>,
    pub locks: Arc<AppLockService>,
    pub events: Arc<SqliteEventRepository>,
    pub repos: Arc<SqliteRepoRepository>,
    pub artifacts: Arc<SqliteArtifactRepository>,
    pub broker: Arc<StreamBroker>,
    pub context_bundle: Arc<AppContextBundle>,
    pub code_tools: Arc<dyn CodeTools>,
    pub orchestrator: Arc<AppOrchestrator>,
    pub orchestrator_runtime: OrchestratorRuntime,
    pub adapter: Arc<AppAdapterService>,
    pub adapter_runtime: AdapterRuntime,
    pub summarizer: Arc<AppSummarizer>,
    pub summarizer_runtime: SummarizerRuntime,
}

impl Coordinator {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let clock = Arc::new(SystemClock);

        let agent_repo = Arc::new(SqliteAgentRepository::new(pool.clone()));
        let session_repo = Arc::new(SqliteSessionRepository::new(pool.clone()));
        let task_repo = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let lock_repo = Arc::new(SqliteLockRepository::new(pool.clone()));
        let event_repo = Arc::new(SqliteEventRepository::new(pool.clone()));
        let repo_repo = Arc::new(SqliteRepoRepository::new(pool.clone()));
        let artifact_repo = Arc::new(SqliteArtifactRepository::new(pool.clone()));

        let locks = Arc::new(LockService::new(lock_repo.clone(), clock.clone()));
        let agents = Arc::new(AgentService::new(agent_repo, session_repo, clock.clone(), config.session_ttl_seconds));
        let tasks = Arc::new(TaskService::new(task_repo, locks.clone(), clock.clone()));
        let broker = Arc::new(StreamBroker::new());
        let context_bundle = Arc::new(ContextBundleService::new(tasks.clone(), locks.clone(), event_repo.clone()));
        let code_tools: Arc<dyn CodeTools> = Arc::new(FsCodeTools);

        let orchestrator = Arc::new(OrchestratorEngine::new(
            agents.clone(),
            tasks.clone(),
            event_repo.clone(),
            broker.clone(),
            clock.clone(),
            config.session_ttl_seconds,
        ));
        let orchestrator_runtime = OrchestratorRuntime::new(orchestrator.clone(), config.orchestrator.dispatch_limit);

        let adapter = Arc::new(AdapterService::new(tasks.clone(), locks.clone(), event_repo.clone(), broker.clone(), config.adapter.clone()));
        let adapter_runtime = AdapterRuntime::new(agents.clone(), adapter.clone(), config.adapter.max_tasks_per_agent_cycle, 2 * config.session_ttl_seconds);

        let summarizer = Arc::new(Summarizer::new(tasks.clone(), event_repo.clone(), broker.clone()));
        let summarizer_runtime = SummarizerRuntime::new(summarizer.clone(), config.summarizer.max_tasks_cycle);

        Self {
            config,
            agents,
            tasks,
            locks,
            events: event_repo,
            repos: repo_repo,
            artifacts: artifact_repo,
            broker,
            context_bundle,
            code_tools,
            orchestrator,
            orchestrator_runtime,
            adapter,
            adapter_runtime,
            summarizer,
            summarizer_runtime,
        }
    }

    /// Starts whichever runtimes are configured to `autostart`.
    pub async fn start_configured_runtimes(&self) {
        if self.config.orchestrator.autostart {
            self.orchestrator_runtime.start(self.broker.clone(), self.config.orchestrator.poll_seconds).await;
        }
        if self.config.adapter.autostart {
            self.adapter_runtime.start(self.config.adapter.poll_seconds).await;
        }
        if self.config.summarizer.autostart {
            self.summarizer_runtime.start(self.config.summarizer.poll_seconds).await;
        }
    }

    pub async fn stop_runtimes(&self) {
        self.orchestrator_runtime.stop().await;
        self.adapter_runtime.stop().await;
        self.summarizer_runtime.stop().await;
    }
}
