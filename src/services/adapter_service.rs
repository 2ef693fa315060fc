//! Adapter Service: executes a worker's claimed tasks as shell commands
//! inside a sandboxed workspace, with a single pre-pass retry on failure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::config::AdapterConfig;
use crate::domain::models::{NewEvent, Task, TaskStatus};
use crate::domain::ports::{EventRepository, LockRepository, TaskRepository};
use crate::services::lock_service::LockService;
use crate::services::stream_broker::StreamBroker;
use crate::services::task_service::TaskService;

const EXECUTION_CHANNEL: &str = "execution";
const SUCCESS_SUMMARY_CHARS: usize = 500;
const STDOUT_PREVIEW_CHARS: usize = 1000;
const STDERR_PREVIEW_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum AdapterOutcome {
    Completed,
    RetriedSuccess,
    Blocked,
    Planned,
    Skipped,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskExecutionResult {
    pub task_id: Uuid,
    pub outcome: AdapterOutcome,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AdapterReport {
    pub results: Vec<TaskExecutionResult>,
}

struct CommandPlan {
    command: String,
    cwd: PathBuf,
    timeout_seconds: u64,
    prepass_commands: Vec<String>,
}

struct CommandOutput {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

pub struct AdapterService<T: TaskRepository, L: LockRepository, E: EventRepository> {
    tasks: Arc<TaskService<T, L>>,
    locks: Arc<LockService<L>>,
    events: Arc<E>,
    broker: Arc<StreamBroker>,
    config: AdapterConfig,
}

impl<T: TaskRepository, L: LockRepository, E: EventRepository> AdapterService<T, L, E> {
    pub fn new(tasks: Arc<TaskService<T, L>>, locks: Arc<LockService<L>>, events: Arc<E>, broker: Arc<StreamBroker>, config: AdapterConfig) -> Self {
        Self { tasks, locks, events, broker, config }
    }

    pub async fn execute(&self, agent_id: Uuid, task_id: Option<Uuid>, dry_run: bool, max_tasks: i64) -> DomainResult<AdapterReport> {
        let candidates = self.tasks.list_for_agent_active(agent_id, task_id, max_tasks).await?;
        let mut report = AdapterReport::default();

        for task in candidates {
            let plan = match self.plan_for(&task) {
                Some(plan) => plan,
                None => {
                    report.results.push(TaskExecutionResult { task_id: task.id, outcome: AdapterOutcome::Skipped });
                    continue;
                }
            };

            if let Err(err) = self.validate_plan(&plan) {
                let blocked_reason = format!("{err}");
                self.tasks
                    .update(task.id, Some(TaskStatus::Blocked), None, None, Some(blocked_reason.clone()))
                    .await?;
                self.emit(&task, "adapter.execution.failed", json!({ "reason": blocked_reason })).await?;
                report.results.push(TaskExecutionResult { task_id: task.id, outcome: AdapterOutcome::Blocked });
                continue;
            }

            if dry_run {
                self.emit(
                    &task,
                    "adapter.execution.planned",
                    json!({ "command": plan.command, "cwd": plan.cwd.display().to_string(), "timeout_seconds": plan.timeout_seconds }),
                )
                .await?;
                report.results.push(TaskExecutionResult { task_id: task.id, outcome: AdapterOutcome::Planned });
                continue;
            }

            let outcome = self.run_task(&task, agent_id, &plan).await?;
            report.results.push(TaskExecutionResult { task_id: task.id, outcome });
        }

        Ok(report)
    }

    fn plan_for(&self, task: &Task) -> Option<CommandPlan> {
        let adapter = task.adapter_scope();
        let command = adapter
            .and_then(|a| a.get("command"))
            .and_then(Value::as_str)
            .map(str::to_string)?;

        let cwd_raw = adapter.and_then(|a| a.get("cwd")).and_then(Value::as_str).unwrap_or(".").to_string();
        let timeout_seconds = adapter
            .and_then(|a| a.get("timeout_seconds"))
            .and_then(Value::as_u64)
            .unwrap_or(self.config.default_timeout_seconds);

        let prepass_commands = adapter
            .and_then(|a| a.get("prepass_commands"))
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_else(|| {
                self.config
                    .prepass_commands
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            });

        let workspace_root = PathBuf::from(&self.config.workspace_root);
        let cwd = if Path::new(&cwd_raw).is_absolute() { PathBuf::from(cwd_raw) } else { workspace_root.join(cwd_raw) };

        Some(CommandPlan { command, cwd, timeout_seconds, prepass_commands })
    }

    fn validate_plan(&self, plan: &CommandPlan) -> DomainResult<()> {
        let workspace_root = PathBuf::from(&self.config.workspace_root)
            .canonicalize()
            .map_err(|e| DomainError::Validation(format!("invalid workspace root: {e}")))?;
        let resolved = plan
            .cwd
            .canonicalize()
            .map_err(|e| DomainError::Validation(format!("cwd does not exist: {e}")))?;
        if !resolved.starts_with(&workspace_root) {
            return Err(DomainError::Validation(format!("cwd {} escapes workspace root", plan.cwd.display())));
        }

        if !self.config.allowed_commands.trim().is_empty() {
            let allowed = self.config.allowed_commands.split(',').map(str::trim).any(|prefix| !prefix.is_empty() && plan.command.starts_with(prefix));
            if !allowed {
                return Err(DomainError::Validation(format!("command '{}' is not in the allowed prefix list", plan.command)));
            }
        }
        Ok(())
    }

    async fn run_task(&self, task: &Task, agent_id: Uuid, plan: &CommandPlan) -> DomainResult<AdapterOutcome> {
        self.emit(task, "adapter.execution.started", json!({ "command": plan.command })).await?;
        self.emit(task, "adapter.hook.pre_execute", json!({ "command": plan.command })).await?;
        self.tasks.update(task.id, Some(TaskStatus::InProgress), Some(10), None, None).await?;

        let first = self.run_shell(&plan.command, &plan.cwd, plan.timeout_seconds).await;

        let outcome = match first {
            Ok(output) if output.exit_code == 0 => self.complete(task, agent_id, &output, "adapter.execution.completed").await?,
            Ok(output) => {
                if self.run_prepass(task, plan).await? {
                    let retry = self.run_shell(&plan.command, &plan.cwd, plan.timeout_seconds).await;
                    match retry {
                        Ok(retried) if retried.exit_code == 0 => self.complete(task, agent_id, &retried, "adapter.execution.retried_success").await?,
                        Ok(retried) => self.fail(task, &retried).await?,
                        Err(_) => self.timeout(task, plan.timeout_seconds).await?,
                    }
                } else {
                    self.fail(task, &output).await?
                }
            }
            Err(_) => self.timeout(task, plan.timeout_seconds).await?,
        };

        Ok(outcome)
    }

    async fn run_prepass(&self, task: &Task, plan: &CommandPlan) -> DomainResult<bool> {
        if plan.prepass_commands.is_empty() {
            return Ok(false);
        }
        self.emit(task, "adapter.prepass.started", json!({ "commands": plan.prepass_commands })).await?;

        let mut all_succeeded = true;
        let mut failures: Vec<Value> = Vec::new();
        for command in &plan.prepass_commands {
            self.emit(task, "adapter.hook.pre_execute", json!({ "prepass_command": command })).await?;
            match self.run_shell(command, &plan.cwd, plan.timeout_seconds).await {
                Ok(output) if output.exit_code == 0 => {}
                Ok(output) => {
                    all_succeeded = false;
                    failures.push(json!({ "prepass_command": command, "exit_code": output.exit_code }));
                }
                Err(_) => {
                    all_succeeded = false;
                    failures.push(json!({ "prepass_command": command, "reason": "timeout" }));
                }
            }
        }

        if all_succeeded {
            self.emit(task, "adapter.prepass.completed", json!({ "commands": plan.prepass_commands })).await?;
        } else {
            self.emit(task, "adapter.prepass.failed", json!({ "failures": failures })).await?;
        }
        Ok(all_succeeded)
    }

    async fn complete(&self, task: &Task, agent_id: Uuid, output: &CommandOutput, event_type: &str) -> DomainResult<AdapterOutcome> {
        let summary = truncate_lines(&output.stdout, 5, SUCCESS_SUMMARY_CHARS);
        self.tasks.update(task.id, Some(TaskStatus::Completed), Some(100), Some(summary), None).await?;

        if let Some(claim) = self.tasks.active_claim(task.id).await? {
            self.tasks.release_claims_for_task_agent(task.id, agent_id).await?;
            self.locks.release_for_key(&claim.resource_key, agent_id).await?;
        }

        self.emit(task, event_type, json!({ "exit_code": output.exit_code })).await?;
        if event_type == "adapter.execution.retried_success" {
            Ok(AdapterOutcome::RetriedSuccess)
        } else {
            Ok(AdapterOutcome::Completed)
        }
    }

    async fn fail(&self, task: &Task, output: &CommandOutput) -> DomainResult<AdapterOutcome> {
        let reason = format!("Execution failed (exit {})", output.exit_code);
        self.tasks.update(task.id, Some(TaskStatus::Blocked), None, None, Some(reason)).await?;
        self.emit(
            task,
            "adapter.execution.failed",
            json!({
                "exit_code": output.exit_code,
                "stdout_preview": truncate_chars(&output.stdout, STDOUT_PREVIEW_CHARS),
                "stderr_preview": truncate_chars(&output.stderr, STDERR_PREVIEW_CHARS),
            }),
        )
        .await?;
        self.emit(task, "adapter.hook.on_failure", json!({ "exit_code": output.exit_code })).await?;
        Ok(AdapterOutcome::Blocked)
    }

    async fn timeout(&self, task: &Task, timeout_seconds: u64) -> DomainResult<AdapterOutcome> {
        let reason = format!("Execution timeout after {timeout_seconds}s");
        self.tasks.update(task.id, Some(TaskStatus::Blocked), None, None, Some(reason)).await?;
        self.emit(task, "adapter.execution.timeout", json!({ "timeout_seconds": timeout_seconds })).await?;
        Ok(AdapterOutcome::Blocked)
    }

    async fn run_shell(&self, command: &str, cwd: &Path, timeout_seconds: u64) -> Result<CommandOutput, ()> {
        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        match tokio::time::timeout(StdDuration::from_secs(timeout_seconds), child).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Ok(Err(_)) => Ok(CommandOutput { exit_code: -1, stdout: String::new(), stderr: String::new() }),
            Err(_) => Err(()),
        }
    }

    async fn emit(&self, task: &Task, event_type: &str, payload: Value) -> DomainResult<()> {
        let mut fields: HashMap<String, Value> = HashMap::new();
        if let Value::Object(map) = payload {
            for (k, v) in map {
                fields.insert(k, v);
            }
        }
        let event = crate::domain::models::Event::from_new(NewEvent {
            r#type: event_type.to_string(),
            payload: fields,
            task_id: Some(task.id),
            repo_id: task.repo_id,
            channel: Some(EXECUTION_CHANNEL.to_string()),
            ..Default::default()
        });
        self.events.create(&event).await?;
        self.broker.publish(&event);
        Ok(())
    }
}

fn truncate_lines(text: &str, max_lines: usize, max_chars: usize) -> String {
    let joined: String = text.lines().take(max_lines).collect::<Vec<_>>().join("\n");
    truncate_chars(&joined, max_chars)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteEventRepository, SqliteLockRepository, SqliteTaskRepository};
    use crate::domain::ports::SystemClock;
    use serde_json::json as jsonmacro;
    use std::collections::HashMap as Map;
    use tempfile::tempdir;

    async fn setup(workspace_root: &Path) -> AdapterService<SqliteTaskRepository, SqliteLockRepository, SqliteEventRepository> {
        let pool = create_migrated_test_pool().await.unwrap();
        let locks = Arc::new(LockService::new(Arc::new(SqliteLockRepository::new(pool.clone())), Arc::new(SystemClock)));
        let tasks = Arc::new(TaskService::new(Arc::new(SqliteTaskRepository::new(pool.clone())), locks.clone(), Arc::new(SystemClock)));
        let events = Arc::new(SqliteEventRepository::new(pool));
        let mut config = AdapterConfig::default();
        config.workspace_root = workspace_root.to_string_lossy().into_owned();
        AdapterService::new(tasks, locks, events, Arc::new(StreamBroker::new()), config)
    }

    #[tokio::test]
    async fn successful_command_completes_task() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let agent_id = Uuid::new_v4();

        let mut scope = Map::new();
        scope.insert("adapter".to_string(), jsonmacro!({ "command": "echo hello", "cwd": "." }));
        let task = service.tasks.create("goal", "", scope, 3, None, None).await.unwrap();
        service.tasks.claim(task.id, agent_id, "repo://x", 60).await.unwrap();

        let report = service.execute(agent_id, Some(task.id), false, 10).await.unwrap();
        assert_eq!(report.results[0].outcome, AdapterOutcome::Completed);

        let updated = service.tasks.get(task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.summary.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn failing_command_blocks_task() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let agent_id = Uuid::new_v4();

        let mut scope = Map::new();
        scope.insert("adapter".to_string(), jsonmacro!({ "command": "exit 1", "cwd": "." }));
        let task = service.tasks.create("goal", "", scope, 3, None, None).await.unwrap();
        service.tasks.claim(task.id, agent_id, "repo://x", 60).await.unwrap();

        let report = service.execute(agent_id, Some(task.id), false, 10).await.unwrap();
        assert_eq!(report.results[0].outcome, AdapterOutcome::Blocked);

        let updated = service.tasks.get(task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Blocked);
        assert!(updated.blocked_reason.unwrap().contains("exit 1"));
    }

    #[tokio::test]
    async fn cwd_escape_is_rejected() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let agent_id = Uuid::new_v4();

        let mut scope = Map::new();
        scope.insert("adapter".to_string(), jsonmacro!({ "command": "echo hi", "cwd": "../../etc" }));
        let task = service.tasks.create("goal", "", scope, 3, None, None).await.unwrap();
        service.tasks.claim(task.id, agent_id, "repo://x", 60).await.unwrap();

        let report = service.execute(agent_id, Some(task.id), false, 10).await.unwrap();
        assert_eq!(report.results[0].outcome, AdapterOutcome::Blocked);
        let updated = service.tasks.get(task.id).await.unwrap().unwrap();
        assert!(updated.blocked_reason.unwrap().contains("escapes workspace"));
    }

    #[tokio::test]
    async fn missing_command_is_skipped() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let agent_id = Uuid::new_v4();

        let task = service.tasks.create("goal", "", Map::new(), 3, None, None).await.unwrap();
        service.tasks.claim(task.id, agent_id, "repo://x", 60).await.unwrap();

        let report = service.execute(agent_id, Some(task.id), false, 10).await.unwrap();
        assert_eq!(report.results[0].outcome, AdapterOutcome::Skipped);
    }

    #[tokio::test]
    async fn dry_run_only_plans() {
        let dir = tempdir().unwrap();
        let service = setup(dir.path()).await;
        let agent_id = Uuid::new_v4();

        let mut scope = Map::new();
        scope.insert("adapter".to_string(), jsonmacro!({ "command": "echo hi", "cwd": "." }));
        let task = service.tasks.create("goal", "", scope, 3, None, None).await.unwrap();
        service.tasks.claim(task.id, agent_id, "repo://x", 60).await.unwrap();

        let report = service.execute(agent_id, Some(task.id), true, 10).await.unwrap();
        assert_eq!(report.results[0].outcome, AdapterOutcome::Planned);
        let updated = service.tasks.get(task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Claimed);
    }
}
