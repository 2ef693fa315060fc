//! JSON-RPC 2.0 tool dispatcher. Routes `tool.call`/`tools/call`
//! requests by tool name to the corresponding service method.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::coordinator::Coordinator;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Event, EventFilter, NewEvent, Severity, SortDirection, TaskStatus};
use crate::domain::ports::{AgentRepository, EventRepository, TaskFilter};

const JSONRPC_VERSION: &str = "2.0";
const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

pub struct Dispatcher {
    coordinator: std::sync::Arc<Coordinator>,
}

impl Dispatcher {
    pub fn new(coordinator: std::sync::Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Handle one newline-delimited JSON-RPC message. Returns `None` for
    /// notifications (no `id`, no response expected).
    pub async fn handle_message(&self, line: &str) -> Option<String> {
        let request: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => return Some(error_envelope(Value::Null, PARSE_ERROR, &format!("parse error: {e}"))),
        };

        let id = request.get("id").cloned();
        let method = request.get("method").and_then(Value::as_str).unwrap_or("").to_string();
        let params = request.get("params").cloned().unwrap_or_else(|| json!({}));

        if method == "notifications/initialized" {
            return None;
        }
        let id = id.unwrap_or(Value::Null);

        let result = match method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "tools/list" => Ok(self.handle_tools_list()),
            "tool.call" => self.handle_tool_call(&params).await,
            "tools/call" => self.handle_tools_call(&params).await,
            other => Err(DomainError::Validation(format!("method not found: {other}"))),
        };

        Some(match result {
            Ok(value) => success_envelope(id, value),
            Err(err) => error_envelope(
                id,
                match &err {
                    DomainError::Validation(_) => INVALID_PARAMS,
                    _ => INTERNAL_ERROR,
                },
                &err.to_string(),
            ),
        })
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "repomesh", "version": env!("CARGO_PKG_VERSION") },
        })
    }

    fn handle_tools_list(&self) -> Value {
        json!({ "tools": TOOL_NAMES.iter().map(|name| json!({ "name": name })).collect::<Vec<_>>() })
    }

    /// `tool.call` returns the raw result object.
    async fn handle_tool_call(&self, params: &Value) -> DomainResult<Value> {
        let name = params.get("name").and_then(Value::as_str).ok_or_else(|| DomainError::Validation("missing tool name".to_string()))?;
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
        self.call_tool(name, &arguments).await
    }

    /// `tools/call` wraps the result as MCP content.
    async fn handle_tools_call(&self, params: &Value) -> DomainResult<Value> {
        let result = self.handle_tool_call(params).await?;
        Ok(json!({
            "content": [{ "type": "text", "text": result.to_string() }],
            "structuredContent": result,
            "isError": false,
        }))
    }

    async fn call_tool(&self, name: &str, args: &Value) -> DomainResult<Value> {
        match name {
            "agent.register" => self.agent_register(args).await,
            "agent.heartbeat" => self.agent_heartbeat(args).await,
            "agent.list" => self.agent_list(args).await,
            "task.create" => self.task_create(args).await,
            "task.list" => self.task_list(args).await,
            "task.claim" => self.task_claim(args).await,
            "task.update" => self.task_update(args).await,
            "lock.acquire" => self.lock_acquire(args).await,
            "lock.renew" => self.lock_renew(args).await,
            "lock.release" => self.lock_release(args).await,
            "event.log" => self.event_log(args).await,
            "event.list" => self.event_list(args).await,
            "event.inbox" => self.event_inbox(args).await,
            "event.thread" => self.event_thread(args).await,
            "context.bundle" => self.context_bundle(args).await,
            "orchestrator.tick" => self.orchestrator_tick(args).await,
            "orchestrator.status" => self.orchestrator_status().await,
            "adapter.execute" => self.adapter_execute(args).await,
            "adapter.tick" => self.adapter_tick().await,
            "adapter.status" => self.adapter_status().await,
            "summarizer.tick" => self.summarizer_tick(args).await,
            "summarizer.status" => self.summarizer_status().await,
            "file.skeleton" => self.file_skeleton(args).await,
            "file.symbol_logic" => self.file_symbol_logic(args).await,
            "file.search_replace" => self.file_search_replace(args).await,
            other => Err(DomainError::Validation(format!("unknown tool: {other}"))),
        }
    }

    // --- agent.* ---

    async fn agent_register(&self, args: &Value) -> DomainResult<Value> {
        let name = str_arg(args, "name")?;
        let agent_type = str_arg(args, "type")?;
        let capabilities = map_arg(args, "capabilities");
        let repo_id = optional_uuid_arg(args, "repo_id")?;
        let reuse_existing = bool_arg(args, "reuse_existing", true);
        let takeover_if_stale = bool_arg(args, "takeover_if_stale", true);
        let agent = self.coordinator.agents.register(name, agent_type, capabilities, repo_id, reuse_existing, takeover_if_stale).await?;
        Ok(json!(agent))
    }

    async fn agent_heartbeat(&self, args: &Value) -> DomainResult<Value> {
        let agent_id = uuid_arg(args, "agent_id")?;
        let status = match args.get("status").and_then(Value::as_str) {
            Some(s) => crate::domain::models::AgentStatus::parse_str(s).ok_or_else(|| DomainError::Validation(format!("invalid status: {s}")))?,
            None => crate::domain::models::AgentStatus::Active,
        };
        let current_task = optional_uuid_arg(args, "current_task")?;
        let agent = self.coordinator.agents.heartbeat(agent_id, status, current_task).await?;
        Ok(json!(agent))
    }

    async fn agent_list(&self, args: &Value) -> DomainResult<Value> {
        let repo_id = optional_uuid_arg(args, "repo_id")?;
        let agents = self.coordinator.agents.list(repo_id).await?;
        Ok(json!(agents))
    }

    // --- task.* ---

    async fn task_create(&self, args: &Value) -> DomainResult<Value> {
        let goal = str_arg(args, "goal")?;
        let description = args.get("description").and_then(Value::as_str).unwrap_or("");
        let scope = map_arg(args, "scope");
        let priority = i64_arg(args, "priority", i64::from(crate::domain::models::DEFAULT_PRIORITY)) as i32;
        let acceptance_criteria = args.get("acceptance_criteria").and_then(Value::as_str).map(str::to_string);
        let repo_id = optional_uuid_arg(args, "repo_id")?;
        let task = self.coordinator.tasks.create(goal, description, scope, priority, acceptance_criteria, repo_id).await?;
        Ok(json!(task))
    }

    async fn task_list(&self, args: &Value) -> DomainResult<Value> {
        let mut filter = TaskFilter::default();
        if let Some(s) = args.get("status").and_then(Value::as_str) {
            filter.status = Some(TaskStatus::parse_str(s).ok_or_else(|| DomainError::Validation(format!("invalid status: {s}")))?);
        }
        filter.scope_component = args.get("scope_component").and_then(Value::as_str).map(str::to_string);
        filter.assignee_agent_id = optional_uuid_arg(args, "assignee_agent_id")?;
        let tasks = self.coordinator.tasks.list(&filter).await?;
        Ok(json!(tasks))
    }

    async fn task_claim(&self, args: &Value) -> DomainResult<Value> {
        let task_id = uuid_arg(args, "task_id")?;
        let agent_id = uuid_arg(args, "agent_id")?;
        let resource_key = str_arg(args, "resource_key")?;
        let lease_ttl_seconds = i64_arg(args, "lease_ttl_seconds", self.coordinator.config.session_ttl_seconds);
        let claim = self.coordinator.tasks.claim(task_id, agent_id, resource_key, lease_ttl_seconds).await?;
        Ok(json!(claim))
    }

    async fn task_update(&self, args: &Value) -> DomainResult<Value> {
        let task_id = uuid_arg(args, "task_id")?;
        let status = match args.get("status").and_then(Value::as_str) {
            Some(s) => Some(TaskStatus::parse_str(s).ok_or_else(|| DomainError::Validation(format!("invalid status: {s}")))?),
            None => None,
        };
        let progress = args.get("progress").and_then(Value::as_i64).map(|p| p as i32);
        let summary = args.get("summary").and_then(Value::as_str).map(str::to_string);
        let blocked_reason = args.get("blocked_reason").and_then(Value::as_str).map(str::to_string);
        let task = self.coordinator.tasks.update(task_id, status, progress, summary, blocked_reason).await?;
        Ok(json!(task))
    }

    // --- lock.* ---

    async fn lock_acquire(&self, args: &Value) -> DomainResult<Value> {
        let resource_key = str_arg(args, "resource_key")?;
        let agent_id = uuid_arg(args, "agent_id")?;
        let ttl_seconds = i64_arg(args, "ttl_seconds", self.coordinator.config.session_ttl_seconds);
        let lock = self.coordinator.locks.acquire(resource_key, agent_id, ttl_seconds).await?;
        Ok(json!(lock))
    }

    async fn lock_renew(&self, args: &Value) -> DomainResult<Value> {
        let lock_id = uuid_arg(args, "lock_id")?;
        let agent_id = uuid_arg(args, "agent_id")?;
        let ttl_seconds = i64_arg(args, "ttl_seconds", self.coordinator.config.session_ttl_seconds);
        let lock = self.coordinator.locks.renew(lock_id, agent_id, ttl_seconds).await?;
        Ok(json!(lock))
    }

    async fn lock_release(&self, args: &Value) -> DomainResult<Value> {
        let lock_id = uuid_arg(args, "lock_id")?;
        let agent_id = uuid_arg(args, "agent_id")?;
        let lock = self.coordinator.locks.release(lock_id, agent_id).await?;
        Ok(json!(lock))
    }

    // --- event.* ---

    async fn event_log(&self, args: &Value) -> DomainResult<Value> {
        let r#type = str_arg(args, "type")?.to_string();
        let payload = map_arg(args, "payload");
        let severity = match args.get("severity").and_then(Value::as_str) {
            Some(s) => Severity::parse_str(s).ok_or_else(|| DomainError::Validation(format!("invalid severity: {s}")))?,
            None => Severity::Info,
        };
        let task_id = optional_uuid_arg(args, "task_id")?;
        let agent_id = optional_uuid_arg(args, "agent_id")?;
        let repo_id = optional_uuid_arg(args, "repo_id")?;
        let parent_message_id = optional_uuid_arg(args, "parent_message_id")?;
        let channel = args.get("channel").and_then(Value::as_str).map(str::to_string);
        let recipient_id = self.resolve_recipient(args, repo_id).await?;

        let event = Event::from_new(NewEvent {
            r#type,
            payload,
            severity,
            task_id,
            agent_id,
            repo_id,
            recipient_id,
            parent_message_id,
            channel,
        });
        self.coordinator.events.create(&event).await?;
        self.coordinator.broker.publish(&event);
        Ok(json!(event))
    }

    /// Resolves `recipient_id`, accepting either a UUID or an agent name
    /// looked up with `(name, repo_id)`.
    async fn resolve_recipient(&self, args: &Value, repo_id: Option<Uuid>) -> DomainResult<Option<Uuid>> {
        let Some(raw) = args.get("recipient_id").and_then(Value::as_str) else {
            return Ok(None);
        };
        if let Ok(id) = Uuid::from_str(raw) {
            return Ok(Some(id));
        }
        let agent = self
            .coordinator
            .agents
            .find_by_name(raw, repo_id)
            .await?
            .ok_or_else(|| DomainError::Validation(format!("no agent named '{raw}' found for recipient_id")))?;
        Ok(Some(agent.id))
    }

    async fn event_list(&self, args: &Value) -> DomainResult<Value> {
        let filter = self.event_filter_from_args(args)?;
        let events = self.coordinator.events.list(&filter).await?;
        Ok(self.paginated_event_response(events, bool_arg(args, "include_payload", true)))
    }

    async fn event_inbox(&self, args: &Value) -> DomainResult<Value> {
        let recipient_id = uuid_arg(args, "recipient_id")?;
        let mut filter = self.event_filter_from_args(args)?;
        filter.recipient_id = Some(recipient_id);
        filter.include_broadcast = bool_arg(args, "include_broadcast", true);
        let events = self.coordinator.events.list(&filter).await?;
        Ok(self.paginated_event_response(events, bool_arg(args, "include_payload", true)))
    }

    fn event_filter_from_args(&self, args: &Value) -> DomainResult<EventFilter> {
        let mut filter = EventFilter::new();
        filter.task_id = optional_uuid_arg(args, "task_id")?;
        filter.agent_id = optional_uuid_arg(args, "agent_id")?;
        filter.r#type = args.get("type").and_then(Value::as_str).map(str::to_string);
        filter.channel = args.get("channel").and_then(Value::as_str).map(str::to_string);
        filter.payload_contains = args.get("payload_contains").and_then(Value::as_str).map(str::to_string);
        filter.since = optional_datetime_arg(args, "since")?;
        filter.before = optional_datetime_arg(args, "before")?;
        if let Some(d) = args.get("direction").and_then(Value::as_str) {
            filter.direction = SortDirection::parse_str(d).ok_or_else(|| DomainError::Validation(format!("invalid direction: {d}")))?;
        }
        filter.limit = i64_arg(args, "limit", filter.limit).min(500);
        Ok(filter)
    }

    fn paginated_event_response(&self, mut events: Vec<Event>, include_payload: bool) -> Value {
        let latest_seen_at = events.iter().map(|e| e.created_at).max();
        if !include_payload {
            for event in &mut events {
                event.payload.clear();
            }
        }
        json!({
            "items": events,
            "count": events.len(),
            "latest_seen_at": latest_seen_at,
        })
    }

    async fn event_thread(&self, args: &Value) -> DomainResult<Value> {
        let parent_message_id = uuid_arg(args, "parent_message_id")?;
        let events = self.coordinator.events.list_thread(parent_message_id).await?;
        Ok(json!(events))
    }

    // --- context.* ---

    async fn context_bundle(&self, args: &Value) -> DomainResult<Value> {
        let task_id = uuid_arg(args, "task_id")?;
        let mode = args.get("mode").and_then(Value::as_str).unwrap_or("default");
        let include_recent = bool_arg(args, "include_recent", true);
        let bundle = self.coordinator.context_bundle.bundle(task_id, mode, include_recent).await?;
        Ok(json!(bundle))
    }

    // --- orchestrator.* / adapter.* / summarizer.* ---

    async fn orchestrator_tick(&self, args: &Value) -> DomainResult<Value> {
        match args.get("dispatch_limit").and_then(Value::as_i64) {
            Some(limit) => Ok(json!(self.coordinator.orchestrator.run_once(limit).await?)),
            None => {
                self.coordinator.orchestrator_runtime.supervisor.run_once_sync().await;
                Ok(self.status_value(&self.coordinator.orchestrator_runtime.supervisor).await)
            }
        }
    }

    async fn orchestrator_status(&self) -> DomainResult<Value> {
        Ok(self.status_value(&self.coordinator.orchestrator_runtime.supervisor).await)
    }

    async fn adapter_execute(&self, args: &Value) -> DomainResult<Value> {
        let agent_id = uuid_arg(args, "agent_id")?;
        let task_id = optional_uuid_arg(args, "task_id")?;
        let dry_run = bool_arg(args, "dry_run", false);
        let max_tasks = i64_arg(args, "max_tasks", self.coordinator.config.adapter.max_tasks_per_agent_cycle);
        let report = self.coordinator.adapter.execute(agent_id, task_id, dry_run, max_tasks).await?;
        Ok(json!(report))
    }

    async fn adapter_tick(&self) -> DomainResult<Value> {
        self.coordinator.adapter_runtime.supervisor.run_once_sync().await;
        Ok(self.status_value(&self.coordinator.adapter_runtime.supervisor).await)
    }

    async fn adapter_status(&self) -> DomainResult<Value> {
        Ok(self.status_value(&self.coordinator.adapter_runtime.supervisor).await)
    }

    async fn summarizer_tick(&self, args: &Value) -> DomainResult<Value> {
        match args.get("max_tasks").and_then(Value::as_i64) {
            Some(max_tasks) => Ok(json!(self.coordinator.summarizer.run_once(max_tasks).await?)),
            None => {
                self.coordinator.summarizer_runtime.supervisor.run_once_sync().await;
                Ok(self.status_value(&self.coordinator.summarizer_runtime.supervisor).await)
            }
        }
    }

    async fn summarizer_status(&self) -> DomainResult<Value> {
        Ok(self.status_value(&self.coordinator.summarizer_runtime.supervisor).await)
    }

    async fn status_value(&self, supervisor: &crate::runtime::Supervisor) -> Value {
        let status = supervisor.status().await;
        json!({
            "running": status.running,
            "cycles": status.cycles,
            "last_cycle_at": status.last_cycle_at,
            "last_error": status.last_error,
            "last_report": status.last_report,
        })
    }

    // --- file.* ---

    fn workspace_root(&self, args: &Value) -> PathBuf {
        match args.get("root").and_then(Value::as_str) {
            Some(root) => PathBuf::from(root),
            None => PathBuf::from(&self.coordinator.config.adapter.workspace_root),
        }
    }

    async fn file_skeleton(&self, args: &Value) -> DomainResult<Value> {
        let root = self.workspace_root(args);
        let relative_path = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let entries = self.coordinator.code_tools.list_dir(&root, relative_path).await?;
        Ok(json!({ "entries": entries }))
    }

    async fn file_symbol_logic(&self, args: &Value) -> DomainResult<Value> {
        let root = self.workspace_root(args);
        let relative_path = str_arg(args, "path")?;
        let contents = self.coordinator.code_tools.read_file(&root, relative_path).await?;
        Ok(json!({ "contents": contents }))
    }

    async fn file_search_replace(&self, args: &Value) -> DomainResult<Value> {
        let root = self.workspace_root(args);
        let relative_path = str_arg(args, "path")?;
        let search = str_arg(args, "search")?;
        let replace = str_arg(args, "replace")?;
        let outcome = self.coordinator.code_tools.search_replace(&root, relative_path, search, replace).await?;
        Ok(json!({
            "occurrences_replaced": outcome.occurrences_replaced,
            "bytes_before": outcome.bytes_before,
            "bytes_after": outcome.bytes_after,
        }))
    }
}

const TOOL_NAMES: &[&str] = &[
    "agent.register",
    "agent.heartbeat",
    "agent.list",
    "task.create",
    "task.list",
    "task.claim",
    "task.update",
    "lock.acquire",
    "lock.renew",
    "lock.release",
    "event.log",
    "event.list",
    "event.inbox",
    "event.thread",
    "context.bundle",
    "orchestrator.tick",
    "orchestrator.status",
    "adapter.execute",
    "adapter.tick",
    "adapter.status",
    "summarizer.tick",
    "summarizer.status",
    "file.skeleton",
    "file.symbol_logic",
    "file.search_replace",
];

fn success_envelope(id: Value, result: Value) -> String {
    json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": result }).to_string()
}

fn error_envelope(id: Value, code: i32, message: &str) -> String {
    json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "error": { "code": code, "message": message } }).to_string()
}

fn str_arg<'a>(args: &'a Value, key: &str) -> DomainResult<&'a str> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| DomainError::Validation(format!("missing required argument '{key}'")))
}

fn bool_arg(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn i64_arg(args: &Value, key: &str, default: i64) -> i64 {
    args.get(key).and_then(Value::as_i64).unwrap_or(default)
}

fn map_arg(args: &Value, key: &str) -> std::collections::HashMap<String, Value> {
    args.get(key)
        .and_then(Value::as_object)
        .map(|obj: &Map<String, Value>| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn uuid_arg(args: &Value, key: &str) -> DomainResult<Uuid> {
    let raw = str_arg(args, key)?;
    Uuid::from_str(raw).map_err(|e| DomainError::Validation(format!("invalid uuid for '{key}': {e}")))
}

fn optional_uuid_arg(args: &Value, key: &str) -> DomainResult<Option<Uuid>> {
    match args.get(key).and_then(Value::as_str) {
        Some(raw) => Ok(Some(Uuid::from_str(raw).map_err(|e| DomainError::Validation(format!("invalid uuid for '{key}': {e}")))?)),
        None => Ok(None),
    }
}

fn optional_datetime_arg(args: &Value, key: &str) -> DomainResult<Option<DateTime<Utc>>> {
    match args.get(key).and_then(Value::as_str) {
        Some(raw) => Ok(Some(DateTime::parse_from_rfc3339(raw).map_err(|e| DomainError::Validation(format!("invalid timestamp for '{key}': {e}")))?.with_timezone(&Utc))),
        None => Ok(None),
    }
}

#[allow(dead_code)]
fn unused_path_hint(p: &Path) -> &Path {
    p
}
