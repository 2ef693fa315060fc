//! End-to-end scenarios exercising the task/lock/agent/event surface through
//! the same service wiring `Coordinator` uses, against an in-memory
//! `SQLite` pool.

use std::collections::HashMap;
use std::sync::Arc;

use repomesh::adapters::sqlite::{
    SqliteAgentRepository, SqliteEventRepository, SqliteLockRepository, SqliteSessionRepository, SqliteTaskRepository,
};
use repomesh::domain::errors::DomainError;
use repomesh::domain::models::{AgentStatus, Event, EventFilter, NewEvent, SortDirection, TaskStatus};
use repomesh::domain::ports::{SystemClock, TaskFilter};
use repomesh::services::{AgentService, ContextBundleService, LockService, TaskService};
use serde_json::json;
use uuid::Uuid;

async fn pool() -> sqlx::SqlitePool {
    repomesh::adapters::sqlite::create_migrated_test_pool().await.unwrap()
}

type Agents = AgentService<SqliteAgentRepository, SqliteSessionRepository>;
type Tasks = TaskService<SqliteTaskRepository, SqliteLockRepository>;
type Locks = LockService<SqliteLockRepository>;
type Bundle = ContextBundleService<SqliteTaskRepository, SqliteLockRepository, SqliteEventRepository>;

struct Harness {
    agents: Arc<Agents>,
    tasks: Arc<Tasks>,
    locks: Arc<Locks>,
    events: Arc<SqliteEventRepository>,
    bundle: Bundle,
}

async fn harness() -> Harness {
    let pool = pool().await;
    let locks = Arc::new(LockService::new(Arc::new(SqliteLockRepository::new(pool.clone())), Arc::new(SystemClock)));
    let tasks = Arc::new(TaskService::new(Arc::new(SqliteTaskRepository::new(pool.clone())), locks.clone(), Arc::new(SystemClock)));
    let agents = Arc::new(AgentService::new(
        Arc::new(SqliteAgentRepository::new(pool.clone())),
        Arc::new(SqliteSessionRepository::new(pool.clone())),
        Arc::new(SystemClock),
        120,
    ));
    let events = Arc::new(SqliteEventRepository::new(pool));
    let bundle = ContextBundleService::new(tasks.clone(), locks.clone(), events.clone());
    Harness { agents, tasks, locks, events, bundle }
}

#[tokio::test]
async fn basic_flow_claim_and_context_bundle() {
    let h = harness().await;
    let agent = h.agents.register("agent-one", "worker", HashMap::new(), None, true, true).await.unwrap();

    h.locks.acquire("repo://backend/contracts/*", agent.id, 300).await.unwrap();

    let mut scope = HashMap::new();
    scope.insert("files".to_string(), json!(["backend/contracts/task.py"]));
    let task = h.tasks.create("goal", "", scope, 3, None, None).await.unwrap();

    h.tasks.claim(task.id, agent.id, "repo://backend/contracts/*", 300).await.unwrap();

    let event = Event::from_new(NewEvent { r#type: "task.claimed".to_string(), task_id: Some(task.id), agent_id: Some(agent.id), ..Default::default() });
    h.events.create(&event).await.unwrap();

    let bundle = h.bundle.bundle(task.id, "default", true).await.unwrap();
    assert_eq!(bundle.scope_files, vec!["backend/contracts/task.py".to_string()]);
    assert!(!bundle.recent_events.is_empty());
    assert_eq!(bundle.lock_status[0].resource_key, "repo://backend/contracts/*");
}

#[tokio::test]
async fn lock_conflict_between_two_agents() {
    let h = harness().await;
    let a = h.agents.register("agent-a", "worker", HashMap::new(), None, true, true).await.unwrap();
    let b = h.agents.register("agent-b", "worker", HashMap::new(), None, true, true).await.unwrap();

    h.locks.acquire("repo://shared/key", a.id, 60).await.unwrap();
    let err = h.locks.acquire("repo://shared/key", b.id, 60).await.unwrap_err();
    assert_eq!(err.code(), "CONFLICT");
}

#[tokio::test]
async fn recovery_reconciles_stalled_claims() {
    let h = harness().await;
    let agent = h.agents.register("agent-one", "worker", HashMap::new(), None, true, true).await.unwrap();
    h.locks.acquire("repo://db/migrations", agent.id, 5).await.unwrap();

    let task = h.tasks.create("goal", "", HashMap::new(), 3, None, None).await.unwrap();
    h.tasks.claim(task.id, agent.id, "repo://db/migrations", 1).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let stale_claims = h.tasks.expire_stale_claims(None).await.unwrap();
    assert!(stale_claims >= 1);

    let reloaded = h.tasks.list(&TaskFilter::default()).await.unwrap();
    let matching = reloaded.iter().find(|t| t.id == task.id).unwrap();
    assert_eq!(matching.status, TaskStatus::Stalled);
}

#[tokio::test]
async fn identity_reuse_returns_same_id_unless_opted_out() {
    let h = harness().await;
    let first = h.agents.register("shared-agent", "worker", HashMap::new(), None, true, true).await.unwrap();
    let second = h.agents.register("shared-agent", "worker", HashMap::new(), None, true, true).await.unwrap();
    assert_eq!(first.id, second.id);

    let third = h.agents.register("shared-agent", "worker", HashMap::new(), None, false, true).await.unwrap();
    assert_ne!(first.id, third.id);
}

#[tokio::test]
async fn threaded_messaging_returns_ascending_closure() {
    let h = harness().await;
    let agent = h.agents.register("agent-s", "worker", HashMap::new(), None, true, true).await.unwrap();
    h.agents.heartbeat(agent.id, AgentStatus::Active, None).await.unwrap();

    let root = Event::from_new(NewEvent { r#type: "root".to_string(), agent_id: Some(agent.id), channel: Some("work".to_string()), ..Default::default() });
    h.events.create(&root).await.unwrap();

    let reply = Event::from_new(NewEvent { r#type: "reply".to_string(), agent_id: Some(agent.id), channel: Some("work".to_string()), parent_message_id: Some(root.id), ..Default::default() });
    h.events.create(&reply).await.unwrap();

    let nested = Event::from_new(NewEvent { r#type: "nested".to_string(), agent_id: Some(agent.id), channel: Some("work".to_string()), parent_message_id: Some(reply.id), ..Default::default() });
    h.events.create(&nested).await.unwrap();

    let thread = h.events.list_thread(root.id).await.unwrap();
    let types: Vec<&str> = thread.iter().map(|e| e.r#type.as_str()).collect();
    assert_eq!(types, vec!["root", "reply", "nested"]);
}

#[tokio::test]
async fn inbox_with_broadcast_and_since_filter() {
    let h = harness().await;
    let sender = h.agents.register("agent-s", "worker", HashMap::new(), None, true, true).await.unwrap();
    let recipient = h.agents.register("agent-r", "worker", HashMap::new(), None, true, true).await.unwrap();
    let other = h.agents.register("agent-o", "worker", HashMap::new(), None, true, true).await.unwrap();

    let direct = Event::from_new(NewEvent {
        r#type: "direct".to_string(),
        agent_id: Some(sender.id),
        recipient_id: Some(recipient.id),
        channel: Some("work".to_string()),
        ..Default::default()
    });
    h.events.create(&direct).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let since = direct.created_at;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let broadcast = Event::from_new(NewEvent { r#type: "broadcast".to_string(), agent_id: Some(sender.id), channel: Some("work".to_string()), ..Default::default() });
    h.events.create(&broadcast).await.unwrap();

    let unrelated = Event::from_new(NewEvent {
        r#type: "other".to_string(),
        agent_id: Some(sender.id),
        recipient_id: Some(other.id),
        channel: Some("work".to_string()),
        ..Default::default()
    });
    h.events.create(&unrelated).await.unwrap();

    let mut filter = EventFilter::new();
    filter.recipient_id = Some(recipient.id);
    filter.include_broadcast = true;
    filter.channel = Some("work".to_string());
    filter.direction = SortDirection::Asc;
    filter.limit = 100;

    let inbox = h.events.list(&filter).await.unwrap();
    let types: Vec<&str> = inbox.iter().map(|e| e.r#type.as_str()).collect();
    assert_eq!(types, vec!["direct", "broadcast"]);

    filter.since = Some(since);
    let after_since = h.events.list(&filter).await.unwrap();
    let types: Vec<&str> = after_since.iter().map(|e| e.r#type.as_str()).collect();
    assert_eq!(types, vec!["broadcast"]);
}

#[tokio::test]
async fn since_excludes_event_at_exact_timestamp() {
    let h = harness().await;
    let sender = h.agents.register("agent-s2", "worker", HashMap::new(), None, true, true).await.unwrap();

    let marker = Event::from_new(NewEvent { r#type: "marker".to_string(), agent_id: Some(sender.id), channel: Some("work".to_string()), ..Default::default() });
    h.events.create(&marker).await.unwrap();

    let mut filter = EventFilter::new();
    filter.channel = Some("work".to_string());
    filter.direction = SortDirection::Asc;
    filter.limit = 100;
    filter.since = Some(marker.created_at);

    let after = h.events.list(&filter).await.unwrap();
    assert!(!after.iter().any(|e| e.id == marker.id), "since is a strict bound: the boundary event itself must be excluded");
}

#[tokio::test]
async fn renew_and_release_require_matching_owner() {
    let h = harness().await;
    let owner = h.agents.register("owner", "worker", HashMap::new(), None, true, true).await.unwrap();
    let intruder = h.agents.register("intruder", "worker", HashMap::new(), None, true, true).await.unwrap();

    let lock = h.locks.acquire("repo://x", owner.id, 60).await.unwrap();

    let err = h.locks.renew(lock.id, intruder.id, 60).await.unwrap_err();
    assert_eq!(err.code(), "CONFLICT");

    let err = h.locks.release(lock.id, intruder.id).await.unwrap_err();
    assert_eq!(err.code(), "CONFLICT");

    h.locks.release(lock.id, owner.id).await.unwrap();
}

#[tokio::test]
async fn claiming_already_claimed_task_conflicts() {
    let h = harness().await;
    let a = h.agents.register("a", "worker", HashMap::new(), None, true, true).await.unwrap();
    let b = h.agents.register("b", "worker", HashMap::new(), None, true, true).await.unwrap();
    let task = h.tasks.create("goal", "", HashMap::new(), 3, None, None).await.unwrap();

    h.tasks.claim(task.id, a.id, "repo://y", 300).await.unwrap();
    let err = h.tasks.claim(task.id, b.id, "repo://y", 300).await.unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));
}
