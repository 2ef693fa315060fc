//! Summarizer: rolls up a completed task's event history into a single
//! `summary.task` event, idempotent by presence check (deleting the summary
//! event produces a new
//! one on the next cycle; this is intentional).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Event, EventFilter, NewEvent, SortDirection};
use crate::domain::ports::{EventRepository, LockRepository, TaskRepository};
use crate::services::stream_broker::StreamBroker;
use crate::services::task_service::TaskService;

const SUMMARY_CHANNEL: &str = "summary";
const SUMMARY_EVENT_TYPE: &str = "summary.task";
const EVENTS_PER_TASK_LIMIT: i64 = 500;
const LAST_EVENTS_COUNT: usize = 5;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SummarizerReport {
    pub summarized_task_ids: Vec<Uuid>,
    pub skipped_existing: usize,
}

pub struct Summarizer<T: TaskRepository, L: LockRepository, E: EventRepository> {
    tasks: Arc<TaskService<T, L>>,
    events: Arc<E>,
    broker: Arc<StreamBroker>,
}

impl<T: TaskRepository, L: LockRepository, E: EventRepository> Summarizer<T, L, E> {
    pub fn new(tasks: Arc<TaskService<T, L>>, events: Arc<E>, broker: Arc<StreamBroker>) -> Self {
        Self { tasks, events, broker }
    }

    pub async fn run_once(&self, max_tasks: i64) -> DomainResult<SummarizerReport> {
        let completed = self.tasks.list_completed(max_tasks).await?;
        let mut report = SummarizerReport::default();

        for task in completed {
            let mut existing_filter = EventFilter::new();
            existing_filter.task_id = Some(task.id);
            existing_filter.r#type = Some(SUMMARY_EVENT_TYPE.to_string());
            existing_filter.limit = 1;
            if !self.events.list(&existing_filter).await?.is_empty() {
                report.skipped_existing += 1;
                continue;
            }

            let mut history_filter = EventFilter::new();
            history_filter.task_id = Some(task.id);
            history_filter.direction = SortDirection::Asc;
            history_filter.limit = EVENTS_PER_TASK_LIMIT;
            let history = self.events.list(&history_filter).await?;

            let mut type_histogram: HashMap<String, i64> = HashMap::new();
            let mut severity_histogram: HashMap<String, i64> = HashMap::new();
            for event in &history {
                *type_histogram.entry(event.r#type.clone()).or_insert(0) += 1;
                *severity_histogram.entry(event.severity.as_str().to_string()).or_insert(0) += 1;
            }

            let last_events: Vec<&Event> = history.iter().rev().take(LAST_EVENTS_COUNT).collect();
            let last_events_payload: Vec<serde_json::Value> = last_events
                .iter()
                .rev()
                .map(|e| json!({ "id": e.id, "type": e.r#type, "severity": e.severity.as_str(), "created_at": e.created_at }))
                .collect();

            let summary_text = format!("{} events recorded; {} distinct types", history.len(), type_histogram.len());

            let event = Event::from_new(NewEvent {
                r#type: SUMMARY_EVENT_TYPE.to_string(),
                payload: HashMap::from([
                    ("task".to_string(), json!({ "id": task.id, "goal": task.goal, "status": task.status.as_str() })),
                    ("aggregate".to_string(), json!({ "type_histogram": type_histogram, "severity_histogram": severity_histogram })),
                    ("last_events".to_string(), json!(last_events_payload)),
                    ("summary_text".to_string(), json!(summary_text)),
                ]),
                task_id: Some(task.id),
                repo_id: task.repo_id,
                channel: Some(SUMMARY_CHANNEL.to_string()),
                ..Default::default()
            });
            self.events.create(&event).await?;
            self.broker.publish(&event);

            tracing::info!(task_id = %task.id, "task summarized");
            report.summarized_task_ids.push(task.id);
        }

        Ok(report)
    }
}
