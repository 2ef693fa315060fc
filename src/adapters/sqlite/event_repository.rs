//! SQLite implementation of the EventRepository.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Event, EventFilter, Severity, SortDirection};
use crate::domain::ports::EventRepository;

#[derive(Clone)]
pub struct SqliteEventRepository {
    pool: SqlitePool,
}

impl SqliteEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn create(&self, event: &Event) -> DomainResult<()> {
        let payload_json = serde_json::to_string(&event.payload)?;
        sqlx::query(
            r#"INSERT INTO events (id, repo_id, agent_id, task_id, recipient_id, parent_message_id, channel, type, severity, payload, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(event.id.to_string())
        .bind(event.repo_id.map(|id| id.to_string()))
        .bind(event.agent_id.map(|id| id.to_string()))
        .bind(event.task_id.map(|id| id.to_string()))
        .bind(event.recipient_id.map(|id| id.to_string()))
        .bind(event.parent_message_id.map(|id| id.to_string()))
        .bind(&event.channel)
        .bind(&event.r#type)
        .bind(event.severity.as_str())
        .bind(&payload_json)
        .bind(event.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Event>> {
        let row: Option<EventRow> = sqlx::query_as("SELECT * FROM events WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, filter: &EventFilter) -> DomainResult<Vec<Event>> {
        let mut query = String::from("SELECT * FROM events WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(task_id) = filter.task_id {
            query.push_str(" AND task_id = ?");
            bindings.push(task_id.to_string());
        }
        if let Some(agent_id) = filter.agent_id {
            query.push_str(" AND agent_id = ?");
            bindings.push(agent_id.to_string());
        }
        if let Some(ref r#type) = filter.r#type {
            query.push_str(" AND type = ?");
            bindings.push(r#type.clone());
        }
        if let Some(parent_message_id) = filter.parent_message_id {
            query.push_str(" AND parent_message_id = ?");
            bindings.push(parent_message_id.to_string());
        }
        if let Some(ref channel) = filter.channel {
            query.push_str(" AND channel = ?");
            bindings.push(channel.clone());
        }
        if let Some(ref needle) = filter.payload_contains {
            query.push_str(" AND payload LIKE ?");
            bindings.push(format!("%{needle}%"));
        }
        if let Some(since) = filter.since {
            query.push_str(" AND created_at > ?");
            bindings.push(since.to_rfc3339());
        }
        if let Some(before) = filter.before {
            query.push_str(" AND created_at < ?");
            bindings.push(before.to_rfc3339());
        }

        // recipient_id match: either the addressed recipient, or (when
        // include_broadcast) any broadcast event (recipient_id IS NULL).
        if let Some(recipient_id) = filter.recipient_id {
            if filter.include_broadcast {
                query.push_str(" AND (recipient_id = ? OR recipient_id IS NULL)");
            } else {
                query.push_str(" AND recipient_id = ?");
            }
            bindings.push(recipient_id.to_string());
        }

        query.push_str(match filter.direction {
            SortDirection::Asc => " ORDER BY created_at ASC",
            SortDirection::Desc => " ORDER BY created_at DESC",
        });
        query.push_str(" LIMIT ?");

        let mut q = sqlx::query_as::<_, EventRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }
        q = q.bind(filter.limit);

        let rows: Vec<EventRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_thread(&self, parent_message_id: Uuid) -> DomainResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT * FROM events WHERE id = ? OR parent_message_id = ? ORDER BY created_at ASC",
        )
        .bind(parent_message_id.to_string())
        .bind(parent_message_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    repo_id: Option<String>,
    agent_id: Option<String>,
    task_id: Option<String>,
    recipient_id: Option<String>,
    parent_message_id: Option<String>,
    channel: String,
    r#type: String,
    severity: String,
    payload: Option<String>,
    created_at: String,
}

impl TryFrom<EventRow> for Event {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let severity = Severity::parse_str(&row.severity)
            .ok_or_else(|| crate::domain::errors::DomainError::Validation(format!("invalid severity: {}", row.severity)))?;
        let payload: HashMap<String, serde_json::Value> = super::parse_json_or_default(row.payload)?;
        Ok(Event {
            id: super::parse_uuid(&row.id)?,
            repo_id: super::parse_optional_uuid(row.repo_id)?,
            agent_id: super::parse_optional_uuid(row.agent_id)?,
            task_id: super::parse_optional_uuid(row.task_id)?,
            recipient_id: super::parse_optional_uuid(row.recipient_id)?,
            parent_message_id: super::parse_optional_uuid(row.parent_message_id)?,
            channel: row.channel,
            r#type: row.r#type,
            severity,
            payload,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}
