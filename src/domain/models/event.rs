//! Event domain model.
//!
//! Append-only log entries. Broadcast when `recipient_id` is `None`; threads
//! form a forest via `parent_message_id`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Debug,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Debug => "debug",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Info
    }
}

pub const DEFAULT_CHANNEL: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub repo_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub channel: String,
    pub r#type: String,
    pub severity: Severity,
    pub payload: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub r#type: String,
    pub payload: HashMap<String, Value>,
    pub severity: Severity,
    pub task_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub repo_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub channel: Option<String>,
}

impl Event {
    pub fn from_new(new: NewEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            repo_id: new.repo_id,
            agent_id: new.agent_id,
            task_id: new.task_id,
            recipient_id: new.recipient_id,
            parent_message_id: new.parent_message_id,
            channel: new.channel.unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            r#type: new.r#type,
            severity: new.severity,
            payload: new.payload,
            created_at: Utc::now(),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.recipient_id.is_none()
    }
}

/// Direction for `EventStore::list` ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Filter set accepted by `EventStore::list`. The upper bound on `limit`
/// (500) is enforced by the dispatcher layer, mirroring the original
/// service's `Query(..., le=500)` constraint, not by this struct.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub task_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub r#type: Option<String>,
    pub recipient_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub channel: Option<String>,
    pub payload_contains: Option<String>,
    pub include_broadcast: bool,
    pub since: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub direction: SortDirection,
    pub limit: i64,
}

impl EventFilter {
    pub fn new() -> Self {
        Self {
            direction: SortDirection::Desc,
            limit: 100,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_new_defaults_channel() {
        let event = Event::from_new(NewEvent {
            r#type: "task.created".to_string(),
            ..Default::default()
        });
        assert_eq!(event.channel, DEFAULT_CHANNEL);
        assert!(event.is_broadcast());
    }

    #[test]
    fn recipient_set_is_not_broadcast() {
        let event = Event::from_new(NewEvent {
            r#type: "direct".to_string(),
            recipient_id: Some(Uuid::new_v4()),
            ..Default::default()
        });
        assert!(!event.is_broadcast());
    }

    #[test]
    fn filter_defaults_to_desc_with_limit_100() {
        let filter = EventFilter::new();
        assert_eq!(filter.direction, SortDirection::Desc);
        assert_eq!(filter.limit, 100);
    }
}
