//! AgentSession domain model.
//!
//! A time-bounded liveness token for an agent. An agent has zero or more
//! historical sessions; at most one is active per agent (enforced by
//! `AgentService`, not by the model itself).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Stale,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Stale => "stale",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "stale" => Some(Self::Stale),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub status: SessionStatus,
    pub current_task_id: Option<Uuid>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AgentSession {
    pub fn new(agent_id: Uuid, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            agent_id,
            status: SessionStatus::Active,
            current_task_id: None,
            last_heartbeat_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Refresh heartbeat and extend expiry by `ttl_seconds` from `now`.
    pub fn renew(&mut self, now: DateTime<Utc>, ttl_seconds: i64) {
        self.last_heartbeat_at = now;
        self.expires_at = now + Duration::seconds(ttl_seconds);
        self.status = SessionStatus::Active;
    }

    pub fn mark_stale(&mut self) {
        self.status = SessionStatus::Stale;
    }
}
