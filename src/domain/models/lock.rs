//! ResourceLock domain model.
//!
//! A leased exclusive ownership over a string `resource_key`. Invariant
//! (enforced by `LockService`, via a sweep-then-check-then-write pattern):
//! at most one active lock per `resource_key` at any instant.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Active,
    Released,
    Expired,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Released => "released",
            Self::Expired => "expired",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "released" => Some(Self::Released),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLock {
    pub id: Uuid,
    pub resource_key: String,
    pub owner_agent_id: Uuid,
    pub state: LockState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl ResourceLock {
    pub fn new(resource_key: impl Into<String>, owner_agent_id: Uuid, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            resource_key: resource_key.into(),
            owner_agent_id,
            state: LockState::Active,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
            released_at: None,
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state == LockState::Active && self.expires_at >= now
    }

    pub fn extend(&mut self, now: DateTime<Utc>, ttl_seconds: i64) {
        self.expires_at = now + Duration::seconds(ttl_seconds);
    }

    pub fn expire(&mut self) {
        self.state = LockState::Expired;
    }

    pub fn release(&mut self, now: DateTime<Utc>) {
        self.state = LockState::Released;
        self.released_at = Some(now);
    }
}
