//! Agent domain model.
//!
//! An `Agent` is a coordinator-registered worker process. `(name, repo_id)`
//! is treated as a reusable identity slot by `AgentService::register` — see
//! `services::agent_service`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Liveness status of an agent, derived from its sessions by
/// `AgentService::mark_stale_sessions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
    Stale,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Stale => "stale",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "stale" => Some(Self::Stale),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub repo_id: Option<Uuid>,
    pub name: String,
    /// Agent kind, e.g. "worker", "orchestrator". Not a closed enum: callers
    /// are free to register any string, matched by `RoutingPolicy::supports`.
    pub r#type: String,
    pub status: AgentStatus,
    pub capabilities: HashMap<String, Value>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reserved `type` for the singleton orchestrator agent created by
/// `OrchestratorEngine::run_once`; excluded from worker candidate pools.
pub const ORCHESTRATOR_AGENT_TYPE: &str = "orchestrator";

impl Agent {
    pub fn new(name: impl Into<String>, agent_type: impl Into<String>, repo_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            repo_id,
            name: name.into(),
            r#type: agent_type.into(),
            status: AgentStatus::Active,
            capabilities: HashMap::new(),
            last_heartbeat_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_capabilities(mut self, capabilities: HashMap<String, Value>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// `capabilities.model_tiers` as a string list, used by `RoutingPolicy::supports`.
    pub fn capability_list(&self, key: &str) -> Option<Vec<String>> {
        self.capabilities.get(key)?.as_array().map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
    }

    pub fn is_orchestrator(&self) -> bool {
        self.r#type == ORCHESTRATOR_AGENT_TYPE
    }

    pub fn touch_heartbeat(&mut self, status: AgentStatus) {
        self.status = status;
        self.last_heartbeat_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_agent_starts_active_with_no_heartbeat() {
        let agent = Agent::new("worker-1", "worker", None);
        assert_eq!(agent.status, AgentStatus::Active);
        assert!(agent.last_heartbeat_at.is_none());
    }

    #[test]
    fn capability_list_reads_string_arrays() {
        let mut caps = HashMap::new();
        caps.insert("model_tiers".to_string(), json!(["small", "frontier"]));
        let agent = Agent::new("worker-1", "worker", None).with_capabilities(caps);
        assert_eq!(
            agent.capability_list("model_tiers"),
            Some(vec!["small".to_string(), "frontier".to_string()])
        );
        assert_eq!(agent.capability_list("adapter_profiles"), None);
    }

    #[test]
    fn is_orchestrator_checks_type() {
        let agent = Agent::new("orchestrator", ORCHESTRATOR_AGENT_TYPE, None);
        assert!(agent.is_orchestrator());
        let worker = Agent::new("w", "worker", None);
        assert!(!worker.is_orchestrator());
    }
}
