//! Routing Policy: pure function `decide(task) -> RouteDecision`, and
//! `supports(agent, decision)` capability matching. No I/O, no service state.

use crate::domain::models::{Agent, RouteDecision, Task};

pub struct RoutingPolicy;

impl RoutingPolicy {
    /// `Task -> {tier, profile, reason}`. Depends only on the task's own
    /// fields; no I/O or lookups.
    pub fn decide(task: &Task) -> RouteDecision {
        let adapter_tier = task.adapter_scope().and_then(|a| a.get("tier")).and_then(|v| v.as_str());
        let scope_tier = task.scope.get("tier").and_then(|v| v.as_str());

        let (tier, reason) = if let Some(tier) = adapter_tier.or(scope_tier) {
            (tier.to_string(), "scope override".to_string())
        } else if task.priority >= 4 {
            ("frontier".to_string(), "priority>=4".to_string())
        } else {
            ("small".to_string(), "default".to_string())
        };

        let profile = task
            .adapter_scope()
            .and_then(|a| a.get("profile"))
            .and_then(|v| v.as_str())
            .or_else(|| task.scope.get("adapter_profile").and_then(|v| v.as_str()))
            .unwrap_or("generic-shell")
            .to_string();

        RouteDecision { tier, profile, reason }
    }

    /// Whether `agent` is eligible to receive work routed to `decision`.
    /// Missing capability lists imply "accepts anything".
    pub fn supports(agent: &Agent, decision: &RouteDecision) -> bool {
        let tiers = agent.capability_list("model_tiers");
        let tier_ok = tiers.as_ref().map_or(true, |t| t.is_empty() || t.contains(&decision.tier));

        let profiles = agent.capability_list("adapter_profiles");
        let profile_ok = profiles.as_ref().map_or(true, |p| p.is_empty() || p.contains(&decision.profile));

        tier_ok && profile_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn task_with_priority(priority: i32) -> Task {
        Task::new("goal", "", HashMap::new(), priority, None)
    }

    #[test]
    fn high_priority_routes_to_frontier() {
        let decision = RoutingPolicy::decide(&task_with_priority(4));
        assert_eq!(decision.tier, "frontier");
        assert_eq!(decision.reason, "priority>=4");
    }

    #[test]
    fn low_priority_routes_to_small() {
        let decision = RoutingPolicy::decide(&task_with_priority(1));
        assert_eq!(decision.tier, "small");
        assert_eq!(decision.reason, "default");
    }

    #[test]
    fn scope_adapter_tier_overrides() {
        let mut scope = HashMap::new();
        scope.insert("adapter".to_string(), json!({"tier": "mid"}));
        let task = Task::new("goal", "", scope, 1, None);
        let decision = RoutingPolicy::decide(&task);
        assert_eq!(decision.tier, "mid");
        assert_eq!(decision.reason, "scope override");
    }

    #[test]
    fn default_profile_is_generic_shell() {
        let decision = RoutingPolicy::decide(&task_with_priority(1));
        assert_eq!(decision.profile, "generic-shell");
    }

    #[test]
    fn supports_rejects_non_matching_tier() {
        let mut caps = HashMap::new();
        caps.insert("model_tiers".to_string(), json!(["small"]));
        let agent = Agent::new("w", "worker", None).with_capabilities(caps);
        let decision = RouteDecision { tier: "frontier".to_string(), profile: "generic-shell".to_string(), reason: "x".to_string() };
        assert!(!RoutingPolicy::supports(&agent, &decision));
    }

    #[test]
    fn supports_accepts_when_capabilities_unset() {
        let agent = Agent::new("w", "worker", None);
        let decision = RouteDecision { tier: "frontier".to_string(), profile: "generic-shell".to_string(), reason: "x".to_string() };
        assert!(RoutingPolicy::supports(&agent, &decision));
        let _ = Uuid::new_v4();
    }
}
