//! Routing decision value type.
//!
//! Computed by the pure `RoutingPolicy::decide` function in
//! `services::routing_policy` and matched against agent capabilities by
//! `RoutingPolicy::supports`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub tier: String,
    pub profile: String,
    pub reason: String,
}

/// Placeholder kept for call sites that want the free function form; the
/// real implementation lives on `RoutingPolicy` in `services::routing_policy`
/// so it can be unit-tested alongside `decide`.
pub fn supports(model_tiers: &Option<Vec<String>>, adapter_profiles: &Option<Vec<String>>, decision: &RouteDecision) -> bool {
    let tier_ok = model_tiers.as_ref().map_or(true, |tiers| tiers.is_empty() || tiers.contains(&decision.tier));
    let profile_ok = adapter_profiles
        .as_ref()
        .map_or(true, |profiles| profiles.is_empty() || profiles.contains(&decision.profile));
    tier_ok && profile_ok
}
