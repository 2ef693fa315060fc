//! Property-based check that routing decisions depend only on the task
//! passed in: calling `decide` twice on independently constructed tasks
//! with the same fields must always agree.

use proptest::prelude::*;
use repomesh::domain::models::Task;
use repomesh::services::RoutingPolicy;
use std::collections::HashMap;

proptest! {
    #[test]
    fn decide_is_a_pure_function_of_task_fields(priority in -5i32..20, tier_override in proptest::option::of("[a-z]{3,8}")) {
        let mut scope = HashMap::new();
        if let Some(ref tier) = tier_override {
            scope.insert("tier".to_string(), serde_json::json!(tier));
        }

        let task_a = Task::new("goal", "desc", scope.clone(), priority, None);
        let task_b = Task::new("goal", "desc", scope, priority, None);

        let decision_a = RoutingPolicy::decide(&task_a);
        let decision_b = RoutingPolicy::decide(&task_b);

        prop_assert_eq!(decision_a.tier, decision_b.tier);
        prop_assert_eq!(decision_a.profile, decision_b.profile);
        prop_assert_eq!(decision_a.reason, decision_b.reason);
    }
}
