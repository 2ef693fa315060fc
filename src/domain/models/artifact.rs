//! Artifact domain model.
//!
//! Produced by execution; referenced but not mutated after creation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub task_id: Uuid,
    pub kind: String,
    pub uri: String,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(task_id: Uuid, kind: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            kind: kind.into(),
            uri: uri.into(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_artifact_has_empty_metadata() {
        let artifact = Artifact::new(Uuid::new_v4(), "patch", "file:///tmp/out.diff");
        assert!(artifact.metadata.is_empty());
        assert_eq!(artifact.kind, "patch");
    }
}
