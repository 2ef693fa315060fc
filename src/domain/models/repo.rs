//! Repo domain model.
//!
//! A `Repo` is the logical grouping for agents, tasks, and events operating
//! against one checked-out codebase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub id: Uuid,
    pub name: String,
    pub root_path: String,
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
}

impl Repo {
    pub fn new(name: impl Into<String>, root_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            root_path: root_path.into(),
            default_branch: "main".to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_repo_defaults_to_main() {
        let repo = Repo::new("widgets", "/srv/widgets");
        assert_eq!(repo.default_branch, "main");
        assert_eq!(repo.name, "widgets");
    }

    #[test]
    fn with_default_branch_overrides() {
        let repo = Repo::new("widgets", "/srv/widgets").with_default_branch("trunk");
        assert_eq!(repo.default_branch, "trunk");
    }
}
