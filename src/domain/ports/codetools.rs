//! CodeTools port: the `file.*` MCP tool boundary for reading and performing
//! literal search/replace edits against a task's adapter workspace.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::errors::DomainResult;

/// Result of a single `search_replace` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReplaceOutcome {
    pub occurrences_replaced: usize,
    pub bytes_before: usize,
    pub bytes_after: usize,
}

#[async_trait]
pub trait CodeTools: Send + Sync {
    async fn read_file(&self, root: &Path, relative_path: &str) -> DomainResult<String>;

    async fn write_file(&self, root: &Path, relative_path: &str, contents: &str) -> DomainResult<()>;

    /// Replaces every literal occurrence of `search` with `replace` in the file.
    /// Fails with `DomainError::Validation` if `search` does not occur at all.
    async fn search_replace(
        &self,
        root: &Path,
        relative_path: &str,
        search: &str,
        replace: &str,
    ) -> DomainResult<SearchReplaceOutcome>;

    async fn list_dir(&self, root: &Path, relative_path: &str) -> DomainResult<Vec<String>>;
}
