//! Plain-text `CodeTools` implementation: reads, writes, and literal
//! search/replace against files rooted at an adapter's workspace directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{CodeTools, SearchReplaceOutcome};

#[derive(Debug, Default, Clone, Copy)]
pub struct FsCodeTools;

impl FsCodeTools {
    /// Resolve `relative_path` against `root`, rejecting any path that
    /// escapes the root via `..` components.
    fn resolve(root: &Path, relative_path: &str) -> DomainResult<PathBuf> {
        let candidate = root.join(relative_path);
        let root_abs = root
            .canonicalize()
            .map_err(|e| DomainError::Validation(format!("invalid workspace root: {e}")))?;
        let parent = candidate.parent().unwrap_or(root);
        let parent_abs = parent
            .canonicalize()
            .map_err(|e| DomainError::Validation(format!("path does not exist: {e}")))?;
        if !parent_abs.starts_with(&root_abs) {
            return Err(DomainError::Validation(format!(
                "path {relative_path} escapes workspace root"
            )));
        }
        Ok(candidate)
    }
}

#[async_trait]
impl CodeTools for FsCodeTools {
    async fn read_file(&self, root: &Path, relative_path: &str) -> DomainResult<String> {
        let path = Self::resolve(root, relative_path)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DomainError::NotFound(format!("cannot read {relative_path}: {e}")))
    }

    async fn write_file(&self, root: &Path, relative_path: &str, contents: &str) -> DomainResult<()> {
        let path = Self::resolve(root, relative_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Validation(format!("cannot create directory: {e}")))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| DomainError::Validation(format!("cannot write {relative_path}: {e}")))
    }

    async fn search_replace(
        &self,
        root: &Path,
        relative_path: &str,
        search: &str,
        replace: &str,
    ) -> DomainResult<SearchReplaceOutcome> {
        let before = self.read_file(root, relative_path).await?;
        let occurrences_replaced = before.matches(search).count();
        if occurrences_replaced == 0 {
            return Err(DomainError::Validation(format!(
                "search text not found in {relative_path}"
            )));
        }
        let after = before.replace(search, replace);
        let bytes_before = before.len();
        let bytes_after = after.len();
        self.write_file(root, relative_path, &after).await?;
        Ok(SearchReplaceOutcome { occurrences_replaced, bytes_before, bytes_after })
    }

    async fn list_dir(&self, root: &Path, relative_path: &str) -> DomainResult<Vec<String>> {
        let path = Self::resolve(root, relative_path)?;
        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| DomainError::NotFound(format!("cannot list {relative_path}: {e}")))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DomainError::Validation(e.to_string()))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
