//! `SQLite` adapters for the RepoMesh coordination engine's repository ports.

pub mod agent_repository;
pub mod artifact_repository;
pub mod event_repository;
pub mod lock_repository;
pub mod migrations;
pub mod repo_repository;
pub mod session_repository;
pub mod task_repository;

pub use agent_repository::SqliteAgentRepository;
pub use artifact_repository::SqliteArtifactRepository;
pub use event_repository::SqliteEventRepository;
pub use lock_repository::SqliteLockRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use repo_repository::SqliteRepoRepository;
pub use session_repository::SqliteSessionRepository;
pub use task_repository::SqliteTaskRepository;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Parse a UUID string from a SQLite row field.
pub fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::Validation(format!("invalid uuid: {e}")))
}

/// Parse an optional UUID string from a SQLite row field.
pub fn parse_optional_uuid(s: Option<String>) -> DomainResult<Option<Uuid>> {
    s.map(|s| Uuid::parse_str(&s))
        .transpose()
        .map_err(|e| DomainError::Validation(format!("invalid uuid: {e}")))
}

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::Validation(format!("invalid timestamp: {e}")))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an optional RFC3339 datetime string from a SQLite row field.
pub fn parse_optional_datetime(s: Option<String>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| DomainError::Validation(format!("invalid timestamp: {e}")))
}

/// Parse a JSON object column, falling back to the type's default when absent.
pub fn parse_json_or_default<T: serde::de::DeserializeOwned + Default>(s: Option<String>) -> DomainResult<T> {
    s.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| DomainError::Validation(format!("invalid json: {e}")))
        .map(|opt| opt.unwrap_or_default())
}

/// Create an in-memory pool with all migrations applied, for repository unit tests.
pub async fn create_migrated_test_pool() -> DomainResult<SqlitePool> {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    let migrator = Migrator::new(pool.clone());
    migrator
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .map_err(|e| DomainError::Database(e.to_string()))?;
    Ok(pool)
}
