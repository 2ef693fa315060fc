//! `SQLite` connection pool management.
//!
//! Wraps a `sqlx::SqlitePool` configured for WAL-mode concurrent access and
//! drives the embedded migration runner (see `adapters::sqlite::migrations`).

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};

use crate::adapters::sqlite::migrations::{all_embedded_migrations, Migrator};
use crate::domain::errors::DomainError;

/// Owns the pool and drives startup migrations.
pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Connect with WAL journaling, a 5s busy timeout, and a 5-10 connection pool.
    pub async fn new(database_url: &str) -> Result<Self, DomainError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DomainError::Database(format!("invalid database URL: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(5)
            .max_connections(10)
            .idle_timeout(Duration::from_secs(30))
            .max_lifetime(Duration::from_secs(1800))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| DomainError::Database(format!("failed to create connection pool: {e}")))?;

        Ok(Self { pool })
    }

    /// Apply all embedded migrations that haven't run yet. Idempotent.
    pub async fn migrate(&self) -> Result<(), DomainError> {
        let migrator = Migrator::new(self.pool.clone());
        migrator
            .run_embedded_migrations(all_embedded_migrations())
            .await
            .map_err(|e| DomainError::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connection_pool_creation() {
        let db = DatabaseConnection::new("sqlite::memory:").await.expect("connect");
        assert!(!db.pool().is_closed());
        db.close().await;
    }

    #[tokio::test]
    async fn migration_creates_core_tables() {
        let db = DatabaseConnection::new("sqlite::memory:").await.expect("connect");
        db.migrate().await.expect("migrate");

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .expect("query tables");
        let names: Vec<String> = tables.into_iter().map(|t| t.0).collect();

        for expected in ["repos", "agents", "agent_sessions", "tasks", "task_claims", "resource_locks", "events", "artifacts"] {
            assert!(names.contains(&expected.to_string()), "missing table {expected}");
        }
        db.close().await;
    }

    #[tokio::test]
    async fn foreign_keys_enabled() {
        let db = DatabaseConnection::new("sqlite::memory:").await.expect("connect");
        let result: (i32,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(db.pool()).await.expect("pragma");
        assert_eq!(result.0, 1);
        db.close().await;
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let db = DatabaseConnection::new("sqlite::memory:").await.expect("connect");
        db.migrate().await.expect("first migrate");
        db.migrate().await.expect("second migrate should be a no-op");
        db.close().await;
    }
}
