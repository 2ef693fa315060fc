//! SQLite implementation of the ArtifactRepository.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Artifact;
use crate::domain::ports::ArtifactRepository;

#[derive(Clone)]
pub struct SqliteArtifactRepository {
    pool: SqlitePool,
}

impl SqliteArtifactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactRepository for SqliteArtifactRepository {
    async fn create(&self, artifact: &Artifact) -> DomainResult<()> {
        let metadata_json = serde_json::to_string(&artifact.metadata)?;
        sqlx::query(
            "INSERT INTO artifacts (id, task_id, kind, uri, metadata, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(artifact.id.to_string())
        .bind(artifact.task_id.to_string())
        .bind(&artifact.kind)
        .bind(&artifact.uri)
        .bind(&metadata_json)
        .bind(artifact.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Artifact>> {
        let row: Option<ArtifactRow> = sqlx::query_as("SELECT * FROM artifacts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_task(&self, task_id: Uuid) -> DomainResult<Vec<Artifact>> {
        let rows: Vec<ArtifactRow> = sqlx::query_as(
            "SELECT * FROM artifacts WHERE task_id = ? ORDER BY created_at DESC",
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    id: String,
    task_id: String,
    kind: String,
    uri: String,
    metadata: Option<String>,
    created_at: String,
}

impl TryFrom<ArtifactRow> for Artifact {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        let metadata: HashMap<String, serde_json::Value> = super::parse_json_or_default(row.metadata)?;
        Ok(Artifact {
            id: super::parse_uuid(&row.id)?,
            task_id: super::parse_uuid(&row.task_id)?,
            kind: row.kind,
            uri: row.uri,
            metadata,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    #[tokio::test]
    async fn create_and_list_for_task() {
        let repo = SqliteArtifactRepository::new(create_migrated_test_pool().await.unwrap());
        let task_id = Uuid::new_v4();
        let artifact = Artifact::new(task_id, "patch", "file:///tmp/out.diff");
        repo.create(&artifact).await.unwrap();

        let listed = repo.list_for_task(task_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].kind, "patch");
    }
}
