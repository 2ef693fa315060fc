//! SQLite implementation of the RepoRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::Repo;
use crate::domain::ports::RepoRepository;

#[derive(Clone)]
pub struct SqliteRepoRepository {
    pool: SqlitePool,
}

impl SqliteRepoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RepoRepository for SqliteRepoRepository {
    async fn create(&self, repo: &Repo) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO repos (id, name, root_path, default_branch, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(repo.id.to_string())
        .bind(&repo.name)
        .bind(&repo.root_path)
        .bind(&repo.default_branch)
        .bind(repo.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: uuid::Uuid) -> DomainResult<Option<Repo>> {
        let row: Option<RepoRow> = sqlx::query_as("SELECT * FROM repos WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_name(&self, name: &str) -> DomainResult<Option<Repo>> {
        let row: Option<RepoRow> = sqlx::query_as("SELECT * FROM repos WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<Repo>> {
        let rows: Vec<RepoRow> = sqlx::query_as("SELECT * FROM repos ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct RepoRow {
    id: String,
    name: String,
    root_path: String,
    default_branch: String,
    created_at: String,
}

impl TryFrom<RepoRow> for Repo {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: RepoRow) -> Result<Self, Self::Error> {
        Ok(Repo {
            id: super::parse_uuid(&row.id)?,
            name: row.name,
            root_path: row.root_path,
            default_branch: row.default_branch,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup() -> SqliteRepoRepository {
        SqliteRepoRepository::new(create_migrated_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn create_and_get() {
        let repo_store = setup().await;
        let repo = Repo::new("demo", "/srv/demo");
        repo_store.create(&repo).await.unwrap();

        let fetched = repo_store.get(repo.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "demo");
    }

    #[tokio::test]
    async fn find_by_name_missing() {
        let repo_store = setup().await;
        assert!(repo_store.find_by_name("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_orders_by_created_at_desc() {
        let repo_store = setup().await;
        let a = Repo::new("a", "/a");
        let b = Repo::new("b", "/b");
        repo_store.create(&a).await.unwrap();
        repo_store.create(&b).await.unwrap();

        let listed = repo_store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
    }
}
