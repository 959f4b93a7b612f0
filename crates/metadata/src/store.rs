//! Metadata store trait and implementations.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ImageRepo, RepositoryRepo, TagRepo, UserRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: RepositoryRepo + ImageRepo + TagRepo + UserRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection avoids
            // persistent "database is locked" failures under axum concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        for statement in SCHEMA_SQL {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::{ImageRow, RepositoryRow, TagRow, UserRow};
    use time::OffsetDateTime;

    #[async_trait]
    impl RepositoryRepo for SqliteStore {
        async fn upsert_repository(&self, repo: &RepositoryRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO repositories (
                    namespace, name, manifest, is_private, uploaded, checksummed,
                    total_size, user_agent, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(namespace, name) DO UPDATE SET
                    manifest = excluded.manifest,
                    is_private = excluded.is_private,
                    uploaded = excluded.uploaded,
                    checksummed = excluded.checksummed,
                    total_size = excluded.total_size,
                    user_agent = excluded.user_agent,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&repo.namespace)
            .bind(&repo.name)
            .bind(&repo.manifest)
            .bind(repo.is_private)
            .bind(repo.uploaded)
            .bind(repo.checksummed)
            .bind(repo.total_size)
            .bind(&repo.user_agent)
            .bind(repo.created_at)
            .bind(repo.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_repository(
            &self,
            namespace: &str,
            name: &str,
        ) -> MetadataResult<Option<RepositoryRow>> {
            let row = sqlx::query_as::<_, RepositoryRow>(
                "SELECT * FROM repositories WHERE namespace = ? AND name = ?",
            )
            .bind(namespace)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_active_repository(
            &self,
            namespace: &str,
            name: &str,
        ) -> MetadataResult<Option<RepositoryRow>> {
            let row = sqlx::query_as::<_, RepositoryRow>(
                "SELECT * FROM repositories WHERE namespace = ? AND name = ? AND uploaded = 1",
            )
            .bind(namespace)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn complete_repository(
            &self,
            namespace: &str,
            name: &str,
            total_size: i64,
            completed_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                r#"
                UPDATE repositories
                SET uploaded = 1, checksummed = 1, total_size = ?, updated_at = ?
                WHERE namespace = ? AND name = ?
                "#,
            )
            .bind(total_size)
            .bind(completed_at)
            .bind(namespace)
            .bind(name)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "repository {namespace}/{name} not found"
                )));
            }
            Ok(())
        }

        async fn set_repository_privacy(
            &self,
            namespace: &str,
            name: &str,
            is_private: bool,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE repositories SET is_private = ?, updated_at = ? WHERE namespace = ? AND name = ?",
            )
            .bind(is_private)
            .bind(updated_at)
            .bind(namespace)
            .bind(name)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "repository {namespace}/{name} not found"
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ImageRepo for SqliteStore {
        async fn upsert_image(&self, image: &ImageRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO images (
                    image_id, parent_id, uploaded, checksummed, size, checksum,
                    created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(image_id) DO UPDATE SET
                    parent_id = excluded.parent_id,
                    uploaded = excluded.uploaded,
                    checksummed = excluded.checksummed,
                    size = excluded.size,
                    checksum = excluded.checksum,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&image.image_id)
            .bind(&image.parent_id)
            .bind(image.uploaded)
            .bind(image.checksummed)
            .bind(image.size)
            .bind(&image.checksum)
            .bind(image.created_at)
            .bind(image.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_image(&self, image_id: &str) -> MetadataResult<Option<ImageRow>> {
            let row = sqlx::query_as::<_, ImageRow>("SELECT * FROM images WHERE image_id = ?")
                .bind(image_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn mark_image_uploaded(
            &self,
            image_id: &str,
            size: i64,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE images SET uploaded = 1, size = ?, updated_at = ? WHERE image_id = ?",
            )
            .bind(size)
            .bind(updated_at)
            .bind(image_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "image {image_id} not found"
                )));
            }
            Ok(())
        }

        async fn mark_image_checksummed(
            &self,
            image_id: &str,
            checksum: &str,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE images SET checksummed = 1, checksum = ?, updated_at = ? WHERE image_id = ?",
            )
            .bind(checksum)
            .bind(updated_at)
            .bind(image_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "image {image_id} not found"
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TagRepo for SqliteStore {
        async fn upsert_tag(&self, tag: &TagRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO tags (namespace, repository, tag, image_id, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(namespace, repository, tag) DO UPDATE SET
                    image_id = excluded.image_id,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&tag.namespace)
            .bind(&tag.repository)
            .bind(&tag.tag)
            .bind(&tag.image_id)
            .bind(tag.created_at)
            .bind(tag.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_tag(
            &self,
            namespace: &str,
            repository: &str,
            tag: &str,
        ) -> MetadataResult<Option<TagRow>> {
            let row = sqlx::query_as::<_, TagRow>(
                "SELECT * FROM tags WHERE namespace = ? AND repository = ? AND tag = ?",
            )
            .bind(namespace)
            .bind(repository)
            .bind(tag)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_tags(
            &self,
            namespace: &str,
            repository: &str,
        ) -> MetadataResult<Vec<TagRow>> {
            let rows = sqlx::query_as::<_, TagRow>(
                "SELECT * FROM tags WHERE namespace = ? AND repository = ? ORDER BY tag",
            )
            .bind(namespace)
            .bind(repository)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &UserRow) -> MetadataResult<()> {
            sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
                .bind(&user.username)
                .bind(&user.password_hash)
                .bind(user.created_at)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn get_user(&self, username: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }
    }
}

/// Schema statements executed by migrate(); each is idempotent.
const SCHEMA_SQL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS repositories (
        namespace TEXT NOT NULL,
        name TEXT NOT NULL,
        manifest BLOB NOT NULL,
        is_private INTEGER NOT NULL DEFAULT 0,
        uploaded INTEGER NOT NULL DEFAULT 0,
        checksummed INTEGER NOT NULL DEFAULT 0,
        total_size INTEGER NOT NULL DEFAULT 0,
        user_agent TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (namespace, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS images (
        image_id TEXT PRIMARY KEY,
        parent_id TEXT,
        uploaded INTEGER NOT NULL DEFAULT 0,
        checksummed INTEGER NOT NULL DEFAULT 0,
        size INTEGER NOT NULL DEFAULT 0,
        checksum TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        namespace TEXT NOT NULL,
        repository TEXT NOT NULL,
        tag TEXT NOT NULL,
        image_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (namespace, repository, tag)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        username TEXT PRIMARY KEY,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tags_repository ON tags (namespace, repository)",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageRow, RepositoryRow, TagRow, UserRow};
    use crate::repos::{ImageRepo, RepositoryRepo, TagRepo, UserRepo};
    use time::OffsetDateTime;

    async fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let temp = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("metadata.db"))
            .await
            .unwrap();
        (temp, store)
    }

    fn repo_row(namespace: &str, name: &str, manifest: &[u8]) -> RepositoryRow {
        let now = OffsetDateTime::now_utc();
        RepositoryRow {
            namespace: namespace.to_string(),
            name: name.to_string(),
            manifest: manifest.to_vec(),
            is_private: false,
            uploaded: false,
            checksummed: false,
            total_size: 0,
            user_agent: Some("docker/1.3.2".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn image_row(image_id: &str, parent_id: Option<&str>) -> ImageRow {
        let now = OffsetDateTime::now_utc();
        ImageRow {
            image_id: image_id.to_string(),
            parent_id: parent_id.map(str::to_string),
            uploaded: false,
            checksummed: false,
            size: 0,
            checksum: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn tag_row(namespace: &str, repository: &str, tag: &str, image_id: &str) -> TagRow {
        let now = OffsetDateTime::now_utc();
        TagRow {
            namespace: namespace.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
            image_id: image_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn repository_upsert_is_idempotent() {
        let (_temp, store) = test_store().await;

        let row = repo_row("alice", "demo", b"[]");
        store.upsert_repository(&row).await.unwrap();
        store.upsert_repository(&row).await.unwrap();

        let fetched = store.get_repository("alice", "demo").await.unwrap().unwrap();
        assert_eq!(fetched.manifest, b"[]");
        assert!(!fetched.uploaded);
    }

    #[tokio::test]
    async fn repository_replace_resets_completion() {
        let (_temp, store) = test_store().await;

        store
            .upsert_repository(&repo_row("alice", "demo", b"[1]"))
            .await
            .unwrap();
        store
            .complete_repository("alice", "demo", 350, OffsetDateTime::now_utc())
            .await
            .unwrap();

        let finalized = store.get_repository("alice", "demo").await.unwrap().unwrap();
        assert!(finalized.uploaded);
        assert!(finalized.checksummed);
        assert_eq!(finalized.total_size, 350);

        // A new push replaces the record and the completion state with it.
        store
            .upsert_repository(&repo_row("alice", "demo", b"[2]"))
            .await
            .unwrap();
        let replaced = store.get_repository("alice", "demo").await.unwrap().unwrap();
        assert_eq!(replaced.manifest, b"[2]");
        assert!(!replaced.uploaded);
        assert!(!replaced.checksummed);
        assert_eq!(replaced.total_size, 0);
    }

    #[tokio::test]
    async fn active_repository_requires_completion() {
        let (_temp, store) = test_store().await;

        store
            .upsert_repository(&repo_row("alice", "demo", b"[]"))
            .await
            .unwrap();
        assert!(
            store
                .get_active_repository("alice", "demo")
                .await
                .unwrap()
                .is_none()
        );

        store
            .complete_repository("alice", "demo", 0, OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(
            store
                .get_active_repository("alice", "demo")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn complete_repository_missing_is_not_found() {
        let (_temp, store) = test_store().await;

        let err = store
            .complete_repository("alice", "ghost", 10, OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        match err {
            MetadataError::NotFound(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn tag_upsert_inserts_and_overwrites() {
        let (_temp, store) = test_store().await;

        store
            .upsert_tag(&tag_row("alice", "demo", "latest", "aaa111"))
            .await
            .unwrap();
        // Same mapping again is a no-op, not an error.
        store
            .upsert_tag(&tag_row("alice", "demo", "latest", "aaa111"))
            .await
            .unwrap();

        let tag = store
            .get_tag("alice", "demo", "latest")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tag.image_id, "aaa111");

        // A new image id overwrites with no history retained.
        store
            .upsert_tag(&tag_row("alice", "demo", "latest", "bbb222"))
            .await
            .unwrap();
        let tag = store
            .get_tag("alice", "demo", "latest")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tag.image_id, "bbb222");

        let all = store.list_tags("alice", "demo").await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn list_tags_is_ordered_by_name() {
        let (_temp, store) = test_store().await;

        store
            .upsert_tag(&tag_row("alice", "demo", "v2", "bbb"))
            .await
            .unwrap();
        store
            .upsert_tag(&tag_row("alice", "demo", "latest", "aaa"))
            .await
            .unwrap();

        let tags = store.list_tags("alice", "demo").await.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(names, ["latest", "v2"]);
    }

    #[tokio::test]
    async fn image_upload_lifecycle() {
        let (_temp, store) = test_store().await;

        store
            .upsert_image(&image_row("aaa111", Some("parent0")))
            .await
            .unwrap();
        let image = store.get_image("aaa111").await.unwrap().unwrap();
        assert_eq!(image.parent_id.as_deref(), Some("parent0"));
        assert!(!image.is_complete());

        store
            .mark_image_uploaded("aaa111", 100, OffsetDateTime::now_utc())
            .await
            .unwrap();
        let image = store.get_image("aaa111").await.unwrap().unwrap();
        assert!(image.uploaded);
        assert_eq!(image.size, 100);
        assert!(!image.is_complete());

        store
            .mark_image_checksummed("aaa111", "sha256:cafe", OffsetDateTime::now_utc())
            .await
            .unwrap();
        let image = store.get_image("aaa111").await.unwrap().unwrap();
        assert!(image.is_complete());
        assert_eq!(image.checksum.as_deref(), Some("sha256:cafe"));
    }

    #[tokio::test]
    async fn image_reupload_resets_state() {
        let (_temp, store) = test_store().await;

        store.upsert_image(&image_row("aaa111", None)).await.unwrap();
        store
            .mark_image_uploaded("aaa111", 100, OffsetDateTime::now_utc())
            .await
            .unwrap();

        // The client re-pushes the same image id; state starts over.
        store.upsert_image(&image_row("aaa111", None)).await.unwrap();
        let image = store.get_image("aaa111").await.unwrap().unwrap();
        assert!(!image.uploaded);
        assert_eq!(image.size, 0);
    }

    #[tokio::test]
    async fn mark_missing_image_is_not_found() {
        let (_temp, store) = test_store().await;

        let err = store
            .mark_image_uploaded("ghost", 1, OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        match err {
            MetadataError::NotFound(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn user_create_and_get() {
        let (_temp, store) = test_store().await;

        let user = UserRow {
            username: "alice".to_string(),
            password_hash: "ab".repeat(32),
            created_at: OffsetDateTime::now_utc(),
        };
        store.create_user(&user).await.unwrap();

        let fetched = store.get_user("alice").await.unwrap().unwrap();
        assert_eq!(fetched.password_hash, user.password_hash);
        assert!(store.get_user("bob").await.unwrap().is_none());

        // Duplicate usernames are rejected by the primary key.
        assert!(store.create_user(&user).await.is_err());
    }
}
