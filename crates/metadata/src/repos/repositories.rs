//! Repository record operations.

use crate::error::MetadataResult;
use crate::models::RepositoryRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Operations on repository records.
#[async_trait]
pub trait RepositoryRepo: Send + Sync {
    /// Create or replace a repository record.
    ///
    /// A single atomic insert-or-overwrite: a replayed PUT converges to the
    /// same row, and a replace resets the completion flags and size for the
    /// new push.
    async fn upsert_repository(&self, repo: &RepositoryRow) -> MetadataResult<()>;

    /// Get a repository record.
    async fn get_repository(
        &self,
        namespace: &str,
        name: &str,
    ) -> MetadataResult<Option<RepositoryRow>>;

    /// Get a repository record only if its push has been finalized
    /// (uploaded = true).
    async fn get_active_repository(
        &self,
        namespace: &str,
        name: &str,
    ) -> MetadataResult<Option<RepositoryRow>>;

    /// Persist push completion: uploaded, checksummed and total_size in one
    /// write, so a failure cannot leave the flags half-updated.
    /// Returns NotFound if the repository does not exist.
    async fn complete_repository(
        &self,
        namespace: &str,
        name: &str,
        total_size: i64,
        completed_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Flip the privacy flag.
    /// Returns NotFound if the repository does not exist.
    async fn set_repository_privacy(
        &self,
        namespace: &str,
        name: &str,
        is_private: bool,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;
}
