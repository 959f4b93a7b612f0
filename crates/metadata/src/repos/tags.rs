//! Tag mapping operations.

use crate::error::MetadataResult;
use crate::models::TagRow;
use async_trait::async_trait;

/// Operations on tag mappings.
#[async_trait]
pub trait TagRepo: Send + Sync {
    /// Atomic insert-or-overwrite of a tag mapping. No history is kept and
    /// the image id is not checked for existence; referential integrity is
    /// enforced only at finalize time, against the manifest.
    async fn upsert_tag(&self, tag: &TagRow) -> MetadataResult<()>;

    /// Get a tag mapping.
    async fn get_tag(
        &self,
        namespace: &str,
        repository: &str,
        tag: &str,
    ) -> MetadataResult<Option<TagRow>>;

    /// All tags of a repository, ordered by tag name.
    async fn list_tags(&self, namespace: &str, repository: &str) -> MetadataResult<Vec<TagRow>>;
}
