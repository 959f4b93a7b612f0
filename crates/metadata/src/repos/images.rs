//! Image record operations.

use crate::error::MetadataResult;
use crate::models::ImageRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Operations on image records.
#[async_trait]
pub trait ImageRepo: Send + Sync {
    /// Create or refresh an image record from a JSON upload.
    ///
    /// Content-addressed ids make concurrent identical uploads idempotent; a
    /// re-pushed image resets its upload and checksum state.
    async fn upsert_image(&self, image: &ImageRow) -> MetadataResult<()>;

    /// Get an image record.
    async fn get_image(&self, image_id: &str) -> MetadataResult<Option<ImageRow>>;

    /// Record a completed layer upload: the size and the uploaded flag, one
    /// write. Returns NotFound if the image does not exist.
    async fn mark_image_uploaded(
        &self,
        image_id: &str,
        size: i64,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Record the client checksum: the stored value and the checksummed flag,
    /// one write. Returns NotFound if the image does not exist.
    async fn mark_image_checksummed(
        &self,
        image_id: &str,
        checksum: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;
}
