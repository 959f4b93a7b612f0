//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;

/// Repository record.
///
/// The manifest is stored verbatim; only the completion verifier decodes it.
/// `uploaded`, `checksummed` and `total_size` are written together by the
/// single completion write and reset on every repository replace.
#[derive(Debug, Clone, FromRow)]
pub struct RepositoryRow {
    pub namespace: String,
    pub name: String,
    pub manifest: Vec<u8>,
    pub is_private: bool,
    pub uploaded: bool,
    pub checksummed: bool,
    pub total_size: i64,
    pub user_agent: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Image record.
///
/// Blob payloads (json, layer, checksum) live in the blob store; this row
/// tracks upload state and the parent pointer.
#[derive(Debug, Clone, FromRow)]
pub struct ImageRow {
    pub image_id: String,
    pub parent_id: Option<String>,
    pub uploaded: bool,
    pub checksummed: bool,
    pub size: i64,
    pub checksum: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ImageRow {
    /// An image is complete once its layer is uploaded and its checksum
    /// recorded.
    pub fn is_complete(&self) -> bool {
        self.uploaded && self.checksummed
    }
}

/// Tag record mapping (namespace, repository, tag) to an image id.
#[derive(Debug, Clone, FromRow)]
pub struct TagRow {
    pub namespace: String,
    pub repository: String,
    pub tag: String,
    pub image_id: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// User record for the access gate.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub username: String,
    /// SHA-256 hex of the password.
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}
