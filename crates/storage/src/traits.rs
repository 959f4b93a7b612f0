//! Blob store trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads and writes.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// The payload kinds stored per image id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlobKind {
    /// Image JSON metadata.
    Json,
    /// Layer filesystem delta.
    Layer,
    /// Client-reported layer checksum.
    Checksum,
}

impl BlobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Layer => "layer",
            Self::Checksum => "checksum",
        }
    }
}

impl fmt::Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Blob store abstraction keyed by (image id, kind).
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Check if a blob exists.
    async fn exists(&self, image_id: &str, kind: BlobKind) -> StorageResult<bool>;

    /// Get a blob's content.
    async fn get(&self, image_id: &str, kind: BlobKind) -> StorageResult<Bytes>;

    /// Get a blob as a byte stream.
    async fn get_stream(&self, image_id: &str, kind: BlobKind) -> StorageResult<ByteStream>;

    /// Get a blob's size without fetching content.
    async fn size(&self, image_id: &str, kind: BlobKind) -> StorageResult<u64>;

    /// Put a blob atomically.
    async fn put(&self, image_id: &str, kind: BlobKind, data: Bytes) -> StorageResult<()>;

    /// Put a blob atomically from a byte stream, returning the bytes written.
    async fn put_stream(
        &self,
        image_id: &str,
        kind: BlobKind,
        stream: ByteStream,
    ) -> StorageResult<u64>;

    /// Get the name of this storage backend.
    fn backend_name(&self) -> &'static str;
}
