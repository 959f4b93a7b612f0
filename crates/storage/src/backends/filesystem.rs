//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobKind, BlobStore, ByteStream};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem blob store.
///
/// Blobs live at `images/<first two id chars>/<id>/<kind>`. Writes go
/// through a temp file in the destination directory followed by an atomic
/// rename, so readers never observe a partial blob.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve the path for a blob. Image ids are restricted to ASCII
    /// alphanumerics, so a hostile id cannot escape the root.
    fn blob_path(&self, image_id: &str, kind: BlobKind) -> StorageResult<PathBuf> {
        if image_id.is_empty()
            || image_id.len() > capstan_core::MAX_IMAGE_ID_LEN
            || !image_id.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(StorageError::InvalidKey(format!(
                "invalid image id: {image_id}"
            )));
        }
        let prefix = &image_id[..image_id.len().min(2)];
        Ok(self
            .root
            .join("images")
            .join(prefix)
            .join(image_id)
            .join(kind.as_str()))
    }

    async fn open_temp(&self, path: &Path, kind: BlobKind) -> StorageResult<(PathBuf, fs::File)> {
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(parent).await?;
        let tmp = parent.join(format!(".{}.tmp-{}", kind.as_str(), Uuid::new_v4()));
        let file = fs::File::create(&tmp).await?;
        Ok((tmp, file))
    }
}

#[async_trait]
impl BlobStore for FilesystemBackend {
    async fn exists(&self, image_id: &str, kind: BlobKind) -> StorageResult<bool> {
        let path = self.blob_path(image_id, kind)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn get(&self, image_id: &str, kind: BlobKind) -> StorageResult<Bytes> {
        let path = self.blob_path(image_id, kind)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{image_id}/{kind}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_stream(&self, image_id: &str, kind: BlobKind) -> StorageResult<ByteStream> {
        let path = self.blob_path(image_id, kind)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{image_id}/{kind}")));
            }
            Err(e) => return Err(e.into()),
        };

        let stream = futures::stream::unfold(file, |mut file| async move {
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    Some((Ok(Bytes::from(buf)), file))
                }
                Err(e) => Some((Err(StorageError::Io(e)), file)),
            }
        });
        Ok(Box::pin(stream))
    }

    async fn size(&self, image_id: &str, kind: BlobKind) -> StorageResult<u64> {
        let path = self.blob_path(image_id, kind)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{image_id}/{kind}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, image_id: &str, kind: BlobKind, data: Bytes) -> StorageResult<()> {
        let path = self.blob_path(image_id, kind)?;
        let (tmp, mut file) = self.open_temp(&path, kind).await?;

        let result = async {
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &path).await?;
            Ok(())
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        result
    }

    async fn put_stream(
        &self,
        image_id: &str,
        kind: BlobKind,
        mut stream: ByteStream,
    ) -> StorageResult<u64> {
        let path = self.blob_path(image_id, kind)?;
        let (tmp, mut file) = self.open_temp(&path, kind).await?;

        let result = async {
            let mut written: u64 = 0;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &path).await?;
            Ok(written)
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp).await;
        }
        result
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
