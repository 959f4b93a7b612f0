//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid image id: {0}")]
    InvalidImageId(String),

    #[error("invalid repository path: {0}")]
    InvalidRepoPath(String),

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
