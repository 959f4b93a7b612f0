//! Core domain types and shared logic for the Capstan registry.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Image identifiers and the permissive id extraction used by tag upserts
//! - Repository paths (namespace/name)
//! - Manifest decoding for the completion verifier
//! - Ephemeral access grants and v1 registry tokens
//! - Configuration types

pub mod access;
pub mod config;
pub mod error;
pub mod image;
pub mod manifest;
pub mod repo;

pub use access::{Access, AccessGrant, Identity, RegistryToken, credential_hash};
pub use error::{Error, Result};
pub use image::{ImageId, extract_image_id};
pub use manifest::{ManifestEntry, decode_manifest};
pub use repo::RepoPath;

/// Maximum length of an image id.
pub const MAX_IMAGE_ID_LEN: usize = 64;

/// Maximum length of a namespace or repository name component.
pub const MAX_NAME_LEN: usize = 64;
