//! Metadata store abstraction and implementations for Capstan.
//!
//! This crate provides the control-plane data model:
//! - Repository records with opaque manifests and completion flags
//! - Image upload/checksum state and parent pointers
//! - Tag mappings
//! - User identities for the access gate

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};

use capstan_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
