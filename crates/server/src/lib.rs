//! HTTP API server for the Capstan Docker Registry v1.
//!
//! This crate provides the HTTP control plane:
//! - Repository upsert and tag upsert
//! - Push finalization with completion verification
//! - Repository manifest/tag read path
//! - Per-image JSON/layer/checksum upload and download
//! - Ancestry resolution

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod headers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
