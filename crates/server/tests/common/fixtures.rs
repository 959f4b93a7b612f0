//! Test fixtures.

use base64::{Engine as _, engine::general_purpose};
use capstan_core::access::credential_hash;
use capstan_metadata::MetadataStore;
use capstan_metadata::models::UserRow;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use time::OffsetDateTime;

/// Deterministic 64-hex image id from a seed.
#[allow(dead_code)]
pub fn image_id(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Basic auth header value for a username/password pair.
#[allow(dead_code)]
pub fn basic_auth(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{username}:{password}"))
    )
}

/// Create a user with the given credentials.
#[allow(dead_code)]
pub async fn create_user(metadata: &Arc<dyn MetadataStore>, username: &str, password: &str) {
    metadata
        .create_user(&UserRow {
            username: username.to_string(),
            password_hash: credential_hash(password),
            created_at: OffsetDateTime::now_utc(),
        })
        .await
        .expect("Failed to create user");
}
