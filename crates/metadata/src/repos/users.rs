//! User identity operations.

use crate::error::MetadataResult;
use crate::models::UserRow;
use async_trait::async_trait;

/// Operations on user identities.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user. Fails on a duplicate username.
    async fn create_user(&self, user: &UserRow) -> MetadataResult<()>;

    /// Look a user up by username.
    async fn get_user(&self, username: &str) -> MetadataResult<Option<UserRow>>;
}
