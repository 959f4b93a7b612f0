//! Startup bootstrap: seed configured users.

use capstan_core::config::UserConfig;
use capstan_metadata::models::UserRow;
use capstan_metadata::{MetadataResult, MetadataStore};
use std::sync::Arc;
use time::OffsetDateTime;

/// Ensure every configured user exists. Existing users are left untouched so
/// a password change in the config does not silently rewrite credentials.
pub async fn ensure_users(
    metadata: &Arc<dyn MetadataStore>,
    users: &[UserConfig],
) -> MetadataResult<()> {
    for user in users {
        if metadata.get_user(&user.username).await?.is_some() {
            tracing::debug!(username = %user.username, "configured user already exists");
            continue;
        }
        metadata
            .create_user(&UserRow {
                username: user.username.clone(),
                password_hash: user.password_hash.clone(),
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;
        tracing::info!(username = %user.username, "created configured user");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstan_metadata::SqliteStore;

    async fn test_metadata() -> (tempfile::TempDir, Arc<dyn MetadataStore>) {
        let temp = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("metadata.db"))
            .await
            .unwrap();
        (temp, Arc::new(store))
    }

    #[tokio::test]
    async fn ensure_users_creates_missing_and_is_idempotent() {
        let (_temp, metadata) = test_metadata().await;
        let users = vec![UserConfig {
            username: "alice".to_string(),
            password_hash: "ab".repeat(32),
        }];

        ensure_users(&metadata, &users).await.unwrap();
        ensure_users(&metadata, &users).await.unwrap();

        let user = metadata.get_user("alice").await.unwrap().unwrap();
        assert_eq!(user.password_hash, "ab".repeat(32));
    }

    #[tokio::test]
    async fn ensure_users_does_not_rewrite_existing_credentials() {
        let (_temp, metadata) = test_metadata().await;

        ensure_users(
            &metadata,
            &[UserConfig {
                username: "alice".to_string(),
                password_hash: "aa".repeat(32),
            }],
        )
        .await
        .unwrap();

        // Changed hash in config; the stored credential wins.
        ensure_users(
            &metadata,
            &[UserConfig {
                username: "alice".to_string(),
                password_hash: "bb".repeat(32),
            }],
        )
        .await
        .unwrap();

        let user = metadata.get_user("alice").await.unwrap().unwrap();
        assert_eq!(user.password_hash, "aa".repeat(32));
    }
}
