//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted manifest body size in bytes.
    #[serde(default = "default_max_manifest_size")]
    pub max_manifest_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_manifest_size: default_max_manifest_size(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_max_manifest_size() -> usize {
    1024 * 1024 // 1 MiB; a manifest is a short list of ids and tags
}

/// Registry identity advertised on every response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Value of the X-Docker-Registry-Version header.
    #[serde(default = "default_version")]
    pub version: String,
    /// Value of the X-Docker-Registry-Config header (deployment flavor).
    #[serde(default = "default_flavor")]
    pub config: String,
    /// Whether X-Docker-Encrypt advertises encrypted storage.
    #[serde(default)]
    pub encrypt: bool,
    /// Value of the X-Docker-Endpoints header handed to clients that request
    /// a token.
    #[serde(default = "default_endpoints")]
    pub endpoints: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            config: default_flavor(),
            encrypt: false,
            endpoints: default_endpoints(),
        }
    }
}

fn default_version() -> String {
    "0.9.1".to_string()
}

fn default_flavor() -> String {
    "dev".to_string()
}

fn default_endpoints() -> String {
    "127.0.0.1:5000".to_string()
}

/// Blob storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for blobs.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/blobs"),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite-backed metadata store.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
        }
    }
}

/// A user seeded at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    /// Pre-computed SHA-256 hex of the password (64 characters).
    /// Generate with: `echo -n "your-password" | sha256sum`
    pub password_hash: String,
}

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Users created at startup if absent.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:5000");
        assert_eq!(config.registry.version, "0.9.1");
        assert!(!config.registry.encrypt);
        assert!(config.users.is_empty());
    }

    #[test]
    fn deserializes_from_empty_document() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.server.max_manifest_size, 1024 * 1024);
    }

    #[test]
    fn storage_config_is_tagged() {
        let config: StorageConfig =
            serde_json::from_str(r#"{"type": "filesystem", "path": "/tmp/blobs"}"#).unwrap();
        let StorageConfig::Filesystem { path } = config;
        assert_eq!(path, PathBuf::from("/tmp/blobs"));
    }
}
