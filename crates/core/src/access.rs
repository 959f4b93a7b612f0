//! Ephemeral access grants and v1 registry tokens.

use sha2::{Digest, Sha256};
use std::fmt;

/// Access level of a session grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An authenticated identity, as resolved by the access gate.
#[derive(Clone, Debug)]
pub struct Identity {
    pub username: String,
    /// Stored credential hash; feeds the token signature.
    pub password_hash: String,
}

/// A per-request session grant.
///
/// Constructed by the access gate after authorization and threaded through
/// the handler that needed it as a plain value; never stored.
#[derive(Clone, Debug)]
pub struct AccessGrant {
    pub identity: Identity,
    pub namespace: String,
    pub repository: String,
    pub access: Access,
}

impl AccessGrant {
    /// Issue the v1 registry token for this grant.
    pub fn token(&self) -> RegistryToken {
        RegistryToken::issue(
            &self.identity,
            &self.namespace,
            &self.repository,
            self.access,
        )
    }
}

/// The v1 registry token handed back in `X-Docker-Token`:
/// `signature=<hex>,repository="ns/name",access=write`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryToken {
    pub signature: String,
    pub repository: String,
    pub access: Access,
}

impl RegistryToken {
    /// Issue a token for a grant. The signature is a one-way function of the
    /// identity (SHA-256 over the username and stored credential hash), so
    /// the same credentials always map to the same signature.
    pub fn issue(identity: &Identity, namespace: &str, repository: &str, access: Access) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(identity.username.as_bytes());
        hasher.update(b":");
        hasher.update(identity.password_hash.as_bytes());
        Self {
            signature: hex(hasher.finalize()),
            repository: format!("{namespace}/{repository}"),
            access,
        }
    }

    /// Render as the X-Docker-Token header value.
    pub fn header_value(&self) -> String {
        format!(
            "signature={},repository=\"{}\",access={}",
            self.signature, self.repository, self.access
        )
    }
}

/// SHA-256 hex of a secret, the form credentials are stored and compared in.
pub fn credential_hash(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex(hasher.finalize())
}

fn hex(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}
