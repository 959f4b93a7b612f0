//! Repository paths.

use crate::error::{Error, Result};
use std::fmt;

/// A validated `namespace/name` repository path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepoPath {
    namespace: String,
    name: String,
}

impl RepoPath {
    /// Parse and validate a namespace/name pair.
    pub fn parse(namespace: &str, name: &str) -> Result<Self> {
        validate_component("namespace", namespace)?;
        validate_component("name", name)?;
        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// The namespace component.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The repository name component.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Component rules: lowercase alphanumerics plus `.`, `_` and `-`, starting
/// with an alphanumeric.
fn validate_component(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidRepoPath(format!("empty {kind}")));
    }
    if value.len() > crate::MAX_NAME_LEN {
        return Err(Error::InvalidRepoPath(format!(
            "{kind} exceeds {} characters: {}",
            crate::MAX_NAME_LEN,
            value.len()
        )));
    }
    let mut bytes = value.bytes();
    let first = bytes.next().unwrap_or(b'.');
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return Err(Error::InvalidRepoPath(format!(
            "{kind} must start with a lowercase alphanumeric: {value}"
        )));
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'_' || b == b'-')
    {
        return Err(Error::InvalidRepoPath(format!(
            "{kind} contains invalid characters: {value}"
        )));
    }
    Ok(())
}
