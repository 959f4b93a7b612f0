//! Image identifiers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A content-hash image id, assigned by the client that built the image.
///
/// Real clients send 64-character lowercase hex, but the v1 protocol treats
/// ids as opaque strings; the server only requires ASCII alphanumerics so
/// older pushes keep working.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Parse and validate an image id.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidImageId("empty id".to_string()));
        }
        if s.len() > crate::MAX_IMAGE_ID_LEN {
            return Err(Error::InvalidImageId(format!(
                "id exceeds {} characters: {}",
                crate::MAX_IMAGE_ID_LEN,
                s.len()
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(Error::InvalidImageId(format!(
                "id contains non-alphanumeric characters: {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the id, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageId({})", self.0)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extract an image id from a tag-upsert body.
///
/// The client sends the id as a JSON string (`"abc123"`). Older clients are
/// sloppier, so the fallback accepts the first quoted alphanumeric run found
/// anywhere in the body.
pub fn extract_image_id(body: &[u8]) -> Option<ImageId> {
    if let Ok(s) = serde_json::from_slice::<String>(body)
        && let Ok(id) = ImageId::parse(&s)
    {
        return Some(id);
    }
    first_quoted_alnum(body).and_then(|s| ImageId::parse(&s).ok())
}

fn first_quoted_alnum(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?;
    let mut rest = text;
    while let Some(start) = rest.find('"') {
        let after = &rest[start + 1..];
        let end = after.find('"')?;
        let candidate = &after[..end];
        if !candidate.is_empty() && candidate.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Some(candidate.to_string());
        }
        rest = &after[end + 1..];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_hex_ids() {
        let id = "a".repeat(64);
        assert_eq!(ImageId::parse(&id).unwrap().as_str(), id);
    }

    #[test]
    fn parse_rejects_bad_ids() {
        assert!(ImageId::parse("").is_err());
        assert!(ImageId::parse(&"a".repeat(65)).is_err());
        assert!(ImageId::parse("abc/def").is_err());
        assert!(ImageId::parse("../../etc").is_err());
    }

    #[test]
    fn extract_from_json_string_body() {
        let id = extract_image_id(b"\"ffe35e09aeec\"").unwrap();
        assert_eq!(id.as_str(), "ffe35e09aeec");
    }

    #[test]
    fn extract_falls_back_to_first_quoted_run() {
        // Not valid JSON at all; the scan still finds the quoted id.
        let id = extract_image_id(b"latest: \"cafebabe01\"\n").unwrap();
        assert_eq!(id.as_str(), "cafebabe01");
    }

    #[test]
    fn extract_rejects_bodies_without_an_id() {
        assert!(extract_image_id(b"").is_none());
        assert!(extract_image_id(b"{}").is_none());
        assert!(extract_image_id(b"\"---\"").is_none());
        assert!(extract_image_id(&[0xff, 0xfe]).is_none());
    }
}
