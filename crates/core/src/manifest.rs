//! Manifest decoding for the completion verifier.
//!
//! Repositories store their manifest verbatim as opaque bytes; the ordered
//! `{id, Tag}` structure inside is interpreted in exactly one place, the
//! completion verifier, through [`decode_manifest`].

use crate::error::{Error, Result};
use crate::image::ImageId;
use serde::Deserialize;

/// One entry of a repository manifest: an image id and the tag the client
/// associated with it at push time.
#[derive(Clone, Debug, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    #[serde(rename = "Tag", alias = "tag", default)]
    pub tag: Option<String>,
}

/// Decode manifest bytes into the ordered image id list.
pub fn decode_manifest(bytes: &[u8]) -> Result<Vec<ImageId>> {
    let entries: Vec<ManifestEntry> =
        serde_json::from_slice(bytes).map_err(|e| Error::MalformedManifest(e.to_string()))?;
    entries
        .iter()
        .map(|entry| ImageId::parse(&entry.id))
        .collect()
}
