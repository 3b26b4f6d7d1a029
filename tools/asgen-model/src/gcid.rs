//! Global content-identifier construction.
//!
//! A GCID has the form `<component-id>/<package-version>/<hash>` where the
//! hash covers the canonical catalog serialization of the component. Two
//! packages shipping byte-identical component data therefore share one
//! GCID, which is the deduplication key of the data store. Any change to
//! the data produces a new GCID and orphans the old entry.

use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Number of hex characters kept from the content hash.
const HASH_LEN: usize = 16;

/// Build the GCID for a component id, its owning package version, and the
/// canonical serialization bytes.
pub fn build_gcid(cid: &str, pkg_version: &str, canonical: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical);
    let digest = hex::encode(hasher.finalize());
    format!("{}/{}/{}", cid, pkg_version, &digest[..HASH_LEN])
}

/// The pool prefix for a component id: its first two characters, or `_`
/// when the id is shorter than that.
pub fn gcid_prefix(cid: &str) -> String {
    let mut chars = cid.chars();
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) => format!("{}{}", a, b),
        _ => "_".to_string(),
    }
}

/// Relative media-pool path for a GCID: `<prefix>/<gcid>`.
pub fn media_path(gcid: &str) -> PathBuf {
    let cid = gcid.split('/').next().unwrap_or("");
    PathBuf::from(gcid_prefix(cid)).join(gcid)
}
