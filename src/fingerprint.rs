//! Content fingerprinting.
//!
//! An item's fingerprint is a pure function of its canonical URL, so two
//! items sharing a URL always hash identically. This keeps dedup-by-hash
//! possible across watermark boundaries even though the current pipeline
//! only dedups by timestamp.

use sha1::{Digest, Sha1};

/// SHA-1 hex digest over the UTF-8 bytes of a canonical URL.
pub fn url_hash(url: &str) -> String {
    let hash = Sha1::digest(url.as_bytes());
    format!("{:x}", hash)
}
