//! Request keys for cache entries

use reqwest::Url;
use sha2::{Digest, Sha256};

/// Normalized key of a GET request: method plus absolute URL without the
/// fragment. Query strings are significant.
pub fn request_key(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    format!("GET {}", normalized)
}

/// Deterministic file name for a blob belonging to `key` inside `cache_name`.
///
/// The same request may live in several caches, so the cache name is part of
/// the hash.
pub fn blob_hash(cache_name: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cache_name.as_bytes());
    hasher.update(b"|");
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}
