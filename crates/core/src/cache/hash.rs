//! Cache key generation.
//!
//! Keys are namespaced so that unrelated endpoint families never share
//! entries, index records, or eviction pressure.

use sha2::{Digest, Sha256};

/// Storage key prefix for cache entries.
const ENTRY_PREFIX: &str = "upstream";

/// Storage key prefix for namespace index records.
const INDEX_PREFIX: &str = "upstream-index";

/// SHA-256 of a normalized URL, hex encoded.
pub fn hash_url(normalized_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Storage key of the index record for `namespace`.
pub fn index_key(namespace: &str) -> String {
    format!("{INDEX_PREFIX}:{namespace}")
}

/// Storage key of one cache entry: `upstream:{namespace}:{sha256(url)}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for an already-normalized URL.
    pub fn new(namespace: &str, normalized_url: &str) -> Self {
        Self(format!("{ENTRY_PREFIX}:{namespace}:{}", hash_url(normalized_url)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
