//! Per-namespace ledger of cached entries.
//!
//! The index is reloaded from the keyed store on every request and written
//! back before the request completes. It records, per entry key, when the
//! entry was written, how large its body is, and when it hard-expires.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::hash::index_key;
use crate::Error;
use crate::store::KeyValueStore;

/// Index record for one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub updated_at: i64,
    pub size: u64,
    /// Fixed at write time from the hard TTL then in force.
    pub expires_at: i64,
}

/// Ledger of all entries in one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheIndex {
    #[serde(default)]
    entries: BTreeMap<String, IndexEntry>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the index for `namespace`.
    ///
    /// Missing or malformed records load as an empty index.
    pub async fn load(store: &dyn KeyValueStore, namespace: &str) -> Result<Self, Error> {
        let key = index_key(namespace);
        let Some(raw) = store.get(&key).await? else {
            return Ok(Self::new());
        };

        match serde_json::from_str(&raw) {
            Ok(index) => Ok(index),
            Err(e) => {
                tracing::warn!(namespace, error = %e, "malformed cache index, starting empty");
                Ok(Self::new())
            }
        }
    }

    pub async fn persist(&self, store: &dyn KeyValueStore, namespace: &str) -> Result<(), Error> {
        let raw = serde_json::to_string(self)?;
        store.set(&index_key(namespace), raw).await
    }

    /// Insert or replace the record for `key`, stamping `expires_at`.
    pub fn record(&mut self, key: &str, updated_at: i64, size: u64, hard_ttl_ms: i64) {
        let expires_at = updated_at.saturating_add(hard_ttl_ms);
        self.entries
            .insert(key.to_string(), IndexEntry { updated_at, size, expires_at });
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<IndexEntry> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of recorded body sizes.
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.entries.iter()
    }

    /// Keys whose `expires_at` is at or before `now_ms`.
    pub fn expired_keys(&self, now_ms: i64) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, meta)| meta.expires_at <= now_ms)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Keys ordered oldest write first; equal timestamps fall back to key order.
    pub fn oldest_first(&self) -> Vec<String> {
        let mut keys: Vec<(&String, i64)> = self.entries.iter().map(|(k, e)| (k, e.updated_at)).collect();
        keys.sort_by(|(ka, ta), (kb, tb)| ta.cmp(tb).then_with(|| ka.cmp(kb)));
        keys.into_iter().map(|(k, _)| k.clone()).collect()
    }
}
