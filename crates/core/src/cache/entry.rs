//! Cached upstream responses and their storage adapter.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::store::KeyValueStore;

/// Content type recorded when the upstream does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// One cached upstream response.
///
/// Validators are opaque and only ever echoed back to the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub body: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// Epoch millis of the last successful fetch or revalidation.
    pub updated_at: i64,
}

impl CacheEntry {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.updated_at)
    }

    /// Body size in bytes, as accounted in the index.
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }

    /// Apply a `304 Not Modified`: keep the body, take any new validators,
    /// and restamp.
    pub fn revalidated(self, etag: Option<String>, last_modified: Option<String>, now_ms: i64) -> Self {
        Self {
            etag: etag.or(self.etag),
            last_modified: last_modified.or(self.last_modified),
            updated_at: now_ms,
            ..self
        }
    }
}

/// Reads and writes single cache entries through the keyed store.
#[derive(Clone)]
pub struct EntryStore {
    store: Arc<dyn KeyValueStore>,
}

impl EntryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the entry under `key`.
    ///
    /// A record that no longer decodes is treated as absent; the next write
    /// for the key replaces it.
    pub async fn load(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, key: &str, entry: &CacheEntry) -> Result<(), Error> {
        let raw = serde_json::to_string(entry)?;
        self.store.set(key, raw).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), Error> {
        self.store.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn entry(body: &str, updated_at: i64) -> CacheEntry {
        CacheEntry {
            body: body.into(),
            content_type: DEFAULT_CONTENT_TYPE.into(),
            etag: Some("\"v1\"".into()),
            last_modified: None,
            updated_at,
        }
    }

    #[test]
    fn test_age_and_size() {
        let e = entry("héllo", 1_000);
        assert_eq!(e.age_ms(1_500), 500);
        assert_eq!(e.size(), 6);
    }

    #[test]
    fn test_revalidated_keeps_body_and_old_validators() {
        let e = entry("{\"a\":1}", 1_000);
        let r = e.clone().revalidated(None, Some("Tue, 01 Oct 2024 00:00:00 GMT".into()), 9_000);
        assert_eq!(r.body, e.body);
        assert_eq!(r.etag.as_deref(), Some("\"v1\""));
        assert_eq!(r.last_modified.as_deref(), Some("Tue, 01 Oct 2024 00:00:00 GMT"));
        assert_eq!(r.updated_at, 9_000);
    }

    #[test]
    fn test_revalidated_replaces_etag() {
        let r = entry("x", 0).revalidated(Some("\"v2\"".into()), None, 1);
        assert_eq!(r.etag.as_deref(), Some("\"v2\""));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(entry("x", 42)).unwrap();
        assert_eq!(json["contentType"], DEFAULT_CONTENT_TYPE);
        assert_eq!(json["updatedAt"], 42);
        assert!(json.get("lastModified").is_none());
    }

    #[tokio::test]
    async fn test_save_load_remove() {
        let store = Arc::new(MemoryStore::new());
        let entries = EntryStore::new(store.clone());

        entries.save("upstream:docs:1", &entry("body", 5)).await.unwrap();
        let loaded = entries.load("upstream:docs:1").await.unwrap().unwrap();
        assert_eq!(loaded.body, "body");

        entries.remove("upstream:docs:1").await.unwrap();
        assert!(entries.load("upstream:docs:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_absent() {
        let store = Arc::new(MemoryStore::new());
        store.set("upstream:docs:1", "not json".into()).await.unwrap();

        let entries = EntryStore::new(store);
        assert!(entries.load("upstream:docs:1").await.unwrap().is_none());
    }
}
