//! cache_index tool implementation.
//!
//! Read-only view of a namespace index.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use upcache_core::{CacheIndex, Error, KeyValueStore};

/// Parameters for the cache_index tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheIndexParams {
    /// Namespace to inspect.
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexedEntry {
    /// Storage key of the entry.
    pub key: String,
    /// Epoch milliseconds of the last write or revalidation.
    pub updated_at: i64,
    /// Body size in bytes.
    pub size: u64,
    /// Epoch milliseconds after which the entry is pruned.
    pub expires_at: i64,
}

/// Output from the cache_index tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheIndexOutput {
    pub namespace: String,
    pub entry_count: usize,
    pub total_bytes: u64,
    /// Oldest first, in eviction order.
    pub entries: Vec<IndexedEntry>,
}

/// Implementation of the cache_index tool.
///
/// Expired entries are listed as-is; pruning only happens on `upstream_get`.
pub async fn index_impl(store: &dyn KeyValueStore, params: CacheIndexParams) -> Result<CallToolResult, McpError> {
    if params.namespace.trim().is_empty() {
        return Err(Error::InvalidInput("namespace cannot be empty".into()).into());
    }

    let index = CacheIndex::load(store, &params.namespace).await?;
    let entries = index
        .oldest_first()
        .into_iter()
        .filter_map(|key| {
            index.get(&key).map(|meta| IndexedEntry {
                updated_at: meta.updated_at,
                size: meta.size,
                expires_at: meta.expires_at,
                key,
            })
        })
        .collect();

    let output = CacheIndexOutput {
        namespace: params.namespace,
        entry_count: index.len(),
        total_bytes: index.total_bytes(),
        entries,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize index: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::decode;
    use upcache_core::MemoryStore;

    #[tokio::test]
    async fn test_index_empty_namespace() {
        let store = MemoryStore::new();
        let result = index_impl(&store, CacheIndexParams { namespace: "items".into() }).await.unwrap();

        let output: CacheIndexOutput = decode(&result);
        assert_eq!(output.namespace, "items");
        assert_eq!(output.entry_count, 0);
        assert_eq!(output.total_bytes, 0);
        assert!(output.entries.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_index_lists_oldest_first() {
        let store = MemoryStore::new();
        let mut index = CacheIndex::new();
        index.record("upstream:items:bbb", 2_000, 10, 1_000);
        index.record("upstream:items:aaa", 3_000, 5, 1_000);
        index.record("upstream:items:ccc", 1_000, 7, 1_000);
        index.persist(&store, "items").await.unwrap();

        let result = index_impl(&store, CacheIndexParams { namespace: "items".into() }).await.unwrap();
        let output: CacheIndexOutput = decode(&result);

        assert_eq!(output.entry_count, 3);
        assert_eq!(output.total_bytes, 22);
        let keys: Vec<&str> = output.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["upstream:items:ccc", "upstream:items:bbb", "upstream:items:aaa"]);
        assert_eq!(output.entries[0].expires_at, 2_000);
    }

    #[tokio::test]
    async fn test_index_does_not_prune() {
        let store = MemoryStore::new();
        let mut index = CacheIndex::new();
        index.record("upstream:items:old", 0, 3, 1);
        index.persist(&store, "items").await.unwrap();

        let result = index_impl(&store, CacheIndexParams { namespace: "items".into() }).await.unwrap();
        let output: CacheIndexOutput = decode(&result);
        assert_eq!(output.entry_count, 1);
        assert_eq!(CacheIndex::load(&store, "items").await.unwrap(), index);
    }

    #[tokio::test]
    async fn test_index_rejects_blank_namespace() {
        let store = MemoryStore::new();
        let result = index_impl(&store, CacheIndexParams { namespace: "  ".into() }).await;
        assert!(result.is_err());
    }
}
