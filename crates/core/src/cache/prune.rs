//! Hard-TTL pruning of a namespace index.

use super::entry::EntryStore;
use super::eviction::remove_entry;
use super::index::CacheIndex;
use crate::Error;

/// Drop every entry whose `expires_at` is at or before `now_ms`, from both the
/// index and the entry store. Returns how many were removed.
pub async fn prune_expired(entries: &EntryStore, index: &mut CacheIndex, now_ms: i64) -> Result<usize, Error> {
    let expired = index.expired_keys(now_ms);
    for key in &expired {
        remove_entry(entries, index, key).await?;
    }

    if !expired.is_empty() {
        tracing::info!(pruned = expired.len(), remaining = index.len(), "pruned expired cache entries");
    }

    Ok(expired.len())
}
