//! Capacity enforcement and paired entry removal.
//!
//! Eviction is oldest-write-first: only a fresh write or a `304`
//! revalidation moves an entry to the back of the line. Reads never do.

use super::entry::EntryStore;
use super::index::CacheIndex;
use crate::Error;

/// Remove `key` from both the index and the entry store.
pub async fn remove_entry(entries: &EntryStore, index: &mut CacheIndex, key: &str) -> Result<(), Error> {
    index.remove(key);
    entries.remove(key).await
}

/// Evict oldest entries until the index holds at most `max_entries` records
/// and at most `max_total_bytes` bytes, or is empty.
///
/// Returns the evicted keys in eviction order.
pub async fn enforce_limits(
    entries: &EntryStore, index: &mut CacheIndex, max_entries: usize, max_total_bytes: u64,
) -> Result<Vec<String>, Error> {
    let mut total_bytes = index.total_bytes();
    if index.len() <= max_entries && total_bytes <= max_total_bytes {
        return Ok(Vec::new());
    }

    let mut evicted = Vec::new();
    for key in index.oldest_first() {
        if index.len() <= max_entries && total_bytes <= max_total_bytes {
            break;
        }
        if let Some(meta) = index.get(&key) {
            total_bytes = total_bytes.saturating_sub(meta.size);
        }
        remove_entry(entries, index, &key).await?;
        evicted.push(key);
    }

    tracing::info!(
        evicted = evicted.len(),
        remaining = index.len(),
        total_bytes,
        "evicted cache entries over capacity"
    );

    Ok(evicted)
}
