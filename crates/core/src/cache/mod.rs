//! Cache data model and retention policy.
//!
//! Everything here goes through a [`KeyValueStore`](crate::store::KeyValueStore):
//!
//! - One JSON record per cached response (`upstream:{namespace}:{sha256}`)
//! - One JSON index per namespace (`upstream-index:{namespace}`)
//! - Hard-TTL pruning and oldest-write-first eviction keep the two paired

pub mod entry;
pub mod eviction;
pub mod hash;
pub mod index;
pub mod limits;
pub mod prune;

pub use crate::Error;

pub use entry::{CacheEntry, DEFAULT_CONTENT_TYPE, EntryStore};
pub use eviction::{enforce_limits, remove_entry};
pub use hash::{CacheKey, index_key};
pub use index::{CacheIndex, IndexEntry};
pub use limits::CacheLimits;
pub use prune::prune_expired;
