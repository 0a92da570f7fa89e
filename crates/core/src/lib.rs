//! Core types and shared functionality for upcache.
//!
//! This crate provides:
//! - Keyed storage capability with SQLite and in-memory backends
//! - Cache data model (entries, per-namespace index, keys)
//! - Expiry pruning and capacity eviction
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod store;

pub use cache::{CacheEntry, CacheIndex, CacheKey, CacheLimits, EntryStore, IndexEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::Error;
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
