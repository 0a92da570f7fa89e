//! Keyed storage capability shared by cache entries and namespace indexes.
//!
//! The cache engine only ever talks to a [`KeyValueStore`]; nothing is assumed
//! to survive in process memory between requests. Two backends ship here:
//!
//! - [`SqliteStore`]: durable, tokio-rusqlite with WAL mode and a versioned schema
//! - [`MemoryStore`]: process-local map, for tests and ephemeral deployments

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::Error;
use crate::config::{AppConfig, StoreKind};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Opaque key/value capability.
///
/// Implementations must be safe to share across concurrent requests. No
/// multi-key atomicity is required.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: String) -> Result<(), Error>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), Error>;
}

/// Open the backend selected by configuration.
pub async fn open(config: &AppConfig) -> Result<Arc<dyn KeyValueStore>, Error> {
    match config.store {
        StoreKind::Sqlite => {
            tracing::info!(path = %config.db_path.display(), "opening sqlite store");
            Ok(Arc::new(SqliteStore::open(&config.db_path).await?))
        }
        StoreKind::Memory => {
            tracing::info!("using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
