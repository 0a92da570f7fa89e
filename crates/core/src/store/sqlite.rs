//! SQLite-backed keyed store.
//!
//! Opens the database, applies pragmas for concurrent access (WAL mode),
//! brings the schema up to date, and exposes a single `kv_store` table through
//! [`KeyValueStore`].

use std::path::Path;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, params, rusqlite};

use super::KeyValueStore;
use crate::Error;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;";

/// Schema version recorded in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );";

/// Durable store handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and creates the `kv_store` table on first use.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// A database written by a newer schema is refused rather than modified.
    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| -> Result<(), Error> {
            conn.execute_batch(PRAGMAS)?;

            let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
            if version > SCHEMA_VERSION {
                return Err(Error::MigrationFailed(format!(
                    "store schema version {version} is newer than supported version {SCHEMA_VERSION}"
                )));
            }
            if version < SCHEMA_VERSION {
                tracing::debug!(from = version, to = SCHEMA_VERSION, "creating kv_store schema");
                conn.execute_batch(SCHEMA)?;
                conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            }
            Ok(())
        })
        .await
        .map_err(Error::from)?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE key = ?1")?;
                let result = stmt.query_row(params![key], |row| row.get(0));

                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// UPSERT: inserts if the key doesn't exist, replaces the value if it does.
    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        let key = key.to_string();
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![key, value, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn count_keys(store: &SqliteStore, prefix: &str) -> i64 {
        let pattern = format!("{prefix}%");
        store
            .conn
            .call(move |conn| {
                conn.query_row("SELECT COUNT(*) FROM kv_store WHERE key LIKE ?1", params![pattern], |row| row.get(0))
            })
            .await
            .unwrap()
    }

    async fn user_version(conn: &Connection) -> i64 {
        conn.call(|conn| conn.query_row("PRAGMA user_version", [], |row| row.get(0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_in_memory_sets_schema_version() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        assert_eq!(user_version(&store.conn).await, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        let store = SqliteStore::init(conn.clone()).await.unwrap();
        store.set("k", "v".into()).await.unwrap();

        let reopened = SqliteStore::init(conn).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_init_refuses_newer_schema() {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|conn| conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1))
            .await
            .unwrap();

        let result = SqliteStore::init(conn).await;
        assert!(matches!(result, Err(Error::MigrationFailed(_))));
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.set("upstream:docs:abc", "{\"body\":\"x\"}".into()).await.unwrap();

        let value = store.get("upstream:docs:abc").await.unwrap();
        assert_eq!(value.as_deref(), Some("{\"body\":\"x\"}"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        assert!(store.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.set("k", "first".into()).await.unwrap();
        store.set("k", "second".into()).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("second"));
        assert_eq!(count_keys(&store, "k").await, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.set("upstream:a:1", "v".into()).await.unwrap();
        store.set("upstream:b:1", "v".into()).await.unwrap();

        store.delete("upstream:a:1").await.unwrap();
        store.delete("upstream:a:1").await.unwrap();

        assert!(store.get("upstream:a:1").await.unwrap().is_none());
        assert_eq!(count_keys(&store, "upstream:").await, 1);
    }
}
