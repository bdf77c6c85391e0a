//! SQLite-backed [`KvStore`].
//!
//! One table, `kv(key TEXT PRIMARY KEY, value BLOB)`, behind a single
//! connection lock.

use crate::{BatchOp, KvStore, StorageResult};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const UPSERT: &str = "INSERT INTO kv (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value";
const DELETE: &str = "DELETE FROM kv WHERE key = ?1";

/// Durable key-value store in a SQLite file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "opening sqlite store");
        let store = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> StorageResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StorageResult<()> {
        self.conn().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.conn().execute(UPSERT, params![key, value])?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.conn().execute(DELETE, params![key])?;
        Ok(())
    }

    fn write_batch(&self, ops: &[BatchOp]) -> StorageResult<()> {
        let mut conn = self.conn();
        // Dropping the transaction without commit rolls it back.
        let tx = conn.transaction()?;
        for op in ops {
            match op {
                BatchOp::Put(key, value) => tx.execute(UPSERT, params![key, value])?,
                BatchOp::Delete(key) => tx.execute(DELETE, params![key])?,
            };
        }
        tx.commit()?;
        Ok(())
    }

    fn commit(&self) -> StorageResult<()> {
        // Writes commit as they are made; flush the page cache.
        self.conn().cache_flush()?;
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}
