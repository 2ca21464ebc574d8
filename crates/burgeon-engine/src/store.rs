//! Key-value store implementations backing the generation cache.
//!
//! [`MemoryStore`] is the default for tests and single-session hosts;
//! [`SqliteStore`] persists across sessions. Both are last-writer-wins.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::{Mutex, RwLock};
use rusqlite::Connection;

use crate::backend::{GenError, GenResult, KvStore};

/// In-process store with no persistence.
#[derive(Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> GenResult<Option<String>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> GenResult<()> {
        self.map.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
";

/// SQLite-backed store.
///
/// The connection sits behind a mutex; cache traffic is low-volume (one row
/// per generation) so contention is not a concern.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> GenResult<Self> {
        let conn = Connection::open(path).map_err(store_err)?;
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory SQLite database, for tests.
    pub fn in_memory() -> GenResult<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> GenResult<Option<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT value FROM kv WHERE key = ?1")
            .map_err(store_err)?;
        let mut rows = stmt.query([key]).map_err(store_err)?;
        match rows.next().map_err(store_err)? {
            Some(row) => Ok(Some(row.get(0).map_err(store_err)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> GenResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            rusqlite::params![key, value, crate::now_millis() as i64],
        )
        .map_err(store_err)?;
        Ok(())
    }
}

fn store_err(e: rusqlite::Error) -> GenError {
    GenError::Store(e.to_string())
}

// ============================================================================
// Tests
// ============================================================================
