//! `SQLite`-backed implementation of `KeyValueStore`

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::{Error, Result};
use crate::storage::{KeyValueStore, DEFAULT_QUOTA_BYTES};
use crate::util::unix_millis_now;

/// Key-value store persisted in a local `SQLite` file.
pub struct SqliteKeyValueStore {
    db: Mutex<Database>,
    quota_bytes: usize,
}

impl SqliteKeyValueStore {
    /// Open the store at `path` with the default quota.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?, DEFAULT_QUOTA_BYTES))
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?, DEFAULT_QUOTA_BYTES))
    }

    #[must_use]
    pub fn new(db: Database, quota_bytes: usize) -> Self {
        Self {
            db: Mutex::new(db),
            quota_bytes,
        }
    }

    #[must_use]
    pub const fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| Error::Storage("database lock poisoned".to_string()))
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db()?;
        let value = db
            .connection()
            .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db()?;
        let conn = db.connection();

        let others: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM kv WHERE key != ?",
            params![key],
            |row| row.get(0),
        )?;
        let needed = usize::try_from(others).unwrap_or(usize::MAX) + key.len() + value.len();
        if needed > self.quota_bytes {
            return Err(Error::StorageQuotaExceeded {
                needed,
                quota: self.quota_bytes,
            });
        }

        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, unix_millis_now()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let db = self.db()?;
        db.connection()
            .execute("DELETE FROM kv WHERE key = ?", params![key])?;
        Ok(())
    }

    fn quota_bytes(&self) -> Option<usize> {
        Some(self.quota_bytes)
    }

    fn used_bytes(&self) -> Result<usize> {
        let db = self.db()?;
        let used: i64 = db.connection().query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM kv",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(used).unwrap_or(usize::MAX))
    }
}
