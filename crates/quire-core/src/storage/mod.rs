//! On-device storage: the key-value seam and the local article store.

mod local;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub use local::{ArticleExport, ImportSummary, LocalArticleStore, StorageUsage, ARTICLES_KEY};

use crate::error::{Error, Result};

/// Default capacity of the local store, matching browser-class storage.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Synchronous string key-value persistence.
///
/// Implementations enforce their own capacity: a `set` that would exceed it
/// fails with [`Error::StorageQuotaExceeded`] and leaves the store unchanged.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// Capacity in bytes, when bounded.
    fn quota_bytes(&self) -> Option<usize>;

    /// Bytes currently held, counting keys and values.
    fn used_bytes(&self) -> Result<usize>;
}

/// In-process key-value store with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries()?;
        if let Some(quota) = self.quota_bytes {
            let others = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, stored)| existing.len() + stored.len())
                .sum::<usize>();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(Error::StorageQuotaExceeded { needed, quota });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn quota_bytes(&self) -> Option<usize> {
        self.quota_bytes
    }

    fn used_bytes(&self) -> Result<usize> {
        Ok(self
            .entries()?
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum())
    }
}
