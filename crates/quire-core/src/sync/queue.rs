//! Offline write queue, persisted through the key-value store.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Article, ArticleId};
use crate::storage::KeyValueStore;
use crate::util::unix_millis_now;

/// Key holding the serialized queue.
pub const QUEUE_KEY: &str = "quire_sync_queue";

/// A write that still has to reach the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum QueuedOperation {
    Save(Article),
    Delete(ArticleId),
}

impl QueuedOperation {
    #[must_use]
    pub const fn article_id(&self) -> &ArticleId {
        match self {
            Self::Save(article) => &article.id,
            Self::Delete(id) => id,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Save(_) => "save",
            Self::Delete(_) => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: ArticleId,
    pub operation: QueuedOperation,
    /// Enqueue time (Unix ms)
    pub enqueued_at: i64,
    /// Failed replays so far
    pub retry_count: u32,
}

impl QueueEntry {
    #[must_use]
    pub fn new(operation: QueuedOperation) -> Self {
        Self {
            id: operation.article_id().clone(),
            operation,
            enqueued_at: unix_millis_now(),
            retry_count: 0,
        }
    }
}

/// FIFO of pending remote writes.
///
/// Holds at most one queued save per article: a newer save replaces the
/// queued one in place. Every mutation is persisted before it takes effect
/// in memory, so a failed write leaves both copies unchanged.
pub struct SyncQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    kv: Arc<dyn KeyValueStore>,
}

impl SyncQueue {
    /// Open the queue, restoring any entries persisted by an earlier run.
    pub fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let entries = match kv.get(QUEUE_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<VecDeque<QueueEntry>>(&raw).unwrap_or_else(
                |error| {
                    tracing::warn!("Discarding unreadable sync queue: {error}");
                    VecDeque::new()
                },
            ),
            Ok(None) => VecDeque::new(),
            Err(error) => {
                tracing::warn!("Could not read sync queue: {error}");
                VecDeque::new()
            }
        };
        if !entries.is_empty() {
            tracing::info!("Restored {} pending sync operations", entries.len());
        }

        Self {
            entries: Mutex::new(entries),
            kv,
        }
    }

    /// Queue a write. A save replaces a save already queued for the same
    /// article, unless a delete was queued after it.
    pub fn push(&self, operation: QueuedOperation) -> Result<()> {
        let mut entries = self.entries()?;
        let mut updated = entries.clone();
        let label = operation.label();
        let id = operation.article_id().clone();

        let replaces = if matches!(operation, QueuedOperation::Save(_)) {
            queued_save_position(&updated, &id)
        } else {
            None
        };
        match replaces {
            Some(index) => {
                updated[index].operation = operation;
                updated[index].enqueued_at = unix_millis_now();
            }
            None => updated.push_back(QueueEntry::new(operation)),
        }

        self.persist(&updated)?;
        *entries = updated;
        tracing::debug!("Queued {label} for article {id}");
        Ok(())
    }

    /// Drop queued saves for `id`; a later delete supersedes them.
    pub fn remove_saves(&self, id: &ArticleId) -> Result<usize> {
        let mut entries = self.entries()?;
        let mut updated = entries.clone();
        updated.retain(|entry| {
            !(entry.id == *id && matches!(entry.operation, QueuedOperation::Save(_)))
        });
        let removed = entries.len() - updated.len();
        if removed > 0 {
            self.persist(&updated)?;
            *entries = updated;
        }
        Ok(removed)
    }

    /// Take every entry, leaving the queue empty.
    pub fn take_all(&self) -> Result<Vec<QueueEntry>> {
        let mut entries = self.entries()?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        self.persist(&VecDeque::new())?;
        Ok(entries.drain(..).collect())
    }

    /// Put entries back ahead of anything queued since they were taken.
    ///
    /// A failed save is dropped when a newer write for the same article was
    /// queued in the meantime. The entries stay queued in memory even when
    /// persisting them fails.
    pub fn requeue_front(&self, failed: Vec<QueueEntry>) -> Result<()> {
        if failed.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries()?;
        let queued_since = entries
            .iter()
            .map(|entry| entry.id.clone())
            .collect::<BTreeSet<_>>();
        for entry in failed.into_iter().rev() {
            let superseded = matches!(entry.operation, QueuedOperation::Save(_))
                && queued_since.contains(&entry.id);
            if superseded {
                tracing::debug!("Dropping superseded save for article {}", entry.id);
                continue;
            }
            entries.push_front(entry);
        }
        self.persist(&entries)
    }

    pub fn len(&self) -> usize {
        self.entries().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &ArticleId) -> bool {
        self.entries()
            .is_ok_and(|entries| entries.iter().any(|entry| entry.id == *id))
    }

    /// Ids of every article with a queued write.
    pub fn pending_ids(&self) -> BTreeSet<ArticleId> {
        self.entries()
            .map(|entries| entries.iter().map(|entry| entry.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.entries()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, VecDeque<QueueEntry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("sync queue lock poisoned".to_string()))
    }

    fn persist(&self, entries: &VecDeque<QueueEntry>) -> Result<()> {
        let raw = serde_json::to_string(entries)?;
        self.kv.set(QUEUE_KEY, &raw).inspect_err(|error| {
            tracing::warn!("Could not persist sync queue: {error}");
        })
    }
}

/// Index of the queued save for `id`, if no delete for it follows.
fn queued_save_position(entries: &VecDeque<QueueEntry>, id: &ArticleId) -> Option<usize> {
    let last = entries.iter().rposition(|entry| entry.id == *id)?;
    matches!(entries[last].operation, QueuedOperation::Save(_)).then_some(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use pretty_assertions::assert_eq;

    fn ids(queue: &SyncQueue) -> Vec<(String, &'static str)> {
        queue
            .snapshot()
            .iter()
            .map(|entry| (entry.id.to_string(), entry.operation.label()))
            .collect()
    }

    #[test]
    fn queue_survives_reload() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let article = Article::new("A", "b");
        {
            let queue = SyncQueue::load(Arc::clone(&kv));
            queue.push(QueuedOperation::Save(article.clone())).unwrap();
            queue.push(QueuedOperation::Delete(article.id.clone())).unwrap();
        }

        let reloaded = SyncQueue::load(kv);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.snapshot()[0].operation,
            QueuedOperation::Save(article)
        );
    }

    #[test]
    fn unreadable_queue_starts_empty() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        kv.set(QUEUE_KEY, "[{oops").unwrap();
        assert!(SyncQueue::load(kv).is_empty());
    }

    #[test]
    fn remove_saves_keeps_deletes() {
        let queue = SyncQueue::load(Arc::new(MemoryKeyValueStore::new()));
        let first = Article::new("A", "b");
        let second = Article::new("C", "d");
        queue.push(QueuedOperation::Save(first.clone())).unwrap();
        queue.push(QueuedOperation::Save(second.clone())).unwrap();
        queue.push(QueuedOperation::Save(first.clone())).unwrap();
        queue.push(QueuedOperation::Delete(first.id.clone())).unwrap();

        assert_eq!(queue.remove_saves(&first.id).unwrap(), 1);
        assert_eq!(
            ids(&queue),
            vec![
                (second.id.to_string(), "save"),
                (first.id.to_string(), "delete")
            ]
        );
    }

    #[test]
    fn repeated_saves_keep_one_entry_with_the_latest_version() {
        let queue = SyncQueue::load(Arc::new(MemoryKeyValueStore::new()));
        let mut article = Article::new("A", "v0");
        let other = Article::new("B", "b");
        queue.push(QueuedOperation::Save(article.clone())).unwrap();
        queue.push(QueuedOperation::Save(other.clone())).unwrap();
        for version in 1..=50 {
            article.content = format!("v{version}");
            queue.push(QueuedOperation::Save(article.clone())).unwrap();
        }

        assert_eq!(
            ids(&queue),
            vec![
                (article.id.to_string(), "save"),
                (other.id.to_string(), "save")
            ]
        );
        assert_eq!(
            queue.snapshot()[0].operation,
            QueuedOperation::Save(article)
        );
    }

    #[test]
    fn save_after_a_queued_delete_is_appended() {
        let queue = SyncQueue::load(Arc::new(MemoryKeyValueStore::new()));
        let article = Article::new("A", "b");
        queue.push(QueuedOperation::Save(article.clone())).unwrap();
        queue.push(QueuedOperation::Delete(article.id.clone())).unwrap();
        queue.push(QueuedOperation::Save(article.clone())).unwrap();

        let id = article.id.to_string();
        assert_eq!(
            ids(&queue),
            vec![(id.clone(), "save"), (id.clone(), "delete"), (id, "save")]
        );
    }

    #[test]
    fn failed_persist_leaves_queue_unchanged() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::with_quota(1_000));
        let queue = SyncQueue::load(Arc::clone(&kv));
        let small = Article::new("A", "b");
        queue.push(QueuedOperation::Save(small.clone())).unwrap();

        let large = Article::new("Large", "x".repeat(2_000));
        let error = queue.push(QueuedOperation::Save(large)).unwrap_err();
        assert!(matches!(error, Error::StorageQuotaExceeded { .. }));

        assert_eq!(ids(&queue), vec![(small.id.to_string(), "save")]);
        let reloaded = SyncQueue::load(kv);
        assert_eq!(reloaded.snapshot(), queue.snapshot());
    }

    #[test]
    fn requeued_save_yields_to_a_newer_write() {
        let queue = SyncQueue::load(Arc::new(MemoryKeyValueStore::new()));
        let mut article = Article::new("A", "old");
        queue.push(QueuedOperation::Save(article.clone())).unwrap();

        let taken = queue.take_all().unwrap();
        article.content = "new".to_string();
        queue.push(QueuedOperation::Save(article.clone())).unwrap();
        queue.requeue_front(taken).unwrap();

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].operation, QueuedOperation::Save(article));
    }

    #[test]
    fn requeue_front_preserves_order_ahead_of_new_entries() {
        let queue = SyncQueue::load(Arc::new(MemoryKeyValueStore::new()));
        let a = Article::new("A", "a");
        let b = Article::new("B", "b");
        let c = Article::new("C", "c");
        queue.push(QueuedOperation::Save(a.clone())).unwrap();
        queue.push(QueuedOperation::Save(b.clone())).unwrap();

        let taken = queue.take_all().unwrap();
        assert!(queue.is_empty());
        queue.push(QueuedOperation::Save(c.clone())).unwrap();
        queue.requeue_front(taken).unwrap();

        let order = queue
            .snapshot()
            .into_iter()
            .map(|entry| entry.id)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![a.id, b.id, c.id]);
    }
}
