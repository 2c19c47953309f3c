//! Hybrid synchronizer over the local cache and the hosted article table.
//!
//! Writes go to the remote store when it is usable and are mirrored into the
//! local store; otherwise they land locally and are queued for replay. A
//! reconciliation pass compares both stores and settles divergent copies.
//! Timestamps come from client wall clocks, so skewed clocks can pick the
//! wrong winner.

mod queue;
mod reconcile;

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::Serialize;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub use queue::{QueueEntry, QueuedOperation, SyncQueue, QUEUE_KEY};
pub use reconcile::{
    compare, detect_conflict, merge_articles, resolve_conflict, Comparison, ConflictDetails,
    Resolution, SyncStats, MERGE_SEPARATOR,
};

use crate::config::{SyncSettings, MIN_SYNC_INTERVAL};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result};
use crate::models::{Article, ArticleId, ConflictPolicy, ConflictWinner, SyncConflict};
use crate::remote::{ArticleStore, StoreBackend};
use crate::retry::with_timeout;
use crate::search::ArticleQuery;
use crate::state::{LifecycleState, SyncState};
use crate::storage::{LocalArticleStore, StorageUsage};
use crate::util::unix_millis_now;

const RECONCILE_PAGE_SIZE: usize = 1000;
const CONFLICT_LOG_CAPACITY: usize = 100;

/// Where a write was durably recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    /// Confirmed by the remote store and mirrored locally
    Remote,
    /// Stored locally and queued for replay
    LocalPending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub article: Article,
    pub persistence: Persistence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub id: ArticleId,
    pub persistence: Persistence,
}

/// Counters for one queue replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainStats {
    pub replayed: usize,
    pub requeued: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DrainOutcome {
    Completed(DrainStats),
    /// Another drain was running, or the remote store is unusable
    Skipped,
}

/// Result of a full drain + reconcile cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub drain: DrainOutcome,
    pub stats: SyncStats,
    /// Completion time (Unix ms)
    pub completed_at: i64,
}

/// Point-in-time view of the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub lifecycle: LifecycleState,
    pub state: SyncState,
    pub online: bool,
    pub remote_configured: bool,
    pub offline_mode: bool,
    pub backend: StoreBackend,
    pub pending_operations: usize,
    pub last_sync_at: Option<i64>,
    pub conflict_policy: ConflictPolicy,
    /// Local key-value usage; `None` when it could not be measured
    pub storage: Option<StorageUsage>,
}

/// Article storage that keeps a local cache and a remote store in step.
pub struct HybridStorage {
    local: LocalArticleStore,
    remote: Option<Arc<dyn ArticleStore>>,
    connectivity: ConnectivityMonitor,
    settings: RwLock<SyncSettings>,
    queue: SyncQueue,
    init: OnceCell<()>,
    lifecycle: Mutex<LifecycleState>,
    draining: AtomicBool,
    saves_in_flight: Mutex<HashSet<ArticleId>>,
    conflict_log: Mutex<VecDeque<SyncConflict>>,
    last_sync_at: Mutex<Option<i64>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes an article id from the in-flight set when dropped.
struct SaveGuard<'a> {
    in_flight: &'a Mutex<HashSet<ArticleId>>,
    id: ArticleId,
}

impl<'a> SaveGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<ArticleId>>, id: &ArticleId) -> Result<Self> {
        if !lock(in_flight).insert(id.clone()) {
            return Err(Error::SaveInProgress(id.to_string()));
        }
        Ok(Self {
            in_flight,
            id: id.clone(),
        })
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        lock(self.in_flight).remove(&self.id);
    }
}

/// Clears the drain flag when dropped.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl HybridStorage {
    /// Build a synchronizer. The persisted sync queue is restored from the
    /// local store's key-value backend.
    pub fn new(
        local: LocalArticleStore,
        remote: Option<Arc<dyn ArticleStore>>,
        connectivity: ConnectivityMonitor,
        settings: SyncSettings,
    ) -> Self {
        let queue = SyncQueue::load(local.kv());
        Self {
            local,
            remote,
            connectivity,
            settings: RwLock::new(settings),
            queue,
            init: OnceCell::new(),
            lifecycle: Mutex::new(LifecycleState::Uninitialized),
            draining: AtomicBool::new(false),
            saves_in_flight: Mutex::new(HashSet::new()),
            conflict_log: Mutex::new(VecDeque::new()),
            last_sync_at: Mutex::new(None),
        }
    }

    /// Check the remote store and run the startup sync. Runs once; every
    /// operation awaits it.
    pub async fn initialize(&self) {
        self.init
            .get_or_init(|| async move {
                *lock(&self.lifecycle) = LifecycleState::Initializing;
                self.check_remote().await;
                *lock(&self.lifecycle) = LifecycleState::Ready;

                let backend = self.backend();
                tracing::info!(
                    "Article storage ready (backend: {backend:?}, pending: {})",
                    self.queue.len()
                );

                if self.settings().auto_sync {
                    if let Some(remote) = self.active_remote() {
                        if let Err(error) = self.sync_with(remote.as_ref()).await {
                            tracing::warn!("Startup sync failed: {error}");
                        }
                    }
                }
            })
            .await;
    }

    async fn check_remote(&self) {
        let Some(remote) = self.active_remote() else {
            return;
        };
        match self.remote_call(remote.check_connection()).await {
            Ok(()) => tracing::debug!("Remote article store reachable"),
            Err(error) => {
                tracing::warn!("Remote article store unreachable, working offline: {error}");
                self.connectivity.set_online(false);
            }
        }
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        *lock(&self.lifecycle)
    }

    #[must_use]
    pub fn local(&self) -> &LocalArticleStore {
        &self.local
    }

    #[must_use]
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    #[must_use]
    pub fn settings(&self) -> SyncSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_settings(&self, update: impl FnOnce(&mut SyncSettings)) {
        let mut settings = self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        update(&mut settings);
    }

    pub fn set_conflict_policy(&self, policy: ConflictPolicy) {
        self.update_settings(|settings| settings.conflict_policy = policy);
        tracing::info!("Conflict policy set to {policy}");
    }

    /// Whether remote calls are attempted: configured, online, and not
    /// forced offline.
    #[must_use]
    pub fn should_use_remote(&self) -> bool {
        self.remote.is_some() && self.connectivity.is_online() && !self.settings().offline_mode
    }

    fn active_remote(&self) -> Option<Arc<dyn ArticleStore>> {
        if self.should_use_remote() {
            self.remote.clone()
        } else {
            None
        }
    }

    fn backend(&self) -> StoreBackend {
        if self.should_use_remote() {
            StoreBackend::Cloud
        } else {
            StoreBackend::Local
        }
    }

    fn offline_reason(&self) -> &'static str {
        if self.remote.is_none() {
            "no remote store configured"
        } else if self.settings().offline_mode {
            "offline mode is enabled"
        } else {
            "remote store is unreachable"
        }
    }

    async fn remote_call<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        with_timeout(self.settings().remote_timeout, call).await
    }

    /// Validate and persist an article, stamping `updated_at`.
    ///
    /// Remote failures fall back to a local write plus a queued replay; only
    /// validation and local storage failures are errors.
    pub async fn save(&self, article: Article) -> Result<SaveOutcome> {
        self.initialize().await;
        article.validate()?;
        let _guard = SaveGuard::acquire(&self.saves_in_flight, &article.id)?;

        let mut article = article;
        article.ensure_excerpt();
        article.touch(unix_millis_now());

        if let Some(remote) = self.active_remote() {
            match self.remote_call(remote.save(&article)).await {
                Ok(saved) => {
                    self.queue.remove_saves(&saved.id)?;
                    let stored = self.local.put(&saved)?;
                    tracing::debug!("Saved article {} to cloud", stored.id);
                    return Ok(SaveOutcome {
                        article: stored,
                        persistence: Persistence::Remote,
                    });
                }
                Err(error) => {
                    tracing::warn!("Cloud save of {} failed, queued locally: {error}", article.id);
                }
            }
        }

        let stored = self.local.put(&article)?;
        self.queue.push(QueuedOperation::Save(stored.clone()))?;
        Ok(SaveOutcome {
            article: stored,
            persistence: Persistence::LocalPending,
        })
    }

    /// Fetch an article, preferring the remote copy and refreshing the cache.
    ///
    /// Articles with queued writes are served from the local store. An
    /// article the reachable remote no longer has is evicted from the cache.
    pub async fn get(&self, id: &ArticleId) -> Option<Article> {
        self.initialize().await;

        if !self.queue.contains(id) {
            if let Some(remote) = self.active_remote() {
                match self.remote_call(remote.get(id)).await {
                    Ok(Some(article)) => {
                        if let Err(error) = self.local.put(&article) {
                            tracing::warn!("Could not cache article {id}: {error}");
                        }
                        return Some(article);
                    }
                    Ok(None) => {
                        self.evict(id);
                        return None;
                    }
                    Err(error) => tracing::warn!("Cloud read of {id} failed: {error}"),
                }
            }
        }

        self.local.get(id).unwrap_or_else(|error| {
            tracing::warn!("Local read of {id} failed: {error}");
            None
        })
    }

    /// Count articles passing the query's filters; paging is ignored.
    ///
    /// The remote answers while nothing is queued; otherwise, or when it
    /// fails, the local store does.
    pub async fn count(&self, query: &ArticleQuery) -> usize {
        self.initialize().await;

        if self.queue.is_empty() {
            if let Some(remote) = self.active_remote() {
                match self.remote_call(remote.count_matching(query)).await {
                    Ok(count) => return count,
                    Err(error) => tracing::warn!("Cloud count failed, using local: {error}"),
                }
            }
        }

        self.local.count_matching(query).unwrap_or_else(|error| {
            tracing::warn!("Local count failed: {error}");
            0
        })
    }

    fn evict(&self, id: &ArticleId) {
        match self.local.delete(id) {
            Ok(()) => tracing::debug!("Evicted {id}: no longer in cloud"),
            Err(Error::NotFound(_)) => {}
            Err(error) => tracing::warn!("Could not evict article {id}: {error}"),
        }
    }

    /// List articles, preferring the remote store and mirroring results.
    ///
    /// Articles with queued writes are merged in from the local store before
    /// sorting and paging. The local fallback applies the same filters and
    /// ordering.
    pub async fn list(&self, query: &ArticleQuery) -> Vec<Article> {
        self.initialize().await;

        if let Some(remote) = self.active_remote() {
            let pending = self.queue.pending_ids();
            // With local writes to merge in, page after merging
            let remote_query = if pending.is_empty() {
                query.clone()
            } else {
                ArticleQuery {
                    limit: query
                        .limit
                        .map(|limit| limit.saturating_add(query.offset.unwrap_or(0))),
                    offset: None,
                    ..query.clone()
                }
            };
            match self.remote_call(remote.list(&remote_query)).await {
                Ok(articles) => return self.mirror_listing(articles, &pending, query),
                Err(error) => tracing::warn!("Cloud listing failed, using local: {error}"),
            }
        }

        self.local.list(query).unwrap_or_else(|error| {
            tracing::warn!("Local listing failed: {error}");
            Vec::new()
        })
    }

    fn mirror_listing(
        &self,
        articles: Vec<Article>,
        pending: &BTreeSet<ArticleId>,
        query: &ArticleQuery,
    ) -> Vec<Article> {
        let (queued, fresh): (Vec<_>, Vec<_>) = articles
            .into_iter()
            .partition(|article| pending.contains(&article.id));

        if let Err(error) = self.local.put_many(&fresh) {
            tracing::warn!("Could not cache listed articles: {error}");
        }
        if pending.is_empty() {
            return fresh;
        }

        // Queued local edits take precedence over the remote copy, and
        // articles not yet uploaded come from the local store
        let mut merged = fresh;
        match self.local.list(&query.without_paging()) {
            Ok(local) => merged.extend(
                local
                    .into_iter()
                    .filter(|article| pending.contains(&article.id)),
            ),
            Err(error) => {
                tracing::warn!("Could not read queued articles: {error}");
                merged.extend(queued);
            }
        }
        query.apply(merged)
    }

    /// Delete an article from both stores, queueing the remote delete when
    /// the remote store cannot be reached.
    pub async fn delete(&self, id: &ArticleId) -> Result<DeleteOutcome> {
        self.initialize().await;

        let mut persistence = Persistence::LocalPending;
        if let Some(remote) = self.active_remote() {
            match self.remote_call(remote.delete(id)).await {
                Ok(()) => persistence = Persistence::Remote,
                Err(error) => tracing::warn!("Cloud delete of {id} failed, queued: {error}"),
            }
        }

        match self.local.delete(id) {
            Ok(()) | Err(Error::NotFound(_)) => {}
            Err(error) => return Err(error),
        }

        // The local copy is gone, so queued saves for it are moot
        self.queue.remove_saves(id)?;
        if persistence == Persistence::LocalPending {
            self.queue.push(QueuedOperation::Delete(id.clone()))?;
        }
        Ok(DeleteOutcome {
            id: id.clone(),
            persistence,
        })
    }

    /// Replay queued writes in FIFO order.
    pub async fn drain_queue(&self) -> DrainOutcome {
        self.initialize().await;
        match self.active_remote() {
            Some(remote) => self.drain_with(remote.as_ref()).await,
            None => DrainOutcome::Skipped,
        }
    }

    async fn drain_with(&self, remote: &dyn ArticleStore) -> DrainOutcome {
        if self.draining.swap(true, Ordering::AcqRel) {
            tracing::debug!("Queue drain already running");
            return DrainOutcome::Skipped;
        }
        let _guard = DrainGuard(&self.draining);

        let entries = match self.queue.take_all() {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!("Could not read sync queue: {error}");
                return DrainOutcome::Completed(DrainStats::default());
            }
        };
        if entries.is_empty() {
            return DrainOutcome::Completed(DrainStats::default());
        }

        let max_retries = self.settings().max_retries;
        let mut stats = DrainStats::default();
        let mut failed = Vec::new();
        // Ids with a failed entry; later entries for them wait to keep order
        let mut blocked = HashSet::new();

        for mut entry in entries {
            if blocked.contains(&entry.id) {
                stats.requeued += 1;
                failed.push(entry);
                continue;
            }

            match self.replay(remote, &entry.operation).await {
                Ok(()) => stats.replayed += 1,
                Err(error) => {
                    entry.retry_count += 1;
                    if entry.retry_count >= max_retries {
                        tracing::warn!(
                            "Dropping queued {} of {} after {} attempts: {error}",
                            entry.operation.label(),
                            entry.id,
                            entry.retry_count
                        );
                        stats.dropped += 1;
                    } else {
                        tracing::debug!(
                            "Replay of {} {} failed (attempt {}): {error}",
                            entry.operation.label(),
                            entry.id,
                            entry.retry_count
                        );
                        blocked.insert(entry.id.clone());
                        stats.requeued += 1;
                        failed.push(entry);
                    }
                }
            }
        }

        if let Err(error) = self.queue.requeue_front(failed) {
            tracing::warn!("Could not requeue failed operations: {error}");
        }
        tracing::info!(
            "Sync queue drained: {} replayed, {} requeued, {} dropped",
            stats.replayed,
            stats.requeued,
            stats.dropped
        );
        DrainOutcome::Completed(stats)
    }

    async fn replay(&self, remote: &dyn ArticleStore, operation: &QueuedOperation) -> Result<()> {
        match operation {
            QueuedOperation::Save(article) => {
                let saved = self.remote_call(remote.save(article)).await?;
                // Refresh the cache only if it still holds the replayed version
                let current = self.local.get(&article.id)?;
                if current.is_some_and(|current| current.updated_at == article.updated_at) {
                    self.local.put(&saved)?;
                }
                Ok(())
            }
            QueuedOperation::Delete(id) => self.remote_call(remote.delete(id)).await,
        }
    }

    /// Compare both stores and copy, upload, or resolve every divergent
    /// article. Individual failures are counted, not returned.
    pub async fn reconcile(&self) -> SyncStats {
        self.initialize().await;
        match self.active_remote() {
            Some(remote) => self.reconcile_with(remote.as_ref()).await,
            None => SyncStats::default(),
        }
    }

    async fn reconcile_with(&self, remote: &dyn ArticleStore) -> SyncStats {
        let mut stats = SyncStats::default();
        let (local_index, remote_index) = match self.snapshot_both(remote).await {
            Ok(indexes) => indexes,
            Err(error) => {
                tracing::warn!("Reconciliation aborted: {error}");
                stats.errors += 1;
                return stats;
            }
        };

        let ids = local_index
            .keys()
            .chain(remote_index.keys())
            .cloned()
            .collect::<BTreeSet<_>>();
        let settings = self.settings();

        for id in ids {
            if self.queue.contains(&id) {
                tracing::debug!("Skipping {id}: queued writes pending");
                continue;
            }

            let result = match (local_index.get(&id), remote_index.get(&id)) {
                (Some(local), None) => self.upload(remote, local).await.map(|()| {
                    stats.uploaded += 1;
                }),
                (None, Some(remote_copy)) => self.local.put(remote_copy).map(|_| {
                    stats.downloaded += 1;
                }),
                (Some(local), Some(remote_copy)) => {
                    match compare(local, remote_copy, settings.conflict_window) {
                        Comparison::InSync => Ok(()),
                        Comparison::RemoteNewer => self.local.put(remote_copy).map(|_| {
                            stats.downloaded += 1;
                        }),
                        Comparison::LocalNewer => self.upload(remote, local).await.map(|()| {
                            stats.uploaded += 1;
                        }),
                        Comparison::Conflict => self
                            .settle_conflict(remote, local, remote_copy, settings.conflict_policy)
                            .await
                            .map(|()| {
                                stats.conflicts += 1;
                            }),
                    }
                }
                (None, None) => Ok(()),
            };

            if let Err(error) = result {
                tracing::warn!("Reconciliation of {id} failed: {error}");
                stats.errors += 1;
            }
        }

        tracing::info!(
            "Reconciled: {} downloaded, {} uploaded, {} conflicts, {} errors",
            stats.downloaded,
            stats.uploaded,
            stats.conflicts,
            stats.errors
        );
        stats
    }

    async fn snapshot_both(
        &self,
        remote: &dyn ArticleStore,
    ) -> Result<(BTreeMap<ArticleId, Article>, BTreeMap<ArticleId, Article>)> {
        let local = self.local.list(&ArticleQuery::default())?;
        let remote = self.list_all_remote(remote).await?;
        let index = |articles: Vec<Article>| {
            articles
                .into_iter()
                .map(|article| (article.id.clone(), article))
                .collect::<BTreeMap<_, _>>()
        };
        Ok((index(local), index(remote)))
    }

    async fn list_all_remote(&self, remote: &dyn ArticleStore) -> Result<Vec<Article>> {
        let mut all = Vec::new();
        loop {
            let page_query = ArticleQuery {
                limit: Some(RECONCILE_PAGE_SIZE),
                offset: Some(all.len()),
                ..ArticleQuery::default()
            };
            let page = self.remote_call(remote.list(&page_query)).await?;
            let page_len = page.len();
            all.extend(page);
            if page_len < RECONCILE_PAGE_SIZE {
                return Ok(all);
            }
        }
    }

    async fn upload(&self, remote: &dyn ArticleStore, article: &Article) -> Result<()> {
        let saved = self.remote_call(remote.save(article)).await?;
        self.local.put(&saved)?;
        Ok(())
    }

    async fn settle_conflict(
        &self,
        remote: &dyn ArticleStore,
        local: &Article,
        remote_copy: &Article,
        policy: ConflictPolicy,
    ) -> Result<()> {
        let resolution = resolve_conflict(policy, local, remote_copy);
        match resolution.winner {
            ConflictWinner::Cloud => {
                self.local.put(&resolution.article)?;
            }
            ConflictWinner::Local | ConflictWinner::Merged => {
                self.upload(remote, &resolution.article).await?;
            }
        }

        tracing::info!(
            "Resolved conflict on {} with {policy} policy (winner: {})",
            local.id,
            resolution.winner
        );
        let mut log = lock(&self.conflict_log);
        if log.len() == CONFLICT_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(SyncConflict {
            article_id: local.id.clone(),
            local_updated_at: local.updated_at,
            remote_updated_at: remote_copy.updated_at,
            resolved_at: unix_millis_now(),
            winner: resolution.winner,
            policy,
        });
        Ok(())
    }

    /// Drain the queue, then reconcile.
    pub async fn sync_now(&self) -> Result<SyncReport> {
        self.initialize().await;
        let remote = self
            .active_remote()
            .ok_or_else(|| Error::Offline(self.offline_reason().to_string()))?;
        self.sync_with(remote.as_ref()).await
    }

    async fn sync_with(&self, remote: &dyn ArticleStore) -> Result<SyncReport> {
        let drain = self.drain_with(remote).await;
        let stats = self.reconcile_with(remote).await;
        let completed_at = unix_millis_now();
        *lock(&self.last_sync_at) = Some(completed_at);
        Ok(SyncReport {
            drain,
            stats,
            completed_at,
        })
    }

    /// Articles currently in conflict between the two stores.
    pub async fn pending_conflicts(&self) -> Vec<ConflictDetails> {
        self.initialize().await;
        let Some(remote) = self.active_remote() else {
            return Vec::new();
        };

        let (local_index, remote_index) = match self.snapshot_both(remote.as_ref()).await {
            Ok(indexes) => indexes,
            Err(error) => {
                tracing::warn!("Could not compare stores: {error}");
                return Vec::new();
            }
        };
        let window = self.settings().conflict_window;

        local_index
            .iter()
            .filter(|(id, _)| !self.queue.contains(id))
            .filter_map(|(id, local)| {
                remote_index
                    .get(id)
                    .and_then(|remote_copy| detect_conflict(local, remote_copy, window))
            })
            .collect()
    }

    /// Conflicts resolved by this instance, newest first.
    #[must_use]
    pub fn recent_conflicts(&self, limit: usize) -> Vec<SyncConflict> {
        lock(&self.conflict_log)
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Queued writes awaiting replay, oldest first.
    #[must_use]
    pub fn pending_operations(&self) -> Vec<QueueEntry> {
        self.queue.snapshot()
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let settings = self.settings();
        let remote_usable = self.should_use_remote();
        let pending_operations = self.queue.len();
        SyncStatus {
            lifecycle: self.lifecycle(),
            state: SyncState::from_parts(remote_usable, pending_operations),
            online: self.connectivity.is_online(),
            remote_configured: self.remote.is_some(),
            offline_mode: settings.offline_mode,
            backend: self.backend(),
            pending_operations,
            last_sync_at: *lock(&self.last_sync_at),
            conflict_policy: settings.conflict_policy,
            storage: self
                .local
                .usage()
                .inspect_err(|error| tracing::debug!("Could not measure local storage: {error}"))
                .ok(),
        }
    }

    /// Run connectivity-driven and periodic sync until the task is aborted.
    ///
    /// Regaining connectivity drains and reconciles (drain only when
    /// `auto_sync` is off); each interval tick drains while online.
    pub fn spawn_background(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.initialize().await;
            let mut connectivity = self.connectivity.subscribe();
            let mut was_online = connectivity.borrow_and_update().is_online();
            let period = self.settings().sync_interval.max(MIN_SYNC_INTERVAL);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = connectivity.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = connectivity.borrow_and_update().is_online();
                        if online && !was_online {
                            self.on_reconnect().await;
                        }
                        was_online = online;
                    }
                    _ = ticker.tick() => {
                        if let Some(remote) = self.active_remote() {
                            self.drain_with(remote.as_ref()).await;
                        }
                    }
                }
            }
        })
    }

    async fn on_reconnect(&self) {
        let Some(remote) = self.active_remote() else {
            return;
        };
        tracing::info!("Connection restored, syncing pending changes");
        if self.settings().auto_sync {
            if let Err(error) = self.sync_with(remote.as_ref()).await {
                tracing::warn!("Sync after reconnect failed: {error}");
            }
        } else {
            self.drain_with(remote.as_ref()).await;
        }
    }
}
