//! Local article store: one JSON blob of id → article in a key-value store.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::KeyValueStore;
use crate::error::{Error, Result};
use crate::models::{Article, ArticleDraft, ArticleId};
use crate::search::ArticleQuery;
use crate::util::unix_millis_now;

/// Key holding the serialized article map.
pub const ARTICLES_KEY: &str = "quire_articles";

type ArticleMap = BTreeMap<String, Article>;

/// Snapshot of every locally stored article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleExport {
    pub articles: BTreeMap<String, Article>,
    /// Export timestamp (Unix ms)
    pub exported_at: i64,
}

/// Outcome of an import: how many of the offered records were valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub total: usize,
}

/// Share of the quota above which writes log a warning.
const USAGE_WARN_RATIO: f64 = 0.9;

/// Bytes held by the key-value store against its quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageUsage {
    pub used_bytes: usize,
    pub quota_bytes: Option<usize>,
}

impl StorageUsage {
    /// Used share of the quota in `0.0..=1.0`, when the store is bounded.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> Option<f64> {
        self.quota_bytes
            .filter(|quota| *quota > 0)
            .map(|quota| self.used_bytes as f64 / quota as f64)
    }

    #[must_use]
    pub fn is_nearly_full(&self) -> bool {
        self.ratio().is_some_and(|ratio| ratio > USAGE_WARN_RATIO)
    }
}

/// Article persistence on the device.
#[derive(Clone)]
pub struct LocalArticleStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalArticleStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// The key-value store backing this article store.
    pub fn kv(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.kv)
    }

    /// Insert or replace an article, keeping its `updated_at` as given.
    pub fn put(&self, article: &Article) -> Result<Article> {
        let mut stored = article.clone();
        stored.ensure_excerpt();
        stored.last_modified = unix_millis_now();

        let mut articles = self.load()?;
        articles.insert(stored.id.to_string(), stored.clone());
        self.store(&articles)?;
        Ok(stored)
    }

    /// Insert or replace several articles with a single write.
    pub fn put_many(&self, batch: &[Article]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let now = unix_millis_now();
        let mut articles = self.load()?;
        for article in batch {
            let mut stored = article.clone();
            stored.ensure_excerpt();
            stored.last_modified = now;
            articles.insert(stored.id.to_string(), stored);
        }
        self.store(&articles)
    }

    pub fn get(&self, id: &ArticleId) -> Result<Option<Article>> {
        Ok(self.load()?.remove(id.as_str()))
    }

    pub fn list(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        Ok(query.apply(self.load()?.into_values()))
    }

    /// Remove an article; `NotFound` when it is not stored here.
    pub fn delete(&self, id: &ArticleId) -> Result<()> {
        let mut articles = self.load()?;
        if articles.remove(id.as_str()).is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        self.store(&articles)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    /// Number of stored articles passing the query's filters.
    pub fn count_matching(&self, query: &ArticleQuery) -> Result<usize> {
        Ok(self
            .load()?
            .values()
            .filter(|article| query.matches(article))
            .count())
    }

    pub fn usage(&self) -> Result<StorageUsage> {
        Ok(StorageUsage {
            used_bytes: self.kv.used_bytes()?,
            quota_bytes: self.kv.quota_bytes(),
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.store(&ArticleMap::new())
    }

    pub fn export(&self) -> Result<ArticleExport> {
        Ok(ArticleExport {
            articles: self.load()?,
            exported_at: unix_millis_now(),
        })
    }

    /// Replace the stored articles with every valid record in `records`.
    ///
    /// Invalid records are skipped and reported through the summary.
    pub fn import(&self, records: BTreeMap<String, serde_json::Value>) -> Result<ImportSummary> {
        let total = records.len();
        let mut articles = ArticleMap::new();

        for (key, value) in records {
            let parsed = serde_json::from_value::<ArticleDraft>(value)
                .map_err(Error::from)
                .and_then(|mut draft| {
                    draft.id.get_or_insert_with(|| key.clone());
                    Article::try_from(draft)
                });
            match parsed {
                Ok(article) => {
                    articles.insert(article.id.to_string(), article);
                }
                Err(error) => tracing::warn!("Skipping invalid article {key}: {error}"),
            }
        }

        self.store(&articles)?;
        Ok(ImportSummary {
            imported: articles.len(),
            total,
        })
    }

    fn load(&self) -> Result<ArticleMap> {
        let Some(raw) = self.kv.get(ARTICLES_KEY)? else {
            return Ok(ArticleMap::new());
        };

        match serde_json::from_str::<ArticleMap>(&raw) {
            Ok(articles) => Ok(articles),
            Err(error) => {
                self.quarantine_corrupted(&raw);
                Err(Error::Storage(format!(
                    "local article data was corrupted and has been reset: {error}"
                )))
            }
        }
    }

    fn store(&self, articles: &ArticleMap) -> Result<()> {
        let raw = serde_json::to_string(articles)?;
        self.kv.set(ARTICLES_KEY, &raw)?;
        self.warn_when_nearly_full();
        Ok(())
    }

    fn warn_when_nearly_full(&self) {
        match self.usage() {
            Ok(usage) if usage.is_nearly_full() => tracing::warn!(
                "Local storage is nearly full: {} of {} bytes used",
                usage.used_bytes,
                usage.quota_bytes.unwrap_or_default()
            ),
            Ok(_) => {}
            Err(error) => tracing::debug!("Could not measure local storage: {error}"),
        }
    }

    fn quarantine_corrupted(&self, raw: &str) {
        let backup_key = format!("{ARTICLES_KEY}.corrupt-{}", unix_millis_now());
        match self.kv.set(&backup_key, raw) {
            Ok(()) => tracing::warn!("Moved corrupted local article data to {backup_key}"),
            Err(error) => tracing::warn!("Could not back up corrupted article data: {error}"),
        }
        if let Err(error) = self.kv.set(ARTICLES_KEY, "{}") {
            tracing::warn!("Could not reset corrupted article data: {error}");
        }
    }
}
