//! Typed store contract shared by the local cache and the hosted table.

mod supabase;

use async_trait::async_trait;
use serde::Serialize;

pub use supabase::{
    classify_postgrest_code, ArticleRow, SupabaseArticleStore, SupabaseConfig,
    DEFAULT_ARTICLES_TABLE,
};

use crate::error::{Error, Result};
use crate::models::{Article, ArticleId};
use crate::search::ArticleQuery;
use crate::storage::LocalArticleStore;

/// Which physical store answered a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Local,
    Cloud,
}

impl StoreBackend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }
}

/// Article persistence operations every backend supports.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    fn backend(&self) -> StoreBackend;

    /// Create or replace; returns the canonical stored record.
    async fn save(&self, article: &Article) -> Result<Article>;

    async fn get(&self, id: &ArticleId) -> Result<Option<Article>>;

    async fn list(&self, query: &ArticleQuery) -> Result<Vec<Article>>;

    /// Number of articles passing the query's filters; paging is ignored.
    async fn count_matching(&self, query: &ArticleQuery) -> Result<usize> {
        Ok(self.list(&query.without_paging()).await?.len())
    }

    /// Delete by id. Deleting an absent id succeeds.
    async fn delete(&self, id: &ArticleId) -> Result<()>;

    /// Cheap reachability check.
    async fn check_connection(&self) -> Result<()>;
}

#[async_trait]
impl ArticleStore for LocalArticleStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Local
    }

    async fn save(&self, article: &Article) -> Result<Article> {
        article.validate()?;
        self.put(article)
    }

    async fn get(&self, id: &ArticleId) -> Result<Option<Article>> {
        Self::get(self, id)
    }

    async fn list(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        Self::list(self, query)
    }

    async fn count_matching(&self, query: &ArticleQuery) -> Result<usize> {
        Self::count_matching(self, query)
    }

    async fn delete(&self, id: &ArticleId) -> Result<()> {
        match Self::delete(self, id) {
            Ok(()) | Err(Error::NotFound(_)) => Ok(()),
            Err(error) => Err(error),
        }
    }

    async fn check_connection(&self) -> Result<()> {
        self.count().map(|_| ())
    }
}
