//! Article list filtering.
//!
//! The same predicate and ordering back the local store, the local fallback
//! of the hybrid synchronizer, and the query parameters sent to the hosted
//! table, so every backend answers a given query the same way.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Article, ArticleStatus, Visibility};

/// Optional filters for listing articles, combined with logical AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleQuery {
    pub status: Option<ArticleStatus>,
    pub category: Option<String>,
    pub visibility: Option<Visibility>,
    /// Case-insensitive substring matched against title, content or excerpt
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ArticleQuery {
    /// Unfiltered query bounded to `limit` rows.
    #[must_use]
    pub fn all(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: ArticleStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// The same filters with `limit` and `offset` cleared.
    #[must_use]
    pub fn without_paging(&self) -> Self {
        Self {
            limit: None,
            offset: None,
            ..self.clone()
        }
    }

    /// Search needle, lowercased, or `None` when blank.
    #[must_use]
    pub fn search_needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether an article passes every filter of this query.
    #[must_use]
    pub fn matches(&self, article: &Article) -> bool {
        if self.status.is_some_and(|status| article.status != status) {
            return false;
        }
        if self
            .category
            .as_deref()
            .is_some_and(|category| article.category != category)
        {
            return false;
        }
        if self
            .visibility
            .is_some_and(|visibility| article.visibility != visibility)
        {
            return false;
        }
        if let Some(needle) = self.search_needle() {
            return [&article.title, &article.content, &article.excerpt]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
        }
        true
    }

    /// Filter, sort newest-published first, then page.
    #[must_use]
    pub fn apply<I>(&self, articles: I) -> Vec<Article>
    where
        I: IntoIterator<Item = Article>,
    {
        let mut matched = articles
            .into_iter()
            .filter(|article| self.matches(article))
            .collect::<Vec<_>>();
        sort_by_publish_date(&mut matched);

        matched
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Sort newest `publish_date` first; ties broken by id for a stable order.
pub fn sort_by_publish_date(articles: &mut [Article]) {
    articles.sort_by(|a, b| match b.publish_date.cmp(&a.publish_date) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, content: &str, publish_date: i64) -> Article {
        let mut article = Article::new(title, content);
        article.publish_date = publish_date;
        article
    }

    #[test]
    fn filters_combine_with_and() {
        let mut published = article("Rust tips", "borrowing", 3);
        published.status = ArticleStatus::Published;
        published.category = "Tech".into();
        let mut other_category = article("Rust news", "editions", 2);
        other_category.status = ArticleStatus::Published;
        let draft = article("Rust draft", "wip", 1);

        let query = ArticleQuery {
            status: Some(ArticleStatus::Published),
            category: Some("Tech".into()),
            ..ArticleQuery::default()
        };
        let results = query.apply(vec![published.clone(), other_category, draft]);
        assert_eq!(results, vec![published]);
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let by_title = article("Async Rust", "body", 1);
        let by_content = article("Other", "all about ASYNC", 2);
        let mut by_excerpt = article("Third", "body", 3);
        by_excerpt.excerpt = "an async summary".into();
        let unrelated = article("Cooking", "pasta", 4);

        let results = ArticleQuery::default()
            .with_search("async")
            .apply(vec![by_title, by_content, by_excerpt, unrelated]);
        let titles = results.iter().map(|a| a.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["Third", "Other", "Async Rust"]);
    }

    #[test]
    fn blank_search_matches_everything() {
        let query = ArticleQuery::default().with_search("   ");
        assert!(query.matches(&article("A", "b", 0)));
    }

    #[test]
    fn sorts_newest_first_then_pages() {
        let articles = (1..=5).map(|n| article(&format!("n{n}"), "x", n));
        let query = ArticleQuery {
            limit: Some(2),
            offset: Some(1),
            ..ArticleQuery::default()
        };
        let titles = query
            .apply(articles)
            .into_iter()
            .map(|a| a.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["n4", "n3"]);
    }
}
