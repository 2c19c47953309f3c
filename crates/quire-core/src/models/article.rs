//! Article model

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::unix_millis_now;

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 200;
/// Maximum category length in characters.
pub const MAX_CATEGORY_CHARS: usize = 50;
/// Maximum author length in characters.
pub const MAX_AUTHOR_CHARS: usize = 100;
/// Maximum number of tags per article.
pub const MAX_TAGS: usize = 10;
/// Maximum tag length in characters.
pub const MAX_TAG_CHARS: usize = 30;
/// Excerpt length in characters before an ellipsis is appended.
pub const EXCERPT_CHARS: usize = 150;

const DEFAULT_CATEGORY: &str = "General";
const DEFAULT_AUTHOR: &str = "Admin";

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));

/// Opaque article identifier.
///
/// New ids are `article-<uuid v7>` so they sort by creation time; ids minted
/// by other clients are accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    /// Create a new unique article ID
    #[must_use]
    pub fn new() -> Self {
        Self(format!("article-{}", Uuid::now_v7()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ArticleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArticleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Article ID cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl ArticleStatus {
    pub const ALL: [Self; 3] = [Self::Draft, Self::Published, Self::Archived];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Status must be one of: draft, published, archived (got '{s}')"
                ))
            })
    }
}

/// Who may read an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    LinkOnly,
}

impl Visibility {
    pub const ALL: [Self; 3] = [Self::Public, Self::Private, Self::LinkOnly];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::LinkOnly => "link_only",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|visibility| visibility.as_str() == normalized)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Visibility must be one of: public, private, link_only (got '{s}')"
                ))
            })
    }
}

/// A blog article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Unique identifier
    pub id: ArticleId,
    pub title: String,
    /// HTML or plain text body
    pub content: String,
    /// Plain-text summary derived from content when empty
    #[serde(default)]
    pub excerpt: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: String,
    #[serde(default)]
    pub status: ArticleStatus,
    #[serde(default)]
    pub visibility: Visibility,
    /// Publication timestamp (Unix ms), used for list ordering
    #[serde(alias = "publishDate")]
    pub publish_date: i64,
    /// Creation timestamp (Unix ms)
    #[serde(alias = "createdAt")]
    pub created_at: i64,
    /// Last persisted mutation (Unix ms); drives reconciliation
    #[serde(alias = "updatedAt")]
    pub updated_at: i64,
    /// Last local write (Unix ms)
    #[serde(default, alias = "lastModified")]
    pub last_modified: i64,
}

impl Article {
    /// Create a draft article with default metadata
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = unix_millis_now();
        let content = content.into();
        Self {
            id: ArticleId::new(),
            title: title.into(),
            excerpt: generate_excerpt(&content),
            content,
            category: DEFAULT_CATEGORY.to_string(),
            tags: Vec::new(),
            author: DEFAULT_AUTHOR.to_string(),
            status: ArticleStatus::Draft,
            visibility: Visibility::Public,
            publish_date: now,
            created_at: now,
            updated_at: now,
            last_modified: now,
        }
    }

    /// Check every field constraint, collecting all violations.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push("Title is required".to_string());
        }
        if self.content.trim().is_empty() {
            errors.push("Content is required".to_string());
        }
        if self.title.chars().count() > MAX_TITLE_CHARS {
            errors.push(format!(
                "Title must be at most {MAX_TITLE_CHARS} characters"
            ));
        }
        if self.category.chars().count() > MAX_CATEGORY_CHARS {
            errors.push(format!(
                "Category must be at most {MAX_CATEGORY_CHARS} characters"
            ));
        }
        if self.author.chars().count() > MAX_AUTHOR_CHARS {
            errors.push(format!(
                "Author must be at most {MAX_AUTHOR_CHARS} characters"
            ));
        }
        if self.tags.len() > MAX_TAGS {
            errors.push(format!("Maximum {MAX_TAGS} tags allowed"));
        }
        if self
            .tags
            .iter()
            .any(|tag| tag.chars().count() > MAX_TAG_CHARS)
        {
            errors.push(format!(
                "Each tag must be at most {MAX_TAG_CHARS} characters"
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(errors))
        }
    }

    /// Fill in the excerpt from content when it is blank.
    pub fn ensure_excerpt(&mut self) {
        if self.excerpt.trim().is_empty() {
            self.excerpt = generate_excerpt(&self.content);
        }
    }

    /// Stamp a persisted mutation.
    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at = now_ms;
        self.last_modified = now_ms;
    }

    /// Whether the user-visible text differs from another version.
    #[must_use]
    pub fn text_differs(&self, other: &Self) -> bool {
        self.title != other.title || self.content != other.content
    }
}

/// Untyped article input, as handed over by an editor form or import file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleDraft {
    pub id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub status: Option<String>,
    pub visibility: Option<String>,
    #[serde(alias = "publishDate")]
    pub publish_date: Option<i64>,
    #[serde(alias = "createdAt")]
    pub created_at: Option<i64>,
    #[serde(alias = "updatedAt")]
    pub updated_at: Option<i64>,
}

impl TryFrom<ArticleDraft> for Article {
    type Error = Error;

    fn try_from(draft: ArticleDraft) -> Result<Self> {
        let mut errors = Vec::new();

        let status = match draft.status.as_deref() {
            None => ArticleStatus::default(),
            Some(raw) => raw.parse().unwrap_or_else(|error: Error| {
                errors.push(error_detail(error));
                ArticleStatus::default()
            }),
        };
        let visibility = match draft.visibility.as_deref() {
            None => Visibility::default(),
            Some(raw) => raw.parse().unwrap_or_else(|error: Error| {
                errors.push(error_detail(error));
                Visibility::default()
            }),
        };
        let id = match draft.id.as_deref().map(str::parse::<ArticleId>) {
            None => ArticleId::new(),
            Some(Ok(id)) => id,
            Some(Err(error)) => {
                errors.push(error_detail(error));
                ArticleId::new()
            }
        };

        let mut article = Self::new(
            draft.title.unwrap_or_default(),
            draft.content.unwrap_or_default(),
        );
        article.id = id;
        article.status = status;
        article.visibility = visibility;
        article.tags = draft.tags;
        if let Some(category) = draft.category.filter(|value| !value.trim().is_empty()) {
            article.category = category;
        }
        if let Some(author) = draft.author.filter(|value| !value.trim().is_empty()) {
            article.author = author;
        }
        if let Some(excerpt) = draft.excerpt {
            article.excerpt = excerpt;
            article.ensure_excerpt();
        }
        if let Some(publish_date) = draft.publish_date {
            article.publish_date = publish_date;
        }
        if let Some(created_at) = draft.created_at {
            article.created_at = created_at;
        }
        if let Some(updated_at) = draft.updated_at {
            article.updated_at = updated_at;
        }

        if let Err(Error::Validation(mut field_errors)) = article.validate() {
            errors.append(&mut field_errors);
        }

        if errors.is_empty() {
            Ok(article)
        } else {
            Err(Error::Validation(errors))
        }
    }
}

fn error_detail(error: Error) -> String {
    match error {
        Error::InvalidInput(message) => message,
        other => other.to_string(),
    }
}

/// Derive a plain-text excerpt: HTML tags stripped, first 150 characters.
///
/// # Examples
///
/// ```
/// use quire_core::models::generate_excerpt;
///
/// assert_eq!(generate_excerpt("<p>Hello <b>world</b></p>"), "Hello world");
/// ```
#[must_use]
pub fn generate_excerpt(content: &str) -> String {
    let plain = HTML_TAG.replace_all(content, "");
    let plain = plain.trim();
    if plain.chars().count() > EXCERPT_CHARS {
        let mut excerpt = plain.chars().take(EXCERPT_CHARS).collect::<String>();
        excerpt.push_str("...");
        excerpt
    } else {
        plain.to_string()
    }
}
