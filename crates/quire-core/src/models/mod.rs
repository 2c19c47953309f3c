//! Data models for Quire

mod article;
mod sync_conflict;

pub use article::{
    generate_excerpt, Article, ArticleDraft, ArticleId, ArticleStatus, Visibility, EXCERPT_CHARS,
    MAX_AUTHOR_CHARS, MAX_CATEGORY_CHARS, MAX_TAGS, MAX_TAG_CHARS, MAX_TITLE_CHARS,
};
pub use sync_conflict::{ConflictPolicy, ConflictWinner, SyncConflict};
