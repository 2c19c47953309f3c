use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quire_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No article content provided")]
    EmptyContent,
    #[error("Edited article content cannot be empty")]
    EmptyEditedContent,
    #[error("Article ID cannot be empty")]
    EmptyArticleId,
    #[error("Article not found for id/prefix: {0}")]
    ArticleNotFound(String),
    #[error("{0}")]
    AmbiguousArticleId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Invalid import file: {0}")]
    InvalidImport(String),
}
