//! Error types for quire-core

use std::fmt;

use thiserror::Error;

/// Result type alias using quire-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quire-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Article failed validation; never reaches a store
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Article not found
    #[error("Article not found: {0}")]
    NotFound(String),

    /// Remote store rejected or failed a request
    #[error("Remote store error ({kind}): {message}")]
    Remote { kind: ErrorKind, message: String },

    /// Request could not reach the remote store
    #[error("Network error: {0}")]
    Network(String),

    /// Request or operation exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Remote store is unavailable (offline or not configured)
    #[error("Remote store unavailable: {0}")]
    Offline(String),

    /// Local store would exceed its capacity
    #[error("Storage quota exceeded: {needed} bytes needed, {quota} bytes available")]
    StorageQuotaExceeded { needed: usize, quota: usize },

    /// Local store failure (I/O, corruption)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A save for the same article is already running
    #[error("A save for article {0} is already in progress")]
    SaveInProgress(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error classification shared by both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Duplicate,
    MissingField,
    InvalidData,
    PermissionDenied,
    InvalidRequest,
    Network,
    Timeout,
    Offline,
    StorageQuotaExceeded,
    Storage,
    Unknown,
}

impl ErrorKind {
    /// Stable identifier used in logs and JSON output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Duplicate => "DUPLICATE",
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidData => "INVALID_DATA",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Network => "NETWORK",
            Self::Timeout => "TIMEOUT",
            Self::Offline => "OFFLINE",
            Self::StorageQuotaExceeded => "STORAGE_QUOTA_EXCEEDED",
            Self::Storage => "STORAGE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether an operation failing with this kind may succeed on retry.
    ///
    /// Permission errors are included: an expired token is refreshed out of band.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Offline | Self::PermissionDenied
        )
    }

    /// User-facing message for this kind of failure.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Validation => "Please fill in all required fields correctly.",
            Self::NotFound => "Sorry, the article you are looking for could not be found.",
            Self::Duplicate => "An article with this ID already exists.",
            Self::MissingField => "Please fill in all required fields.",
            Self::InvalidData => "The data format is invalid; please check your input.",
            Self::PermissionDenied => "You do not have permission to perform this action.",
            Self::InvalidRequest => "The request was malformed.",
            Self::Network => "There was a network problem; please try again later.",
            Self::Timeout => "The request timed out; please try again later.",
            Self::Offline => "No network connection; changes are kept on this device.",
            Self::StorageQuotaExceeded => "Local storage is full; remove old articles.",
            Self::Storage => "Local storage failed.",
            Self::Unknown => "The operation failed; please try again later.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error into the shared taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidInput(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Remote { kind, .. } => *kind,
            Self::Network(_) => ErrorKind::Network,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Offline(_) => ErrorKind::Offline,
            Self::StorageQuotaExceeded { .. } => ErrorKind::StorageQuotaExceeded,
            Self::Storage(_) | Self::Sqlite(_) | Self::Io(_) | Self::Serialization(_) => {
                ErrorKind::Storage
            }
            Self::SaveInProgress(_) => ErrorKind::Unknown,
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}
