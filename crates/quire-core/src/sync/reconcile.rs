//! Version comparison and conflict resolution for reconciliation.

use std::time::Duration;

use serde::Serialize;

use crate::models::{Article, ArticleId, ConflictPolicy, ConflictWinner, MAX_TAGS};

/// Separator placed between the two bodies of a merged article.
pub const MERGE_SEPARATOR: &str = "\n\n<hr>\n<h3>Merged version</h3>\n";

/// Counters reported by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub downloaded: usize,
    pub uploaded: usize,
    pub conflicts: usize,
    pub errors: usize,
}

/// How the two stored versions of one article relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    InSync,
    LocalNewer,
    RemoteNewer,
    /// Edited within the conflict window with different text
    Conflict,
}

/// Compare versions of the same article.
///
/// The conflict check runs first, so near-simultaneous edits are never
/// settled by the plain newer-wins rule.
#[must_use]
pub fn compare(local: &Article, remote: &Article, window: Duration) -> Comparison {
    if within_window(local, remote, window) && local.text_differs(remote) {
        Comparison::Conflict
    } else if remote.updated_at > local.updated_at {
        Comparison::RemoteNewer
    } else if local.updated_at > remote.updated_at {
        Comparison::LocalNewer
    } else {
        Comparison::InSync
    }
}

fn within_window(local: &Article, remote: &Article, window: Duration) -> bool {
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    local.updated_at.abs_diff(remote.updated_at) <= window_ms
}

/// A conflict that reconciliation would settle, with what differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictDetails {
    pub id: ArticleId,
    pub local_title: String,
    pub remote_title: String,
    pub local_updated_at: i64,
    pub remote_updated_at: i64,
    pub title_differs: bool,
    pub content_differs: bool,
    pub tags_differ: bool,
}

#[must_use]
pub fn detect_conflict(
    local: &Article,
    remote: &Article,
    window: Duration,
) -> Option<ConflictDetails> {
    (compare(local, remote, window) == Comparison::Conflict).then(|| ConflictDetails {
        id: local.id.clone(),
        local_title: local.title.clone(),
        remote_title: remote.title.clone(),
        local_updated_at: local.updated_at,
        remote_updated_at: remote.updated_at,
        title_differs: local.title != remote.title,
        content_differs: local.content != remote.content,
        tags_differ: local.tags != remote.tags,
    })
}

/// The surviving version of a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub article: Article,
    pub winner: ConflictWinner,
}

/// Settle a conflict under `policy`.
#[must_use]
pub fn resolve_conflict(policy: ConflictPolicy, local: &Article, remote: &Article) -> Resolution {
    let (article, winner) = match policy {
        ConflictPolicy::Auto if remote.updated_at > local.updated_at => {
            (remote.clone(), ConflictWinner::Cloud)
        }
        ConflictPolicy::Auto | ConflictPolicy::LocalWins => (local.clone(), ConflictWinner::Local),
        ConflictPolicy::CloudWins => (remote.clone(), ConflictWinner::Cloud),
        ConflictPolicy::Merge => (merge_articles(local, remote), ConflictWinner::Merged),
    };
    Resolution { article, winner }
}

/// Combine two versions into one record.
///
/// The later `updated_at` is the base (ties go to `local`). The base keeps
/// its title and metadata, tags are the base's followed by the other's new
/// ones, and the other body is appended under [`MERGE_SEPARATOR`]. The
/// result is stamped one millisecond after the later input.
#[must_use]
pub fn merge_articles(local: &Article, remote: &Article) -> Article {
    let (base, other) = if remote.updated_at > local.updated_at {
        (remote, local)
    } else {
        (local, remote)
    };

    let mut merged = base.clone();
    for tag in &other.tags {
        if !merged.tags.contains(tag) {
            merged.tags.push(tag.clone());
        }
    }
    merged.tags.truncate(MAX_TAGS);

    if base.content != other.content {
        merged.content = format!("{}{MERGE_SEPARATOR}{}", base.content, other.content);
    }
    merged.created_at = base.created_at.min(other.created_at);
    merged.touch(base.updated_at.max(other.updated_at) + 1);
    merged
}
