//! Sync conflict model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::ArticleId;

/// How reconciliation settles two diverged versions of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Last write wins by `updated_at`; ties go to the local copy
    #[default]
    Auto,
    LocalWins,
    CloudWins,
    /// Combine both versions into a new record
    Merge,
}

impl ConflictPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::LocalWins => "local_wins",
            Self::CloudWins => "cloud_wins",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(Self::Auto),
            "local_wins" | "local" => Ok(Self::LocalWins),
            "cloud_wins" | "cloud" | "remote" => Ok(Self::CloudWins),
            "merge" => Ok(Self::Merge),
            other => Err(Error::InvalidInput(format!(
                "Unknown conflict policy '{other}' (expected auto, local_wins, cloud_wins or merge)"
            ))),
        }
    }
}

/// Which version survived a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictWinner {
    Local,
    Cloud,
    Merged,
}

impl fmt::Display for ConflictWinner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
            Self::Merged => "merged",
        })
    }
}

/// Recorded sync conflict resolved by a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Article involved in the conflict
    pub article_id: ArticleId,
    /// Local copy's timestamp when the conflict was detected
    pub local_updated_at: i64,
    /// Remote copy's timestamp when the conflict was detected
    pub remote_updated_at: i64,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    pub winner: ConflictWinner,
    pub policy: ConflictPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_aliases() {
        assert_eq!("merge".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Merge);
        assert_eq!(
            "Local-Wins".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::LocalWins
        );
        assert_eq!(
            "cloud".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::CloudWins
        );
        assert!("manual".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn policy_serializes_snake_case() {
        let json = serde_json::to_string(&ConflictPolicy::CloudWins).unwrap();
        assert_eq!(json, "\"cloud_wins\"");
    }
}
