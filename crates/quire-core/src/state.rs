//! Shared synchronizer state types.

use serde::Serialize;

/// Startup progress of a synchronizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Summary sync state shown by clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Remote store unreachable, disabled, or not configured
    Offline,
    /// Online with queued writes not yet replayed
    Pending,
    Synced,
}

impl SyncState {
    #[must_use]
    pub const fn from_parts(remote_usable: bool, pending: usize) -> Self {
        if !remote_usable {
            Self::Offline
        } else if pending > 0 {
            Self::Pending
        } else {
            Self::Synced
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_state_prefers_offline() {
        assert_eq!(SyncState::from_parts(false, 3), SyncState::Offline);
        assert_eq!(SyncState::from_parts(true, 3), SyncState::Pending);
        assert_eq!(SyncState::from_parts(true, 0), SyncState::Synced);
    }
}
