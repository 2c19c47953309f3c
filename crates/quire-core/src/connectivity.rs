//! Connectivity notifier shared by the synchronizer and its host.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

/// Whether the remote store is believed reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    #[must_use]
    pub const fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }

    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Broadcasts online/offline transitions to any number of subscribers.
///
/// Clones share the same channel.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<Connectivity>>,
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (sender, _) = watch::channel(Connectivity::from_online(initially_online));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Record the current connectivity; subscribers wake only on a change.
    pub fn set_online(&self, online: bool) {
        let next = Connectivity::from_online(online);
        let changed = self.sender.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            tracing::info!("Connectivity changed: {next:?}");
        }
    }

    #[must_use]
    pub fn current(&self) -> Connectivity {
        *self.sender.borrow()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.sender.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_transitions_only() {
        let monitor = ConnectivityMonitor::new(true);
        let mut receiver = monitor.subscribe();

        monitor.set_online(true);
        assert!(!receiver.has_changed().unwrap());

        monitor.set_online(false);
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow_and_update(), Connectivity::Offline);
        assert!(!monitor.is_online());
    }

    #[test]
    fn clones_share_state() {
        let monitor = ConnectivityMonitor::new(false);
        let clone = monitor.clone();
        clone.set_online(true);
        assert!(monitor.is_online());
    }
}
