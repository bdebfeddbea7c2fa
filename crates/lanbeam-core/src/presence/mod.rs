//! Best-effort list of devices that announced themselves.
//!
//! Presence is purely informational and independent of sessions: the web
//! page records itself when it loads and removes itself when it is hidden,
//! whether or not it ever opened a session connection.

use std::collections::BTreeSet;

use tokio::sync::RwLock;

/// Set of device addresses currently announced as reachable.
#[derive(Debug, Default)]
pub struct PresenceSet {
    devices: RwLock<BTreeSet<String>>,
}

impl PresenceSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `address`. Returns `false` if it was already present.
    pub async fn add(&self, address: impl Into<String>) -> bool {
        self.devices.write().await.insert(address.into())
    }

    /// Forget `address`. Returns `false` if it was not present.
    pub async fn remove(&self, address: &str) -> bool {
        self.devices.write().await.remove(address)
    }

    /// Whether `address` is present.
    pub async fn contains(&self, address: &str) -> bool {
        self.devices.read().await.contains(address)
    }

    /// All present addresses.
    pub async fn list(&self) -> Vec<String> {
        self.devices.read().await.iter().cloned().collect()
    }

    /// Number of present addresses.
    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }
}
