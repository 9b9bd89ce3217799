//! The in-memory list of allowed clients.
use tokio::sync::RwLock;

use super::super::WhitelistEntry;
use crate::primitives::peer::PeerId;

/// In-memory whitelist of allowed client `peer_id` prefixes.
#[derive(Debug, Default)]
pub struct InMemoryWhitelist {
    entries: RwLock<Vec<WhitelistEntry>>,
}

impl InMemoryWhitelist {
    /// Adds a client to the in-memory whitelist.
    ///
    /// # Returns
    ///
    /// - `true` if the client was newly added.
    /// - `false` if an entry with the same prefix already existed.
    pub async fn add(&self, entry: WhitelistEntry) -> bool {
        let mut entries = self.entries.write().await;

        if entries.iter().any(|existing| existing.prefix == entry.prefix) {
            return false;
        }

        entries.push(entry);
        true
    }

    /// Removes a client from the in-memory whitelist.
    ///
    /// # Returns
    ///
    /// - `true` if the client was present and removed.
    /// - `false` if no entry had that prefix.
    pub(crate) async fn remove(&self, prefix: &str) -> bool {
        let mut entries = self.entries.write().await;

        match entries.iter().position(|entry| entry.prefix == prefix) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Checks whether the peer id belongs to whitelisted client software.
    pub async fn is_valid_client(&self, peer_id: &PeerId) -> bool {
        self.entries
            .read()
            .await
            .iter()
            .any(|entry| peer_id.0.starts_with(entry.prefix.as_bytes()))
    }

    /// Clears all clients from the whitelist.
    pub(crate) async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// A snapshot of the current entries.
    pub async fn entries(&self) -> Vec<WhitelistEntry> {
        self.entries.read().await.clone()
    }
}
