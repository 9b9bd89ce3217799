//! Whitelist manager.
//!
//! Keeps the in-memory client whitelist and the backing store in step for
//! the admin operations and for warm-up.
use std::sync::Arc;

use super::repository::in_memory::InMemoryWhitelist;
use super::WhitelistEntry;
use crate::databases::{self, TorrentStore};

/// Manages the whitelist of allowed clients.
///
/// Whitelist entries are persisted alongside the torrent data, so this
/// manager talks to the torrent store.
pub struct WhitelistManager {
    /// The persisted list of allowed clients.
    torrent_store: Arc<dyn TorrentStore>,

    /// The in-memory list of allowed clients.
    in_memory_whitelist: Arc<InMemoryWhitelist>,
}

impl WhitelistManager {
    #[must_use]
    pub fn new(torrent_store: Arc<dyn TorrentStore>, in_memory_whitelist: &Arc<InMemoryWhitelist>) -> Self {
        Self {
            torrent_store,
            in_memory_whitelist: in_memory_whitelist.clone(),
        }
    }

    /// Adds a client to the whitelist.
    ///
    /// # Errors
    ///
    /// Returns a `databases::error::Error` if the operation fails in the store.
    pub async fn add_client(&self, entry: WhitelistEntry) -> Result<(), databases::error::Error> {
        self.torrent_store.whitelist_add(&entry)?;
        self.in_memory_whitelist.add(entry).await;
        Ok(())
    }

    /// Removes a client from the whitelist.
    ///
    /// # Errors
    ///
    /// Returns a `databases::error::Error` if the operation fails in the store.
    pub async fn remove_client(&self, prefix: &str) -> Result<(), databases::error::Error> {
        self.torrent_store.whitelist_remove(prefix)?;
        self.in_memory_whitelist.remove(prefix).await;
        Ok(())
    }

    /// Loads the whitelist from the store into memory.
    ///
    /// This is used on warm-up to ensure the in-memory whitelist is
    /// synchronized with the store.
    ///
    /// # Errors
    ///
    /// Returns a `databases::error::Error` if the whitelist cannot be loaded.
    pub async fn load_whitelist_from_store(&self) -> Result<(), databases::error::Error> {
        let whitelisted_clients = self.torrent_store.whitelist_all()?;

        self.in_memory_whitelist.clear().await;

        for entry in whitelisted_clients {
            let _: bool = self.in_memory_whitelist.add(entry).await;
        }

        Ok(())
    }
}
