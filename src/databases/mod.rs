//! The persistence module.
//!
//! The engine is stateless across restarts except through the backing
//! store. Three store kinds cover the persistent objects:
//!
//! - **Peer store**: last-known peer rows, updated in batches by the flusher.
//! - **Torrent store**: torrent records and lifetime counters, plus the
//!   client whitelist.
//! - **User store**: user records and lifetime counters.
//!
//! There are three drivers: **memory**, **`MySQL`** and **Redis**. The
//! driver is picked by name from the configuration; see [`driver`].
//!
//! The hot announce path never calls into a store. All persistent updates
//! are staged as in-memory deltas and submitted here in batches through the
//! `sync` methods, by the flusher job only. A dropped batch loses nothing
//! durable: the counters are advisory and the peers re-announce.
//!
//! > **NOTICE**: peer lists are effectively ephemeral. On warm-up only the
//! > torrents, users and whitelist are loaded; peers are never restored.
pub mod driver;
pub mod error;
pub mod setup;

use std::collections::HashMap;
use std::sync::Arc;

use mockall::automock;

use self::error::Error;
use crate::authentication::{Passkey, User};
use crate::flush::{PeerStatsDelta, TorrentStatsDelta, UserStatsDelta};
use crate::primitives::info_hash::InfoHash;
use crate::primitives::peer::{Peer, PeerId, PeerKey};
use crate::torrent::Torrent;
use crate::whitelist::WhitelistEntry;

/// The peer store kind.
#[automock]
pub trait PeerStore: Sync + Send {
    /// Batch-applies accumulated peer deltas.
    ///
    /// Unknown peers in the batch are skipped: the peer may have stopped or
    /// been reaped since the deltas were staged.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the batch cannot be applied.
    fn sync(&self, batch: &HashMap<PeerKey, PeerStatsDelta>) -> Result<(), Error>;

    /// Fetches one peer row.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the store cannot be queried.
    fn get(&self, info_hash: &InfoHash, peer_id: &PeerId) -> Result<Option<Peer>, Error>;

    /// Inserts the peer into the torrent's persisted swarm.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the peer cannot be saved.
    fn add(&self, info_hash: &InfoHash, peer: &Peer) -> Result<(), Error>;

    /// Removes the peer from the torrent's persisted swarm. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the peer cannot be removed.
    fn delete(&self, info_hash: &InfoHash, peer_id: &PeerId) -> Result<(), Error>;

    /// Releases the underlying connection or memory.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the store cannot be closed.
    fn close(&self) -> Result<(), Error>;
}

/// The torrent store kind. Also persists the client whitelist, which lives
/// alongside the torrent data.
#[automock]
pub trait TorrentStore: Sync + Send {
    /// Batch-applies accumulated torrent deltas.
    ///
    /// Torrents deleted since the deltas were staged are skipped.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the batch cannot be applied.
    fn sync(&self, batch: &HashMap<InfoHash, TorrentStatsDelta>) -> Result<(), Error>;

    /// Fetches one torrent record. Soft-deleted torrents are not returned.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the store cannot be queried.
    fn get(&self, info_hash: &InfoHash) -> Result<Option<Torrent>, Error>;

    /// Inserts a torrent record.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the torrent already exists or cannot be saved.
    fn add(&self, torrent: &Torrent) -> Result<(), Error>;

    /// Deletes a torrent: soft flips the `is_deleted` flag, hard removes the
    /// record.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the torrent cannot be deleted.
    fn delete(&self, info_hash: &InfoHash, hard: bool) -> Result<(), Error>;

    /// Loads every non-deleted torrent record, for warm-up.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the torrents cannot be loaded.
    fn load_all(&self) -> Result<Vec<Torrent>, Error>;

    /// Inserts a client into the persisted whitelist.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the entry cannot be saved.
    fn whitelist_add(&self, entry: &WhitelistEntry) -> Result<(), Error>;

    /// Removes a client from the persisted whitelist.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the entry cannot be removed.
    fn whitelist_remove(&self, prefix: &str) -> Result<(), Error>;

    /// Fetches all whitelisted clients.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the whitelist cannot be loaded.
    fn whitelist_all(&self) -> Result<Vec<WhitelistEntry>, Error>;

    /// Releases the underlying connection or memory.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the store cannot be closed.
    fn close(&self) -> Result<(), Error>;
}

/// The user store kind.
#[automock]
pub trait UserStore: Sync + Send {
    /// Batch-applies accumulated user deltas.
    ///
    /// Users deleted since the deltas were staged are skipped.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the batch cannot be applied.
    fn sync(&self, batch: &HashMap<Passkey, UserStatsDelta>) -> Result<(), Error>;

    /// Fetches one user record by passkey.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the store cannot be queried.
    fn get_by_passkey(&self, passkey: &Passkey) -> Result<Option<User>, Error>;

    /// Inserts a user record.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the user cannot be saved.
    fn add(&self, user: &User) -> Result<(), Error>;

    /// Removes a user record. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the user cannot be removed.
    fn delete(&self, passkey: &Passkey) -> Result<(), Error>;

    /// Loads every user record, for warm-up.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the users cannot be loaded.
    fn load_all(&self) -> Result<Vec<User>, Error>;

    /// Releases the underlying connection or memory.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the store cannot be closed.
    fn close(&self) -> Result<(), Error>;
}

/// The three store kinds of one configured driver.
#[derive(Clone)]
pub struct Stores {
    pub peers: Arc<dyn PeerStore>,
    pub torrents: Arc<dyn TorrentStore>,
    pub users: Arc<dyn UserStore>,
}

impl Stores {
    /// Closes all three stores, reporting the first failure after trying
    /// every one.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error`] encountered.
    pub fn close(&self) -> Result<(), Error> {
        let results = [self.peers.close(), self.torrents.close(), self.users.close()];

        for result in results {
            result?;
        }

        Ok(())
    }
}
