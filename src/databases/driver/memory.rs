//! The in-process memory store driver.
//!
//! Volatile by definition: "persistence" lasts for the lifetime of the
//! process. It exists so that the engine can run without external services,
//! and it is the store the test suite exercises.
use std::collections::HashMap;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::RwLock;

use super::super::error::Error;
use super::super::{PeerStore, Stores, TorrentStore, UserStore};
use super::Driver;
use crate::authentication::{Passkey, User};
use crate::flush::{PeerStatsDelta, TorrentStatsDelta, UserStatsDelta};
use crate::primitives::info_hash::InfoHash;
use crate::primitives::peer::{Peer, PeerId, PeerKey};
use crate::torrent::Torrent;
use crate::whitelist::WhitelistEntry;

const DRIVER: Driver = Driver::Memory;

/// Builds the three memory-backed store kinds.
#[must_use]
pub(crate) fn build() -> Stores {
    Stores {
        peers: Arc::new(MemoryPeerStore::default()),
        torrents: Arc::new(MemoryTorrentStore::default()),
        users: Arc::new(MemoryUserStore::default()),
    }
}

/// Memory-backed torrent store. Also holds the persisted client whitelist.
#[derive(Debug, Default)]
pub struct MemoryTorrentStore {
    torrents: RwLock<HashMap<InfoHash, Torrent>>,
    whitelist: RwLock<Vec<WhitelistEntry>>,
}

impl TorrentStore for MemoryTorrentStore {
    fn sync(&self, batch: &HashMap<InfoHash, TorrentStatsDelta>) -> Result<(), Error> {
        let mut torrents = self.torrents.write();

        for (info_hash, stats) in batch {
            // Torrent deleted before the sync occurred.
            let Some(torrent) = torrents.get_mut(info_hash) else {
                continue;
            };

            torrent.total_uploaded += stats.uploaded;
            torrent.total_downloaded += stats.downloaded;
            torrent.completed += stats.snatches;
        }

        Ok(())
    }

    fn get(&self, info_hash: &InfoHash) -> Result<Option<Torrent>, Error> {
        Ok(self
            .torrents
            .read()
            .get(info_hash)
            .filter(|torrent| !torrent.is_deleted)
            .cloned())
    }

    fn add(&self, torrent: &Torrent) -> Result<(), Error> {
        let mut torrents = self.torrents.write();

        if torrents.contains_key(&torrent.info_hash) {
            return Err(Error::Duplicate {
                location: Location::caller(),
                driver: DRIVER,
            });
        }

        torrents.insert(torrent.info_hash, torrent.clone());

        Ok(())
    }

    fn delete(&self, info_hash: &InfoHash, hard: bool) -> Result<(), Error> {
        let mut torrents = self.torrents.write();

        if hard {
            torrents.remove(info_hash);
        } else if let Some(torrent) = torrents.get_mut(info_hash) {
            torrent.is_deleted = true;
        }

        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Torrent>, Error> {
        Ok(self
            .torrents
            .read()
            .values()
            .filter(|torrent| !torrent.is_deleted)
            .cloned()
            .collect())
    }

    fn whitelist_add(&self, entry: &WhitelistEntry) -> Result<(), Error> {
        self.whitelist.write().push(entry.clone());
        Ok(())
    }

    fn whitelist_remove(&self, prefix: &str) -> Result<(), Error> {
        let mut whitelist = self.whitelist.write();

        match whitelist.iter().position(|entry| entry.prefix == prefix) {
            Some(index) => {
                whitelist.remove(index);
                Ok(())
            }
            None => Err(Error::NotFound {
                location: Location::caller(),
                driver: DRIVER,
            }),
        }
    }

    fn whitelist_all(&self) -> Result<Vec<WhitelistEntry>, Error> {
        Ok(self.whitelist.read().clone())
    }

    fn close(&self) -> Result<(), Error> {
        self.torrents.write().clear();
        self.whitelist.write().clear();
        Ok(())
    }
}

/// Memory-backed peer store. Swarms are plain vectors; at this layer the
/// peer volume is whatever the flusher pushed, not the live index.
#[derive(Debug, Default)]
pub struct MemoryPeerStore {
    peers: RwLock<HashMap<InfoHash, Vec<Peer>>>,
}

impl PeerStore for MemoryPeerStore {
    fn sync(&self, batch: &HashMap<PeerKey, PeerStatsDelta>) -> Result<(), Error> {
        let mut peers = self.peers.write();

        for (peer_key, stats) in batch {
            let Some(swarm) = peers.get_mut(&peer_key.info_hash()) else {
                continue;
            };

            if let Some(peer) = swarm.iter_mut().find(|peer| peer.peer_id == peer_key.peer_id()) {
                peer.uploaded += stats.uploaded;
                peer.downloaded += stats.downloaded;
                peer.announces += stats.announces;
                peer.last_announce = stats.last_announce;
            }
        }

        Ok(())
    }

    fn get(&self, info_hash: &InfoHash, peer_id: &PeerId) -> Result<Option<Peer>, Error> {
        Ok(self
            .peers
            .read()
            .get(info_hash)
            .and_then(|swarm| swarm.iter().find(|peer| peer.peer_id == *peer_id).copied()))
    }

    fn add(&self, info_hash: &InfoHash, peer: &Peer) -> Result<(), Error> {
        self.peers.write().entry(*info_hash).or_default().push(*peer);
        Ok(())
    }

    fn delete(&self, info_hash: &InfoHash, peer_id: &PeerId) -> Result<(), Error> {
        if let Some(swarm) = self.peers.write().get_mut(info_hash) {
            swarm.retain(|peer| peer.peer_id != *peer_id);
        }

        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        self.peers.write().clear();
        Ok(())
    }
}

/// Memory-backed user store.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Passkey, User>>,
}

impl UserStore for MemoryUserStore {
    fn sync(&self, batch: &HashMap<Passkey, UserStatsDelta>) -> Result<(), Error> {
        let mut users = self.users.write();

        for (passkey, stats) in batch {
            // Deleted user.
            let Some(user) = users.get_mut(passkey) else {
                continue;
            };

            user.announces += stats.announces;
            user.downloaded += stats.downloaded;
            user.uploaded += stats.uploaded;
        }

        Ok(())
    }

    fn get_by_passkey(&self, passkey: &Passkey) -> Result<Option<User>, Error> {
        Ok(self.users.read().get(passkey).cloned())
    }

    fn add(&self, user: &User) -> Result<(), Error> {
        self.users.write().insert(user.passkey.clone(), user.clone());
        Ok(())
    }

    fn delete(&self, passkey: &Passkey) -> Result<(), Error> {
        self.users.write().remove(passkey);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<User>, Error> {
        Ok(self.users.read().values().cloned().collect())
    }

    fn close(&self) -> Result<(), Error> {
        self.users.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::databases::driver::tests::run_tests;

    #[test]
    fn run_memory_driver_tests() {
        let stores = super::build();

        run_tests(&stores);
    }
}
