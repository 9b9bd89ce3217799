//! Torrents manager.
//!
//! Keeps the swarm index and the backing store in step for the admin
//! operations (torrent insert, soft delete, purge) and loads the persisted
//! torrents on warm-up.
use std::sync::Arc;

use super::repository::in_memory::InMemoryTorrentRepository;
use super::Torrent;
use crate::databases::TorrentStore;
use crate::error::TorrentError;
use crate::primitives::info_hash::InfoHash;

pub struct TorrentsManager {
    /// The persisted torrents.
    torrent_store: Arc<dyn TorrentStore>,

    /// The sharded swarm index.
    in_memory_torrent_repository: Arc<InMemoryTorrentRepository>,
}

impl TorrentsManager {
    #[must_use]
    pub fn new(torrent_store: Arc<dyn TorrentStore>, in_memory_torrent_repository: &Arc<InMemoryTorrentRepository>) -> Self {
        Self {
            torrent_store,
            in_memory_torrent_repository: in_memory_torrent_repository.clone(),
        }
    }

    /// Registers a torrent in the store and materializes its swarm in the
    /// index.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::AlreadyExists`] for a duplicate infohash, or
    /// a wrapped store error.
    pub fn add_torrent(&self, torrent: Torrent) -> Result<(), TorrentError> {
        self.in_memory_torrent_repository.add_torrent(torrent.clone())?;

        self.torrent_store
            .add(&torrent)
            .map_err(|source| TorrentError::Database { source })?;

        Ok(())
    }

    /// Deletes a torrent in both layers. Soft deletes make it invisible;
    /// hard deletes drop the swarm.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::NotFound`] for an unknown infohash, or a
    /// wrapped store error.
    pub fn delete_torrent(&self, info_hash: &InfoHash, hard: bool) -> Result<(), TorrentError> {
        self.in_memory_torrent_repository.delete_torrent(info_hash, hard)?;

        self.torrent_store
            .delete(info_hash, hard)
            .map_err(|source| TorrentError::Database { source })?;

        Ok(())
    }

    /// Loads the persisted torrents into the swarm index. Only the torrent
    /// records and their lifetime counters are restored; peers re-announce.
    ///
    /// # Errors
    ///
    /// Returns a `databases::error::Error` if the torrents cannot be loaded.
    pub fn load_torrents_from_store(&self) -> Result<(), crate::databases::error::Error> {
        let torrents = self.torrent_store.load_all()?;

        self.in_memory_torrent_repository.import_persistent(&torrents);

        Ok(())
    }
}

#[cfg(test)]
mod tests {

    mod the_torrents_manager {
        use std::sync::Arc;

        use crate::databases::driver::memory::MemoryTorrentStore;
        use crate::databases::TorrentStore;
        use crate::error::TorrentError;
        use crate::test_helpers::tests::{sample_info_hash, sample_torrent};
        use crate::torrent::manager::TorrentsManager;
        use crate::torrent::repository::in_memory::InMemoryTorrentRepository;

        fn initialize_torrents_manager() -> (TorrentsManager, Arc<dyn TorrentStore>, Arc<InMemoryTorrentRepository>) {
            let torrent_store: Arc<dyn TorrentStore> = Arc::new(MemoryTorrentStore::default());
            let in_memory_torrent_repository = Arc::new(InMemoryTorrentRepository::default());
            let torrents_manager = TorrentsManager::new(torrent_store.clone(), &in_memory_torrent_repository);

            (torrents_manager, torrent_store, in_memory_torrent_repository)
        }

        #[test]
        fn it_should_add_a_torrent_to_both_layers() {
            let (torrents_manager, torrent_store, in_memory_torrent_repository) = initialize_torrents_manager();

            let info_hash = sample_info_hash();
            torrents_manager.add_torrent(sample_torrent(&info_hash)).unwrap();

            assert!(in_memory_torrent_repository.get_torrent(&info_hash).is_some());
            assert!(torrent_store.get(&info_hash).unwrap().is_some());
        }

        #[test]
        fn it_should_reject_a_duplicate_torrent() {
            let (torrents_manager, _torrent_store, _in_memory_torrent_repository) = initialize_torrents_manager();

            let info_hash = sample_info_hash();
            torrents_manager.add_torrent(sample_torrent(&info_hash)).unwrap();

            let result = torrents_manager.add_torrent(sample_torrent(&info_hash));

            assert!(matches!(result.unwrap_err(), TorrentError::AlreadyExists { .. }));
        }

        #[test]
        fn it_should_soft_delete_a_torrent_in_both_layers() {
            let (torrents_manager, torrent_store, in_memory_torrent_repository) = initialize_torrents_manager();

            let info_hash = sample_info_hash();
            torrents_manager.add_torrent(sample_torrent(&info_hash)).unwrap();

            torrents_manager.delete_torrent(&info_hash, false).unwrap();

            assert!(in_memory_torrent_repository.get_torrent(&info_hash).is_none());
            assert!(torrent_store.get(&info_hash).unwrap().is_none());

            // The entry is retained until a purge.
            assert_eq!(in_memory_torrent_repository.count_torrents(), 1);
        }

        #[test]
        fn it_should_hard_delete_a_torrent_in_both_layers() {
            let (torrents_manager, torrent_store, in_memory_torrent_repository) = initialize_torrents_manager();

            let info_hash = sample_info_hash();
            torrents_manager.add_torrent(sample_torrent(&info_hash)).unwrap();

            torrents_manager.delete_torrent(&info_hash, true).unwrap();

            assert_eq!(in_memory_torrent_repository.count_torrents(), 0);
            assert!(torrent_store.get(&info_hash).unwrap().is_none());
        }

        #[test]
        fn it_should_load_the_persisted_torrents_on_warm_up() {
            let (torrents_manager, torrent_store, in_memory_torrent_repository) = initialize_torrents_manager();

            let info_hash = sample_info_hash();
            let mut torrent = sample_torrent(&info_hash);
            torrent.completed = 3;
            torrent_store.add(&torrent).unwrap();

            torrents_manager.load_torrents_from_store().unwrap();

            let stats = in_memory_torrent_repository.get_swarm_metadata(&info_hash).unwrap();

            // Only the number of downloads is persisted; peers are not.
            assert_eq!(stats.downloaded, 3);
            assert_eq!(stats.complete, 0);
        }
    }
}
