//! The in-memory swarm index.
//!
//! Torrents are distributed across a fixed power-of-two number of shards
//! based on a stable hash of the infohash, each shard protected by its own
//! `RwLock`. Announces for distinct infohashes therefore never serialize
//! through a single lock, and all operations on one swarm touch exactly one
//! shard.
//!
//! Shard locks are short-lived: nothing holds one across a backing-store
//! call or an await point. The announce mutation and the peer selection for
//! its response run in the same critical section, so the response always
//! reflects the swarm state after that announce, never a mixed snapshot.
use std::collections::HashMap;
use std::panic::Location;

use parking_lot::{Mutex, RwLock};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::SwarmPolicy;
use crate::error::TorrentError;
use crate::primitives::info_hash::InfoHash;
use crate::primitives::peer::{Peer, PeerId};
use crate::primitives::swarm_metadata::SwarmMetadata;
use crate::primitives::DurationSinceUnixEpoch;
use crate::torrent::entry::{AnnounceOutcome, PeerAnnouncement, TorrentEntry};
use crate::torrent::Torrent;

struct Shard {
    torrents: RwLock<HashMap<InfoHash, TorrentEntry>>,
}

impl Shard {
    fn new() -> Self {
        Self {
            torrents: RwLock::new(HashMap::new()),
        }
    }
}

/// The sharded in-memory torrents repository.
pub struct InMemoryTorrentRepository {
    shards: Box<[Shard]>,

    /// Offset source for peer selection. Seeded in tests to make selection
    /// deterministic.
    selector: Mutex<SmallRng>,
}

impl Default for InMemoryTorrentRepository {
    fn default() -> Self {
        Self::new(SwarmPolicy::default().shard_count)
    }
}

impl InMemoryTorrentRepository {
    /// Creates a repository with `shard_count` shards.
    ///
    /// # Panics
    ///
    /// Will panic if `shard_count` is zero or not a power of two.
    #[must_use]
    pub fn new(shard_count: usize) -> Self {
        assert!(
            shard_count.is_power_of_two(),
            "shard count must be a nonzero power of two, got {shard_count}"
        );

        Self {
            shards: (0..shard_count).map(|_| Shard::new()).collect(),
            selector: Mutex::new(SmallRng::from_os_rng()),
        }
    }

    /// Like [`new`](Self::new), but with a fixed selection seed so that peer
    /// selection is deterministic.
    #[must_use]
    pub fn with_selection_seed(shard_count: usize, seed: u64) -> Self {
        let mut repository = Self::new(shard_count);
        repository.selector = Mutex::new(SmallRng::seed_from_u64(seed));
        repository
    }

    fn shard(&self, info_hash: &InfoHash) -> &Shard {
        let bytes = info_hash.bytes();
        let hash = u64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]);

        // The shard count is a power of two, so masking is a uniform pick.
        &self.shards[(hash as usize) & (self.shards.len() - 1)]
    }

    /// Registers a torrent.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::AlreadyExists`] if the infohash is already
    /// tracked (soft-deleted entries included).
    pub fn add_torrent(&self, torrent: Torrent) -> Result<(), TorrentError> {
        let mut torrents = self.shard(&torrent.info_hash).torrents.write();

        if torrents.contains_key(&torrent.info_hash) {
            return Err(TorrentError::AlreadyExists {
                info_hash: torrent.info_hash,
                location: Location::caller(),
            });
        }

        torrents.insert(torrent.info_hash, TorrentEntry::new(torrent));

        Ok(())
    }

    /// Deletes a torrent. A soft delete flips `is_deleted` and keeps the
    /// entry; a hard delete removes the entry and drops its swarm.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::NotFound`] if the infohash is unknown.
    pub fn delete_torrent(&self, info_hash: &InfoHash, hard: bool) -> Result<(), TorrentError> {
        let mut torrents = self.shard(info_hash).torrents.write();

        if hard {
            torrents.remove(info_hash).ok_or(TorrentError::NotFound {
                info_hash: *info_hash,
                location: Location::caller(),
            })?;
        } else {
            let entry = torrents.get_mut(info_hash).ok_or(TorrentError::NotFound {
                info_hash: *info_hash,
                location: Location::caller(),
            })?;

            entry.torrent_mut().is_deleted = true;
        }

        Ok(())
    }

    /// Returns a value snapshot of the torrent record, or `None` if the
    /// torrent is unknown or soft-deleted.
    #[must_use]
    pub fn get_torrent(&self, info_hash: &InfoHash) -> Option<Torrent> {
        let torrents = self.shard(info_hash).torrents.read();

        torrents
            .get(info_hash)
            .filter(|entry| !entry.torrent().is_deleted)
            .map(|entry| entry.torrent().clone())
    }

    /// Returns a value snapshot of one peer.
    #[must_use]
    pub fn get_peer(&self, info_hash: &InfoHash, peer_id: &PeerId) -> Option<Peer> {
        let torrents = self.shard(info_hash).torrents.read();

        torrents.get(info_hash).and_then(|entry| entry.get_peer(peer_id).copied())
    }

    /// Inserts or replaces a peer directly, adjusting the swarm tallies.
    ///
    /// The announce path goes through [`apply_announce`](Self::apply_announce)
    /// instead; this is the building block for tests and imports.
    pub fn upsert_peer(&self, info_hash: &InfoHash, peer: Peer) -> bool {
        let mut torrents = self.shard(info_hash).torrents.write();

        match torrents.get_mut(info_hash) {
            Some(entry) => {
                entry.upsert_peer(peer);
                true
            }
            None => false,
        }
    }

    /// Removes a peer, adjusting the swarm tallies. Idempotent.
    pub fn remove_peer(&self, info_hash: &InfoHash, peer_id: &PeerId) {
        let mut torrents = self.shard(info_hash).torrents.write();

        if let Some(entry) = torrents.get_mut(info_hash) {
            entry.remove_peer(peer_id);
        }
    }

    /// Applies one announce to the swarm and selects up to `num_want` peers
    /// for the response, all under a single acquisition of the shard lock.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::NotFound`] if the torrent is unknown or
    /// soft-deleted.
    pub fn apply_announce(
        &self,
        info_hash: &InfoHash,
        announcement: &PeerAnnouncement,
        num_want: usize,
        now: DurationSinceUnixEpoch,
    ) -> Result<AnnounceOutcome, TorrentError> {
        // Drawn before taking the shard lock; with a seeded selector the
        // sequence of offsets is still deterministic.
        let offset = self.selector.lock().random::<u64>() as usize;

        let mut torrents = self.shard(info_hash).torrents.write();

        let entry = torrents
            .get_mut(info_hash)
            .filter(|entry| !entry.torrent().is_deleted)
            .ok_or(TorrentError::NotFound {
                info_hash: *info_hash,
                location: Location::caller(),
            })?;

        let mut outcome = entry.apply_announce(announcement, now);

        if num_want > 0 {
            outcome.peers = entry.select_peers(num_want, &announcement.peer_id, offset);
        }

        Ok(outcome)
    }

    /// Selects up to `limit` active peers of the swarm, excluding
    /// `exclude_peer_id`.
    #[must_use]
    pub fn select_peers(&self, info_hash: &InfoHash, limit: usize, exclude_peer_id: &PeerId) -> Vec<Peer> {
        let offset = self.selector.lock().random::<u64>() as usize;

        let torrents = self.shard(info_hash).torrents.read();

        match torrents.get(info_hash) {
            Some(entry) => entry.select_peers(limit, exclude_peer_id, offset),
            None => Vec::new(),
        }
    }

    /// Returns the swarm counters for a `scrape` response, or `None` if the
    /// torrent is unknown or soft-deleted (scrape omits such files).
    #[must_use]
    pub fn get_swarm_metadata(&self, info_hash: &InfoHash) -> Option<SwarmMetadata> {
        let torrents = self.shard(info_hash).torrents.read();

        torrents
            .get(info_hash)
            .filter(|entry| !entry.torrent().is_deleted)
            .map(TorrentEntry::get_swarm_metadata)
    }

    /// Walks every shard and evicts peers whose last announce is older than
    /// `cutoff`. Tallies are adjusted within each shard's critical section.
    /// Returns the total number of peers reaped.
    pub fn remove_inactive_peers(&self, cutoff: DurationSinceUnixEpoch) -> usize {
        let mut reaped = 0;

        for shard in &self.shards {
            let mut torrents = shard.torrents.write();

            for entry in torrents.values_mut() {
                reaped += entry.remove_inactive_peers(cutoff);
            }
        }

        reaped
    }

    /// Imports torrent records loaded from the backing store on warm-up.
    /// Peers are never imported; they re-announce.
    pub fn import_persistent(&self, torrents: &[Torrent]) {
        for torrent in torrents {
            let mut shard = self.shard(&torrent.info_hash).torrents.write();

            shard
                .entry(torrent.info_hash)
                .or_insert_with(|| TorrentEntry::new(torrent.clone()));
        }
    }

    /// Number of tracked torrents, soft-deleted entries included.
    #[must_use]
    pub fn count_torrents(&self) -> usize {
        self.shards.iter().map(|shard| shard.torrents.read().len()).sum()
    }
}

impl std::fmt::Debug for InMemoryTorrentRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTorrentRepository")
            .field("shards", &self.shards.len())
            .field("torrents", &self.count_torrents())
            .finish()
    }
}

#[cfg(test)]
mod tests {

    mod the_in_memory_torrent_repository {

        use std::sync::Arc;

        use crate::test_helpers::tests::{sample_info_hash, sample_torrent};
        use crate::torrent::repository::in_memory::InMemoryTorrentRepository;

        fn repository_with_sample_torrent() -> (Arc<InMemoryTorrentRepository>, crate::primitives::info_hash::InfoHash) {
            let repository = Arc::new(InMemoryTorrentRepository::default());
            let info_hash = sample_info_hash();

            repository.add_torrent(sample_torrent(&info_hash)).unwrap();

            (repository, info_hash)
        }

        mod maintaining_the_torrent_entries {
            use crate::error::TorrentError;
            use crate::test_helpers::tests::{random_info_hash, sample_info_hash, sample_torrent};
            use crate::torrent::repository::in_memory::tests::the_in_memory_torrent_repository::repository_with_sample_torrent;
            use crate::torrent::repository::in_memory::InMemoryTorrentRepository;

            #[test]
            fn it_should_track_an_added_torrent() {
                let (repository, info_hash) = repository_with_sample_torrent();

                assert!(repository.get_torrent(&info_hash).is_some());
            }

            #[test]
            fn it_should_reject_adding_the_same_infohash_twice() {
                let (repository, info_hash) = repository_with_sample_torrent();

                let result = repository.add_torrent(sample_torrent(&info_hash));

                assert!(matches!(result.unwrap_err(), TorrentError::AlreadyExists { .. }));
            }

            #[test]
            fn it_should_hide_a_soft_deleted_torrent_from_lookups() {
                let (repository, info_hash) = repository_with_sample_torrent();

                repository.delete_torrent(&info_hash, false).unwrap();

                assert!(repository.get_torrent(&info_hash).is_none());
                assert_eq!(repository.count_torrents(), 1);
            }

            #[test]
            fn it_should_drop_the_entry_on_a_hard_delete() {
                let (repository, info_hash) = repository_with_sample_torrent();

                repository.delete_torrent(&info_hash, true).unwrap();

                assert!(repository.get_torrent(&info_hash).is_none());
                assert_eq!(repository.count_torrents(), 0);
            }

            #[test]
            fn it_should_fail_deleting_an_unknown_torrent() {
                let repository = InMemoryTorrentRepository::default();

                let result = repository.delete_torrent(&sample_info_hash(), true);

                assert!(matches!(result.unwrap_err(), TorrentError::NotFound { .. }));
            }

            #[test]
            fn it_should_spread_torrents_across_shards_without_losing_any() {
                let repository = InMemoryTorrentRepository::default();

                for _ in 0..100 {
                    let info_hash = random_info_hash();
                    repository.add_torrent(sample_torrent(&info_hash)).unwrap();
                    assert!(repository.get_torrent(&info_hash).is_some());
                }

                assert_eq!(repository.count_torrents(), 100);
            }
        }

        mod maintaining_the_peer_lists {
            use crate::test_helpers::tests::{numeric_peer_id, sample_peer};
            use crate::torrent::repository::in_memory::tests::the_in_memory_torrent_repository::repository_with_sample_torrent;

            #[test]
            fn it_should_upsert_a_peer_and_adjust_the_tallies() {
                let (repository, info_hash) = repository_with_sample_torrent();

                let mut peer = sample_peer();
                peer.left = 1000;
                assert!(repository.upsert_peer(&info_hash, peer));

                assert_eq!(repository.get_swarm_metadata(&info_hash).unwrap().incomplete, 1);

                // Replacing the same peer as a seeder moves it between tallies.
                peer.left = 0;
                assert!(repository.upsert_peer(&info_hash, peer));

                let stats = repository.get_swarm_metadata(&info_hash).unwrap();
                assert_eq!(stats.complete, 1);
                assert_eq!(stats.incomplete, 0);
            }

            #[test]
            fn it_should_not_upsert_a_peer_into_an_unknown_torrent() {
                let (repository, _info_hash) = repository_with_sample_torrent();

                assert!(!repository.upsert_peer(&crate::test_helpers::tests::random_info_hash(), sample_peer()));
            }

            #[test]
            fn it_should_remove_a_peer_idempotently() {
                let (repository, info_hash) = repository_with_sample_torrent();

                let peer = sample_peer();
                repository.upsert_peer(&info_hash, peer);

                repository.remove_peer(&info_hash, &peer.peer_id);
                repository.remove_peer(&info_hash, &peer.peer_id);

                assert!(repository.get_peer(&info_hash, &peer.peer_id).is_none());
                assert_eq!(repository.get_swarm_metadata(&info_hash).unwrap().complete, 0);
            }

            #[test]
            fn it_should_select_peers_excluding_the_requester() {
                let (repository, info_hash) = repository_with_sample_torrent();

                for idx in 1..=5 {
                    let mut peer = sample_peer();
                    peer.peer_id = numeric_peer_id(idx);
                    repository.upsert_peer(&info_hash, peer);
                }

                let requester = numeric_peer_id(1);
                let peers = repository.select_peers(&info_hash, 10, &requester);

                assert_eq!(peers.len(), 4);
                assert!(peers.iter().all(|peer| peer.peer_id != requester));
            }

            #[test]
            fn it_should_select_nothing_from_an_unknown_torrent() {
                let (repository, _info_hash) = repository_with_sample_torrent();

                let peers = repository.select_peers(&crate::test_helpers::tests::random_info_hash(), 10, &numeric_peer_id(1));

                assert!(peers.is_empty());
            }
        }

        mod handling_announces {
            use std::time::Duration;

            use crate::error::TorrentError;
            use crate::primitives::peer::AnnounceEvent;
            use crate::test_helpers::tests::{sample_announcement, sample_info_hash};
            use crate::torrent::repository::in_memory::tests::the_in_memory_torrent_repository::repository_with_sample_torrent;
            use crate::torrent::repository::in_memory::InMemoryTorrentRepository;

            #[test]
            fn it_should_fail_for_an_unknown_infohash() {
                let repository = InMemoryTorrentRepository::default();

                let announcement = sample_announcement(1, AnnounceEvent::Started, 1000);
                let result = repository.apply_announce(&sample_info_hash(), &announcement, 30, Duration::ZERO);

                assert!(matches!(result.unwrap_err(), TorrentError::NotFound { .. }));
            }

            #[test]
            fn it_should_fail_for_a_soft_deleted_torrent() {
                let (repository, info_hash) = repository_with_sample_torrent();

                repository.delete_torrent(&info_hash, false).unwrap();

                let announcement = sample_announcement(1, AnnounceEvent::Started, 1000);
                let result = repository.apply_announce(&info_hash, &announcement, 30, Duration::ZERO);

                assert!(matches!(result.unwrap_err(), TorrentError::NotFound { .. }));
            }

            #[test]
            fn it_should_mutate_the_swarm_and_select_peers_in_one_step() {
                let (repository, info_hash) = repository_with_sample_torrent();

                let first = sample_announcement(1, AnnounceEvent::Started, 1000);
                let outcome = repository.apply_announce(&info_hash, &first, 30, Duration::ZERO).unwrap();

                assert_eq!(outcome.stats.incomplete, 1);
                assert!(outcome.peers.is_empty());

                let second = sample_announcement(2, AnnounceEvent::Started, 1000);
                let outcome = repository.apply_announce(&info_hash, &second, 30, Duration::ZERO).unwrap();

                assert_eq!(outcome.stats.incomplete, 2);
                assert_eq!(outcome.peers.len(), 1);
                assert_eq!(outcome.peers[0].peer_id, first.peer_id);
            }

            #[test]
            fn it_should_not_select_peers_when_none_are_wanted() {
                let (repository, info_hash) = repository_with_sample_torrent();

                let first = sample_announcement(1, AnnounceEvent::Started, 1000);
                repository.apply_announce(&info_hash, &first, 30, Duration::ZERO).unwrap();

                let second = sample_announcement(2, AnnounceEvent::Started, 1000);
                let outcome = repository.apply_announce(&info_hash, &second, 0, Duration::ZERO).unwrap();

                assert!(outcome.peers.is_empty());
            }

            #[test]
            fn it_should_select_deterministically_with_a_seeded_offset_source() {
                let repository_one = InMemoryTorrentRepository::with_selection_seed(64, 42);
                let repository_two = InMemoryTorrentRepository::with_selection_seed(64, 42);

                let info_hash = sample_info_hash();

                for repository in [&repository_one, &repository_two] {
                    repository
                        .add_torrent(crate::test_helpers::tests::sample_torrent(&info_hash))
                        .unwrap();

                    for idx in 1..=10 {
                        let announcement = sample_announcement(idx, AnnounceEvent::Started, 1000);
                        repository.apply_announce(&info_hash, &announcement, 30, Duration::ZERO).unwrap();
                    }
                }

                let requester = sample_announcement(1, AnnounceEvent::Started, 1000);

                let peers_one: Vec<_> = repository_one
                    .apply_announce(&info_hash, &requester, 5, Duration::ZERO)
                    .unwrap()
                    .peers;
                let peers_two: Vec<_> = repository_two
                    .apply_announce(&info_hash, &requester, 5, Duration::ZERO)
                    .unwrap()
                    .peers;

                assert_eq!(peers_one, peers_two);
            }
        }

        mod reaping_inactive_peers {
            use std::time::Duration;

            use crate::primitives::peer::AnnounceEvent;
            use crate::test_helpers::tests::{random_info_hash, sample_announcement, sample_torrent};
            use crate::torrent::repository::in_memory::InMemoryTorrentRepository;

            #[test]
            fn it_should_reap_across_all_shards() {
                let repository = InMemoryTorrentRepository::default();

                for _ in 0..20 {
                    let info_hash = random_info_hash();
                    repository.add_torrent(sample_torrent(&info_hash)).unwrap();

                    let announcement = sample_announcement(1, AnnounceEvent::Started, 1000);
                    repository
                        .apply_announce(&info_hash, &announcement, 0, Duration::from_secs(100))
                        .unwrap();
                }

                let reaped = repository.remove_inactive_peers(Duration::from_secs(200));

                assert_eq!(reaped, 20);
                assert_eq!(repository.remove_inactive_peers(Duration::from_secs(200)), 0);
            }
        }

        mod handling_persistence {
            use crate::test_helpers::tests::{sample_info_hash, sample_torrent};
            use crate::torrent::repository::in_memory::InMemoryTorrentRepository;

            #[test]
            fn it_should_import_persisted_torrents_without_peers() {
                let repository = InMemoryTorrentRepository::default();

                let info_hash = sample_info_hash();
                let mut torrent = sample_torrent(&info_hash);
                torrent.completed = 7;

                repository.import_persistent(&[torrent]);

                let stats = repository.get_swarm_metadata(&info_hash).unwrap();

                assert_eq!(stats.downloaded, 7);
                assert_eq!(stats.complete, 0);
                assert_eq!(stats.incomplete, 0);
            }

            #[test]
            fn it_should_not_overwrite_a_live_entry_on_import() {
                let repository = InMemoryTorrentRepository::default();

                let info_hash = sample_info_hash();
                repository.add_torrent(sample_torrent(&info_hash)).unwrap();

                let mut stale = sample_torrent(&info_hash);
                stale.completed = 99;
                repository.import_persistent(&[stale]);

                assert_eq!(repository.get_swarm_metadata(&info_hash).unwrap().downloaded, 0);
            }
        }
    }
}
