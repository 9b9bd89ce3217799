//! A single torrent entry: the torrent record plus its live swarm.
//!
//! The entry owns the peer list and keeps the seeder/leecher tallies
//! denormalized, adjusting them on every mutation instead of recounting.
//! All announce-driven state transitions happen here, under the shard lock
//! held by the repository:
//!
//! | current \ event | started / announce | completed | stopped |
//! |---|---|---|---|
//! | absent | create | create as seeder, count snatch | noop |
//! | leecher | refresh | promote to seeder, count snatch | remove |
//! | seeder | refresh | refresh (spurious) | remove |
//!
//! A refresh also promotes and counts a snatch when the reported `left`
//! transitions from nonzero to zero, whatever the event says.
use std::collections::BTreeMap;

use super::Torrent;
use crate::primitives::info_hash::InfoHash;
use crate::primitives::peer::{AnnounceEvent, Peer, PeerId};
use crate::primitives::swarm_metadata::SwarmMetadata;
use crate::primitives::DurationSinceUnixEpoch;

/// The validated announce data the state machine consumes.
#[derive(Clone, Copy, Debug)]
pub struct PeerAnnouncement {
    pub peer_id: PeerId,
    pub ip: std::net::Ipv4Addr,
    pub port: u16,
    pub user_id: u32,
    pub uploaded: u64,
    pub downloaded: u64,
    pub corrupt: u64,
    pub left: u64,
    pub event: AnnounceEvent,
}

/// What one announce did to the swarm.
///
/// The counters and tallies reflect the state *after* the mutation; the
/// deltas are already clamped at zero (clients may lie or reset).
#[derive(Clone, Debug, Default)]
pub struct AnnounceOutcome {
    /// Swarm counters after this announce.
    pub stats: SwarmMetadata,

    /// Peers selected for the response. Filled by the repository within the
    /// same critical section as the mutation.
    pub peers: Vec<Peer>,

    pub uploaded_delta: u64,

    pub downloaded_delta: u64,

    /// Whether this announce completed a download (increments `completed`).
    pub snatched: bool,

    /// Whether any peer state changed. A `stopped` for an unknown peer is a
    /// noop and produces no deltas.
    pub touched: bool,
}

/// A torrent plus its swarm of active peers.
#[derive(Clone, Debug)]
pub struct TorrentEntry {
    torrent: Torrent,
    peers: BTreeMap<PeerId, Peer>,
    seeders: u32,
    leechers: u32,
}

impl TorrentEntry {
    #[must_use]
    pub fn new(torrent: Torrent) -> Self {
        Self {
            torrent,
            peers: BTreeMap::new(),
            seeders: 0,
            leechers: 0,
        }
    }

    #[must_use]
    pub fn torrent(&self) -> &Torrent {
        &self.torrent
    }

    pub(crate) fn torrent_mut(&mut self) -> &mut Torrent {
        &mut self.torrent
    }

    #[must_use]
    pub fn info_hash(&self) -> InfoHash {
        self.torrent.info_hash
    }

    #[must_use]
    pub fn get_swarm_metadata(&self) -> SwarmMetadata {
        SwarmMetadata {
            complete: self.seeders,
            downloaded: self.torrent.completed,
            incomplete: self.leechers,
        }
    }

    #[must_use]
    pub fn get_peer(&self, peer_id: &PeerId) -> Option<&Peer> {
        self.peers.get(peer_id)
    }

    #[must_use]
    pub fn peers_len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn peers_is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Applies one announce to the swarm and returns what it did.
    pub fn apply_announce(&mut self, announcement: &PeerAnnouncement, now: DurationSinceUnixEpoch) -> AnnounceOutcome {
        match announcement.event {
            AnnounceEvent::Stopped => self.apply_stopped(announcement),
            AnnounceEvent::Started | AnnounceEvent::Completed | AnnounceEvent::Announce => {
                self.apply_refresh(announcement, now)
            }
        }
    }

    fn apply_stopped(&mut self, announcement: &PeerAnnouncement) -> AnnounceOutcome {
        match self.remove_peer(&announcement.peer_id) {
            Some(previous) => {
                let uploaded_delta = announcement.uploaded.saturating_sub(previous.uploaded);
                let downloaded_delta = announcement.downloaded.saturating_sub(previous.downloaded);

                self.torrent.total_uploaded += uploaded_delta;
                self.torrent.total_downloaded += downloaded_delta;

                AnnounceOutcome {
                    stats: self.get_swarm_metadata(),
                    peers: Vec::new(),
                    uploaded_delta,
                    downloaded_delta,
                    snatched: false,
                    touched: true,
                }
            }
            // Stopping an unknown peer is a noop, so two consecutive stops
            // leave the swarm exactly where one did.
            None => AnnounceOutcome {
                stats: self.get_swarm_metadata(),
                ..AnnounceOutcome::default()
            },
        }
    }

    fn apply_refresh(&mut self, announcement: &PeerAnnouncement, now: DurationSinceUnixEpoch) -> AnnounceOutcome {
        let previous = self.peers.get(&announcement.peer_id).copied();

        let (uploaded_delta, downloaded_delta, snatched, peer) = match previous {
            Some(previous) => {
                let uploaded_delta = announcement.uploaded.saturating_sub(previous.uploaded);
                let downloaded_delta = announcement.downloaded.saturating_sub(previous.downloaded);

                // A snatch is the transition from "still downloading" to
                // "done". A seeder re-announcing `completed` does not count
                // again.
                let snatched = previous.left > 0 && announcement.left == 0;

                let peer = Peer {
                    peer_id: announcement.peer_id,
                    ip: announcement.ip,
                    port: announcement.port,
                    user_id: announcement.user_id,
                    uploaded: announcement.uploaded,
                    downloaded: announcement.downloaded,
                    corrupt: announcement.corrupt,
                    left: announcement.left,
                    announces: previous.announces + 1,
                    first_announce: previous.first_announce,
                    last_announce: now,
                    active: true,
                };

                (uploaded_delta, downloaded_delta, snatched, peer)
            }
            None => {
                let snatched = announcement.event == AnnounceEvent::Completed && announcement.left == 0;

                let peer = Peer {
                    peer_id: announcement.peer_id,
                    ip: announcement.ip,
                    port: announcement.port,
                    user_id: announcement.user_id,
                    uploaded: announcement.uploaded,
                    downloaded: announcement.downloaded,
                    corrupt: announcement.corrupt,
                    left: announcement.left,
                    announces: 1,
                    first_announce: now,
                    last_announce: now,
                    active: true,
                };

                (announcement.uploaded, announcement.downloaded, snatched, peer)
            }
        };

        let _previous = self.upsert_peer(peer);

        if snatched {
            self.torrent.completed += 1;
        }
        self.torrent.total_uploaded += uploaded_delta;
        self.torrent.total_downloaded += downloaded_delta;

        AnnounceOutcome {
            stats: self.get_swarm_metadata(),
            peers: Vec::new(),
            uploaded_delta,
            downloaded_delta,
            snatched,
            touched: true,
        }
    }

    /// Inserts or replaces the peer, keeping the tallies consistent with the
    /// old and new `left` values. Returns the replaced peer, if any.
    pub fn upsert_peer(&mut self, peer: Peer) -> Option<Peer> {
        let previous = self.peers.insert(peer.peer_id, peer);

        if let Some(previous) = previous {
            self.discount(&previous);
        }
        if peer.active {
            if peer.is_seeder() {
                self.seeders += 1;
            } else {
                self.leechers += 1;
            }
        }

        previous
    }

    /// Removes the peer, keeping the tallies consistent. Idempotent.
    pub fn remove_peer(&mut self, peer_id: &PeerId) -> Option<Peer> {
        let removed = self.peers.remove(peer_id);

        if let Some(removed) = &removed {
            self.discount(removed);
        }

        removed
    }

    fn discount(&mut self, peer: &Peer) {
        if peer.active {
            if peer.is_seeder() {
                self.seeders = self.seeders.saturating_sub(1);
            } else {
                self.leechers = self.leechers.saturating_sub(1);
            }
        }
    }

    /// Selects up to `limit` active peers, excluding the requester.
    ///
    /// Selection starts at `offset` into the (ordered) peer list and walks
    /// forward, wrapping, so repeated requests do not always see the same
    /// prefix of the swarm. With a fixed offset the result is deterministic.
    #[must_use]
    pub fn select_peers(&self, limit: usize, exclude: &PeerId, offset: usize) -> Vec<Peer> {
        let candidates: Vec<&Peer> = self
            .peers
            .values()
            .filter(|peer| peer.active && peer.peer_id != *exclude)
            .collect();

        if candidates.is_empty() || limit == 0 {
            return Vec::new();
        }

        let start = offset % candidates.len();

        candidates
            .iter()
            .cycle()
            .skip(start)
            .take(limit.min(candidates.len()))
            .map(|peer| **peer)
            .collect()
    }

    /// Evicts peers whose last announce is older than `cutoff`, adjusting
    /// the tallies in the same pass. Returns how many peers were removed.
    pub fn remove_inactive_peers(&mut self, cutoff: DurationSinceUnixEpoch) -> usize {
        let mut reaped_seeders: u32 = 0;
        let mut reaped_leechers: u32 = 0;

        self.peers.retain(|_, peer| {
            if peer.last_announce < cutoff {
                if peer.active {
                    if peer.is_seeder() {
                        reaped_seeders += 1;
                    } else {
                        reaped_leechers += 1;
                    }
                }
                false
            } else {
                true
            }
        });

        self.seeders = self.seeders.saturating_sub(reaped_seeders);
        self.leechers = self.leechers.saturating_sub(reaped_leechers);

        (reaped_seeders + reaped_leechers) as usize
    }
}
