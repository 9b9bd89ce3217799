//! The peer cleanup job: the reaper.
//!
//! Clients that shut down uncleanly never send `stopped`, so their peers
//! would stay in the swarms forever. Every reap interval this job walks the
//! swarm index and evicts peers whose last announce is older than the peer
//! TTL. The swarm tallies are adjusted in the same critical section as the
//! eviction, shard by shard.
//!
//! Reaped peers produce no deltas: whatever counters they reported were
//! already staged when their announces arrived.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::clock::Time;
use crate::torrent::repository::in_memory::InMemoryTorrentRepository;
use crate::CurrentClock;

/// Runs the reaper loop until the shutdown signal arrives.
pub async fn run(
    reap_interval: Duration,
    peer_ttl: Duration,
    in_memory_torrent_repository: Arc<InMemoryTorrentRepository>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(reap_interval);

    // The first tick fires immediately; there is nothing to reap yet.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                reap_once(peer_ttl, &in_memory_torrent_repository);
            }
            _ = shutdown.recv() => {
                tracing::debug!("peer cleanup shutting down");
                break;
            }
        }
    }
}

/// One reaper pass over every shard.
pub fn reap_once(peer_ttl: Duration, in_memory_torrent_repository: &InMemoryTorrentRepository) {
    let cutoff = CurrentClock::now_sub(&peer_ttl).unwrap_or_default();

    let reaped = in_memory_torrent_repository.remove_inactive_peers(cutoff);

    if reaped > 0 {
        tracing::info!(reaped, "evicted inactive peers");
    }
}
