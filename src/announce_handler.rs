//! Announce handler.
//!
//! Handling `announce` requests is the most important task for a
//! `BitTorrent` tracker.
//!
//! A `BitTorrent` swarm is a network of peers that are all trying to
//! download the same torrent. When a peer wants to find other peers it
//! announces itself to the swarm via the tracker. The tracker adds the peer
//! to the swarm and responds with a subset of the other peers, so the
//! client can contact them and start exchanging pieces.
//!
//! One announce flows through these steps:
//!
//! 1. The passkey is resolved to a user. Failures are indistinguishable
//!    from each other on purpose.
//! 2. The `peer_id` prefix is checked against the client whitelist when the
//!    tracker runs in listed mode.
//! 3. The swarm is located by infohash and the peer state machine applies
//!    the event, all under one shard lock. The peers for the response are
//!    selected in the same critical section, so the counters and the list
//!    always describe the same swarm state.
//! 4. The per-announce counter deltas are applied to the user registry and
//!    staged on the flush queues. The backing store is never touched here.
//!
//! ## Related BEPs:
//!
//! - [BEP 3. The `BitTorrent` Protocol Specification](https://www.bittorrent.org/beps/bep_0003.html)
//! - [BEP 23. Tracker Returns Compact Peer Lists](https://www.bittorrent.org/beps/bep_0023.html)
use std::sync::Arc;

use crate::authentication::repository::in_memory::InMemoryUserRepository;
use crate::authentication::service::AuthenticationService;
use crate::clock::Time;
use crate::config::{AnnouncePolicy, Core};
use crate::error::AnnounceError;
use crate::flush::{DeltaQueues, PeerStatsDelta, TorrentStatsDelta, UserStatsDelta};
use crate::primitives::peer::{AnnounceEvent, Peer, PeerKey};
use crate::primitives::swarm_metadata::SwarmMetadata;
use crate::primitives::DurationSinceUnixEpoch;
use crate::requests::AnnounceRequest;
use crate::torrent::entry::{AnnounceOutcome, PeerAnnouncement};
use crate::torrent::repository::in_memory::InMemoryTorrentRepository;
use crate::whitelist::authorization::WhitelistAuthorization;
use crate::CurrentClock;

/// What an accepted announce returns to the delivery layer.
#[derive(Debug, Clone)]
pub struct AnnounceData {
    /// The selected peers, excluding the requester.
    pub peers: Vec<Peer>,

    /// Swarm counters after this announce.
    pub stats: SwarmMetadata,

    /// The tracker announce intervals.
    pub policy: AnnouncePolicy,
}

/// Handles `announce` requests from `BitTorrent` clients.
pub struct AnnounceHandler {
    /// The tracker configuration.
    config: Core,

    /// The sharded swarm index.
    in_memory_torrent_repository: Arc<InMemoryTorrentRepository>,

    /// The in-memory user registry, updated with every announce's deltas.
    in_memory_user_repository: Arc<InMemoryUserRepository>,

    /// Passkey resolution.
    authentication_service: Arc<AuthenticationService>,

    /// Client software checks.
    whitelist_authorization: Arc<WhitelistAuthorization>,

    /// Write-behind staging for the backing store.
    delta_queues: Arc<DeltaQueues>,
}

impl AnnounceHandler {
    /// Creates a new `AnnounceHandler`.
    #[must_use]
    pub fn new(
        config: &Core,
        in_memory_torrent_repository: &Arc<InMemoryTorrentRepository>,
        in_memory_user_repository: &Arc<InMemoryUserRepository>,
        authentication_service: &Arc<AuthenticationService>,
        whitelist_authorization: &Arc<WhitelistAuthorization>,
        delta_queues: &Arc<DeltaQueues>,
    ) -> Self {
        Self {
            config: config.clone(),
            in_memory_torrent_repository: in_memory_torrent_repository.clone(),
            in_memory_user_repository: in_memory_user_repository.clone(),
            authentication_service: authentication_service.clone(),
            whitelist_authorization: whitelist_authorization.clone(),
            delta_queues: delta_queues.clone(),
        }
    }

    /// Processes an announce request from a peer.
    ///
    /// # Errors
    ///
    /// Returns the [`AnnounceError`] kind to bencode back to the client:
    /// authentication failures as the generic error, non-whitelisted
    /// clients as an invalid peer id, unknown infohashes as not found.
    pub async fn announce(&self, request: &AnnounceRequest) -> Result<AnnounceData, AnnounceError> {
        let user = self.authentication_service.authenticate(&request.passkey).await?;

        self.whitelist_authorization.authorize(&request.peer_id).await?;

        let announcement = PeerAnnouncement {
            peer_id: request.peer_id,
            ip: request.ip,
            port: request.port,
            user_id: user.user_id,
            uploaded: request.uploaded,
            downloaded: request.downloaded,
            corrupt: request.corrupt,
            left: request.left,
            event: request.event,
        };

        // A stopping peer gets a well-formed response without a peer list.
        let num_want = if request.event == AnnounceEvent::Stopped {
            0
        } else {
            request.num_want as usize
        };

        let now = CurrentClock::now();

        let outcome = self
            .in_memory_torrent_repository
            .apply_announce(&request.info_hash, &announcement, num_want, now)?;

        tracing::debug!(
            info_hash = %request.info_hash,
            peer_id = %request.peer_id,
            event = ?request.event,
            seeders = outcome.stats.complete,
            leechers = outcome.stats.incomplete,
            "announce applied"
        );

        if outcome.touched {
            self.in_memory_user_repository
                .apply_stats(&request.passkey, outcome.uploaded_delta, outcome.downloaded_delta)
                .await;

            self.stage_deltas(request, &outcome, now);
        }

        Ok(AnnounceData {
            peers: outcome.peers,
            stats: outcome.stats,
            policy: self.config.announce_policy,
        })
    }

    /// Stages this announce's deltas for the flusher. Enqueueing never
    /// blocks the announce path.
    fn stage_deltas(&self, request: &AnnounceRequest, outcome: &AnnounceOutcome, now: DurationSinceUnixEpoch) {
        self.delta_queues.peers.push(
            PeerKey::new(request.info_hash, request.peer_id),
            PeerStatsDelta {
                uploaded: outcome.uploaded_delta,
                downloaded: outcome.downloaded_delta,
                announces: 1,
                last_announce: now,
            },
        );

        self.delta_queues.torrents.push(
            request.info_hash,
            TorrentStatsDelta {
                uploaded: outcome.uploaded_delta,
                downloaded: outcome.downloaded_delta,
                snatches: u32::from(outcome.snatched),
            },
        );

        self.delta_queues.users.push(
            request.passkey.clone(),
            UserStatsDelta {
                uploaded: outcome.uploaded_delta,
                downloaded: outcome.downloaded_delta,
                announces: 1,
            },
        );
    }
}
