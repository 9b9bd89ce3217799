//! Peer identity and the peer record the tracker keeps for every swarm
//! member.
//!
//! A `Peer` holds the data received from the peer in its `announce` requests
//! plus the bookkeeping the engine derives from them (announce counters,
//! first/last announce timestamps, the owning user). Most of the attributes
//! map one to one onto `announce` query parameters:
//!
//! <http://0.0.0.0:7070/pk/announce?info_hash=%81%00...&peer_id=-qB00000000000000001&port=17548&uploaded=0&downloaded=0&left=0&event=completed>
use std::fmt;
use std::net::Ipv4Addr;

use super::info_hash::InfoHash;
use super::DurationSinceUnixEpoch;

/// Number of leading `peer_id` bytes that identify the client software.
/// Azureus-style ids encode the client and version in the first 8 chars
/// (e.g. `-qB4520-`).
pub const CLIENT_PREFIX_LEN: usize = 8;

/// A 20-byte peer identifier, self-chosen by the client and presented on
/// every announce.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    /// The leading bytes used for client whitelist checks.
    #[must_use]
    pub fn client_prefix(&self) -> &[u8] {
        &self.0[..CLIENT_PREFIX_LEN]
    }

    /// Builds a peer id from a byte slice.
    ///
    /// Returns `None` if the slice is not exactly 20 bytes.
    #[must_use]
    pub fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut ret = Self([0u8; 20]);
        if bytes.len() != 20 {
            return None;
        }
        ret.0.copy_from_slice(bytes);
        Some(ret)
    }

    /// The lowercase hex representation. Peer ids are arbitrary bytes, so
    /// stores persist them in hex rather than as strings.
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        self.0.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    /// Parses the 40-char hex representation produced by
    /// [`to_hex_string`](Self::to_hex_string).
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 40 {
            return None;
        }

        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }

        Some(Self(bytes))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

/// The composite key that uniquely identifies a peer across all swarms.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PeerKey {
    info_hash: InfoHash,
    peer_id: PeerId,
}

impl PeerKey {
    #[must_use]
    pub fn new(info_hash: InfoHash, peer_id: PeerId) -> Self {
        Self { info_hash, peer_id }
    }

    #[must_use]
    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }
}

/// The event a peer reports on an announce.
///
/// An announce without an `event` parameter is a periodic refresh
/// ([`Announce`](AnnounceEvent::Announce)).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnnounceEvent {
    Started,
    Stopped,
    Completed,
    Announce,
}

/// A peer as stored within a swarm.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Peer {
    /// The peer id presented on every announce.
    pub peer_id: PeerId,

    /// Resolved IPv4 address of the peer.
    pub ip: Ipv4Addr,

    /// TCP port the peer listens on. Always within `[1024, 65535]`.
    pub port: u16,

    /// The user this peer announced under. Zero is reserved for "not found"
    /// and never stored.
    pub user_id: u32,

    /// Cumulative bytes uploaded, as reported by the client.
    pub uploaded: u64,

    /// Cumulative bytes downloaded, as reported by the client.
    pub downloaded: u64,

    /// Cumulative corrupt bytes, as reported by the client.
    pub corrupt: u64,

    /// Bytes the peer still has to download. Zero means the peer is a seeder.
    pub left: u64,

    /// Number of announces received from this peer.
    pub announces: u32,

    /// Timestamp of the announce that created this peer.
    pub first_announce: DurationSinceUnixEpoch,

    /// Timestamp of the most recent announce. Never before `first_announce`.
    pub last_announce: DurationSinceUnixEpoch,

    /// Whether the peer is counted in the swarm tallies.
    pub active: bool,
}

impl Peer {
    /// A peer is a seeder iff it has nothing left to download.
    #[must_use]
    pub fn is_seeder(&self) -> bool {
        self.left == 0
    }
}

#[cfg(test)]
mod tests {

    mod the_peer_id {
        use crate::primitives::peer::PeerId;

        #[test]
        fn it_should_expose_the_client_prefix() {
            let peer_id = PeerId(*b"-qB4520-000000000001");

            assert_eq!(peer_id.client_prefix(), b"-qB4520-");
        }

        #[test]
        fn it_should_reject_byte_slices_that_are_not_20_bytes() {
            assert!(PeerId::try_from_bytes(b"too short").is_none());
        }
    }

    mod the_peer {
        use crate::test_helpers::tests::sample_peer;

        #[test]
        fn it_should_be_a_seeder_when_it_has_no_bytes_left() {
            let mut peer = sample_peer();

            peer.left = 0;
            assert!(peer.is_seeder());

            peer.left = 1;
            assert!(!peer.is_seeder());
        }
    }
}
