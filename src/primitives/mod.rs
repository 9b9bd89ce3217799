//! Primitive types shared by every engine component.
//!
//! These are the vocabulary types of the tracker: torrent and peer
//! identifiers, the peer record itself, and the aggregate swarm counters
//! returned to clients and to `scrape` requests.
pub mod info_hash;
pub mod peer;
pub mod swarm_metadata;

/// Duration since the Unix epoch. All timestamps kept by the engine use this
/// representation; wall-clock reads go through the crate clock so that tests
/// can stop and advance time.
pub type DurationSinceUnixEpoch = std::time::Duration;
