//! Swarm data structures.
//!
//! In `BitTorrent` terminology, a "swarm" is the collection of peers that
//! are sharing or downloading a given torrent. This module defines what the
//! engine stores for each torrent:
//!
//! - **Torrent** ([`Torrent`]): the descriptive record plus the lifetime
//!   aggregates that survive restarts through the backing store.
//! - **Torrent entry** ([`entry::TorrentEntry`]): a torrent plus its live
//!   swarm, the peer list and the denormalized seeder/leecher tallies.
//!
//! We can represent the data held in memory for one torrent with this JSON
//! object:
//!
//! ```json
//! {
//!     "c1277613db1d28709b034a017ab2cae4be07ae10": {
//!         "completed": 0,
//!         "peers": {
//!             "-qB00000000000000001": {
//!                 "ip": "2.137.87.41",
//!                 "port": 1754,
//!                 "uploaded": 120,
//!                 "downloaded": 60,
//!                 "left": 60,
//!                 "last_announce": 1672419840
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! The tallies are maintained incrementally: after every mutation the entry
//! guarantees that `seeders` equals the number of active peers with
//! `left == 0` and `leechers` the rest.
pub mod entry;
pub mod manager;
pub mod repository;

use crate::primitives::info_hash::InfoHash;
use crate::primitives::DurationSinceUnixEpoch;

/// The persistent record of a tracked torrent.
///
/// A torrent with `is_deleted` set is invisible to lookups (announces get
/// "info_hash not found") but is retained until an explicit hard delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Torrent {
    pub info_hash: InfoHash,

    /// Display name, as registered through the admin interface.
    pub name: String,

    /// Soft-delete flag.
    pub is_deleted: bool,

    pub created_on: DurationSinceUnixEpoch,

    /// The number of peers that have ever completed downloading (snatches).
    pub completed: u32,

    /// Lifetime bytes uploaded by all peers of this swarm.
    pub total_uploaded: u64,

    /// Lifetime bytes downloaded by all peers of this swarm.
    pub total_downloaded: u64,
}

impl Torrent {
    /// A fresh torrent record with zeroed aggregates.
    #[must_use]
    pub fn new(info_hash: InfoHash, name: &str, created_on: DurationSinceUnixEpoch) -> Self {
        Self {
            info_hash,
            name: name.to_string(),
            is_deleted: false,
            created_on,
            completed: 0,
            total_uploaded: 0,
            total_downloaded: 0,
        }
    }
}
