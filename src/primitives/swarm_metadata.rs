//! Aggregate counters describing the state of one swarm.
//!
//! Field names follow the `scrape` response conventions (see
//! [BEP 48](https://www.bittorrent.org/beps/bep_0048.html)): `complete` and
//! `incomplete` count the currently active seeders and leechers, while
//! `downloaded` counts the peers that have ever completed the download.
//!
//! > **NOTICE**: peers that have completed downloading are only counted as
//! > `complete` while they remain active in the swarm.

/// Swarm statistics as returned in announce and scrape responses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwarmMetadata {
    /// The number of active peers that have completed downloading (seeders).
    pub complete: u32,

    /// The number of peers that have ever completed downloading (snatches).
    pub downloaded: u32,

    /// The number of active peers that have not completed downloading (leechers).
    pub incomplete: u32,
}

impl SwarmMetadata {
    #[must_use]
    pub fn zeroed() -> Self {
        Self::default()
    }
}
