//! Client software whitelist.
//!
//! Private trackers only admit known client software. The whitelist is an
//! ordered list of `peer_id` prefixes (Azureus-style ids encode the client
//! and version in their first bytes), consulted on every announce when the
//! tracker runs in listed mode.
//!
//! The list stays small (dozens of entries at most), so lookup is a linear
//! byte-prefix scan and needs no index.
pub mod authorization;
pub mod manager;
pub mod repository;

/// One allowed client: a `peer_id` prefix and a human-readable name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WhitelistEntry {
    /// The `peer_id` prefix, e.g. `-qB45`.
    pub prefix: String,

    /// Display name of the client software, e.g. `qBittorrent 4.5`.
    pub name: String,
}

impl WhitelistEntry {
    #[must_use]
    pub fn new(prefix: &str, name: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            name: name.to_string(),
        }
    }
}
