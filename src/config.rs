//! Engine configuration.
//!
//! You can control the behavior of this crate with the [`Core`] settings:
//!
//! ```toml
//! [core]
//! listed = false
//!
//! [core.announce_policy]
//! interval = 120
//! interval_min = 60
//!
//! [core.flush_policy]
//! flush_interval_secs = 30
//! delta_queue_capacity = 4096
//!
//! [core.cleanup_policy]
//! reap_interval_secs = 90
//!
//! [core.swarm_policy]
//! shard_count = 64
//! max_num_want = 50
//!
//! [core.database]
//! driver = "memory"
//! path = ""
//! ```
//!
//! Every field has a default, so an empty document deserializes to a working
//! public in-memory tracker.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::databases::driver::Driver;

/// Core engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Core {
    /// When `true` the tracker runs in listed mode: every announce must come
    /// from a client whose `peer_id` prefix is on the whitelist.
    #[serde(default)]
    pub listed: bool,

    #[serde(default)]
    pub announce_policy: AnnouncePolicy,

    #[serde(default)]
    pub flush_policy: FlushPolicy,

    #[serde(default)]
    pub cleanup_policy: CleanupPolicy,

    #[serde(default)]
    pub swarm_policy: SwarmPolicy,

    #[serde(default)]
    pub database: Database,
}

impl Core {
    /// How long a peer may stay silent before the reaper evicts it.
    ///
    /// Defaults to twice the announce interval, so a peer has to miss two
    /// regular announces before it is considered gone.
    #[must_use]
    pub fn peer_ttl(&self) -> Duration {
        match self.cleanup_policy.peer_ttl_secs {
            Some(secs) => Duration::from_secs(secs),
            None => Duration::from_secs(u64::from(self.announce_policy.interval) * 2),
        }
    }
}

/// The announce intervals handed to clients in every response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncePolicy {
    /// Interval in seconds that the client should wait between regular
    /// announce requests.
    #[serde(default = "AnnouncePolicy::default_interval")]
    pub interval: u32,

    /// Minimum announce interval. Clients must not reannounce more
    /// frequently than this.
    #[serde(default = "AnnouncePolicy::default_interval_min")]
    pub interval_min: u32,
}

impl AnnouncePolicy {
    fn default_interval() -> u32 {
        120
    }

    fn default_interval_min() -> u32 {
        60
    }
}

impl Default for AnnouncePolicy {
    fn default() -> Self {
        Self {
            interval: Self::default_interval(),
            interval_min: Self::default_interval_min(),
        }
    }
}

/// Cadence and bounds of the write-behind flush pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushPolicy {
    /// Seconds between drains of the accumulated stats deltas.
    #[serde(default = "FlushPolicy::default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Maximum number of distinct keys each delta queue holds before new
    /// keys start coalescing into the most recent entry.
    #[serde(default = "FlushPolicy::default_delta_queue_capacity")]
    pub delta_queue_capacity: usize,
}

impl FlushPolicy {
    fn default_flush_interval_secs() -> u64 {
        30
    }

    fn default_delta_queue_capacity() -> usize {
        4096
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            flush_interval_secs: Self::default_flush_interval_secs(),
            delta_queue_capacity: Self::default_delta_queue_capacity(),
        }
    }
}

/// Cadence of the peer reaper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupPolicy {
    /// Seconds between reaper walks over the swarm index.
    #[serde(default = "CleanupPolicy::default_reap_interval_secs")]
    pub reap_interval_secs: u64,

    /// Peer time-to-live override. When unset the TTL is twice the announce
    /// interval.
    #[serde(default)]
    pub peer_ttl_secs: Option<u64>,
}

impl CleanupPolicy {
    fn default_reap_interval_secs() -> u64 {
        90
    }

    #[must_use]
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            reap_interval_secs: Self::default_reap_interval_secs(),
            peer_ttl_secs: None,
        }
    }
}

/// Sizing of the swarm index and the peer lists it hands out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmPolicy {
    /// Number of shards in the swarm index. Must be a power of two.
    #[serde(default = "SwarmPolicy::default_shard_count")]
    pub shard_count: usize,

    /// Hard cap on the number of peers returned per announce, regardless of
    /// the client's `num_want`.
    #[serde(default = "SwarmPolicy::default_max_num_want")]
    pub max_num_want: u32,
}

impl SwarmPolicy {
    fn default_shard_count() -> usize {
        64
    }

    fn default_max_num_want() -> u32 {
        50
    }
}

impl Default for SwarmPolicy {
    fn default() -> Self {
        Self {
            shard_count: Self::default_shard_count(),
            max_num_want: Self::default_max_num_want(),
        }
    }
}

/// Backing store selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    /// The store driver to use.
    #[serde(default = "Database::default_driver")]
    pub driver: Driver,

    /// Driver-specific connection string. Ignored by the `memory` driver.
    #[serde(default)]
    pub path: String,
}

impl Database {
    fn default_driver() -> Driver {
        Driver::Memory
    }
}

impl Default for Database {
    fn default() -> Self {
        Self {
            driver: Self::default_driver(),
            path: String::new(),
        }
    }
}
