//! Write-behind staging for persistent counters.
//!
//! Every announce produces small additive deltas for the peer, torrent and
//! user records it touched. Persisting those synchronously would put the
//! backing store's write latency on the announce path, so the deltas are
//! staged here in three bounded in-memory buffers and drained by the
//! flusher job at a fixed cadence.
//!
//! The buffers never block the announce path. An existing key merges
//! additively; a new key beyond capacity coalesces into the most recently
//! enqueued entry instead of growing the buffer, and a counter records how
//! often that happened so a metrics layer can watch the coalesce rate.
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::authentication::Passkey;
use crate::primitives::info_hash::InfoHash;
use crate::primitives::peer::PeerKey;
use crate::primitives::DurationSinceUnixEpoch;

/// Additive merge of two delta records for the same key.
pub trait Merge {
    fn merge(&mut self, other: &Self);
}

/// Per-peer counter deltas accumulated between flushes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerStatsDelta {
    pub uploaded: u64,
    pub downloaded: u64,
    pub announces: u32,
    pub last_announce: DurationSinceUnixEpoch,
}

impl Merge for PeerStatsDelta {
    fn merge(&mut self, other: &Self) {
        self.uploaded += other.uploaded;
        self.downloaded += other.downloaded;
        self.announces += other.announces;
        self.last_announce = self.last_announce.max(other.last_announce);
    }
}

/// Per-torrent counter deltas accumulated between flushes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TorrentStatsDelta {
    pub uploaded: u64,
    pub downloaded: u64,
    pub snatches: u32,
}

impl Merge for TorrentStatsDelta {
    fn merge(&mut self, other: &Self) {
        self.uploaded += other.uploaded;
        self.downloaded += other.downloaded;
        self.snatches += other.snatches;
    }
}

/// Per-user counter deltas accumulated between flushes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserStatsDelta {
    pub uploaded: u64,
    pub downloaded: u64,
    pub announces: u32,
}

impl Merge for UserStatsDelta {
    fn merge(&mut self, other: &Self) {
        self.uploaded += other.uploaded;
        self.downloaded += other.downloaded;
        self.announces += other.announces;
    }
}

struct BufferInner<K, V> {
    entries: HashMap<K, V>,
    last_key: Option<K>,
}

/// A bounded map of pending deltas with non-blocking, coalescing enqueue.
pub struct DeltaBuffer<K, V> {
    inner: Mutex<BufferInner<K, V>>,
    capacity: usize,
    pushed: AtomicU64,
    coalesced: AtomicU64,
}

impl<K, V> DeltaBuffer<K, V>
where
    K: Eq + Hash + Clone,
    V: Merge,
{
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BufferInner {
                entries: HashMap::new(),
                last_key: None,
            }),
            capacity,
            pushed: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Enqueues one delta. Never blocks beyond a short critical section.
    ///
    /// Merges into the existing entry for the key if there is one. When the
    /// buffer is at capacity and the key is new, the delta is folded into
    /// the most recently enqueued entry so that no counters are lost, only
    /// their attribution coarsened.
    pub fn push(&self, key: K, delta: V) {
        self.pushed.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.lock();

        if let Some(existing) = inner.entries.get_mut(&key) {
            existing.merge(&delta);
            return;
        }

        if inner.entries.len() < self.capacity {
            inner.entries.insert(key.clone(), delta);
            inner.last_key = Some(key);
            return;
        }

        self.coalesced.fetch_add(1, Ordering::Relaxed);

        let last_key = inner.last_key.clone();
        if let Some(target) = last_key.and_then(|last| inner.entries.get_mut(&last)) {
            target.merge(&delta);
        }
    }

    /// Swaps the buffer contents with an empty map and returns the batch.
    #[must_use]
    pub fn drain(&self) -> HashMap<K, V> {
        let mut inner = self.inner.lock();

        inner.last_key = None;
        std::mem::take(&mut inner.entries)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Total number of deltas pushed since startup.
    #[must_use]
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Number of pushes that had to coalesce because the buffer was full.
    /// `coalesced / pushed` is the coalesce rate the back-pressure metric
    /// watches.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

/// The three delta queues drained by the flusher.
pub struct DeltaQueues {
    pub peers: DeltaBuffer<PeerKey, PeerStatsDelta>,
    pub torrents: DeltaBuffer<InfoHash, TorrentStatsDelta>,
    pub users: DeltaBuffer<Passkey, UserStatsDelta>,
}

impl DeltaQueues {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            peers: DeltaBuffer::new(capacity),
            torrents: DeltaBuffer::new(capacity),
            users: DeltaBuffer::new(capacity),
        }
    }
}
