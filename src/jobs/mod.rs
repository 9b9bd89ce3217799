//! Background jobs.
//!
//! Two loops run next to the request handlers:
//!
//! - the **stats sync** job drains the delta queues into the backing store
//!   every flush interval;
//! - the **peer cleanup** job reaps peers whose last announce has aged past
//!   the TTL every reap interval.
//!
//! Both are plain tokio tasks driven by a timer and a broadcast shutdown
//! signal. On shutdown the stats sync performs one final drain before
//! exiting, so stopping the engine does not lose staged counters.
pub mod peer_cleanup;
pub mod stats_sync;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::Core;
use crate::databases::Stores;
use crate::flush::DeltaQueues;
use crate::torrent::repository::in_memory::InMemoryTorrentRepository;

/// Handles to the running background jobs.
pub struct Running {
    shutdown: broadcast::Sender<()>,
    stats_sync: JoinHandle<()>,
    peer_cleanup: JoinHandle<()>,
}

impl Running {
    /// Signals both loops to stop and waits for them to finish. The stats
    /// sync drains its queues once more before exiting.
    pub async fn shutdown(self) {
        // Receivers may already be gone if a task panicked.
        let _ = self.shutdown.send(());

        let _ = self.peer_cleanup.await;
        let _ = self.stats_sync.await;

        tracing::info!("background jobs stopped");
    }
}

/// Launches the stats sync and peer cleanup loops.
#[must_use]
pub fn start(
    config: &Core,
    delta_queues: &Arc<DeltaQueues>,
    stores: &Arc<Stores>,
    in_memory_torrent_repository: &Arc<InMemoryTorrentRepository>,
) -> Running {
    let (shutdown, _) = broadcast::channel(1);

    let stats_sync = tokio::spawn(stats_sync::run(
        config.flush_policy.flush_interval(),
        delta_queues.clone(),
        stores.clone(),
        shutdown.subscribe(),
    ));

    let peer_cleanup = tokio::spawn(peer_cleanup::run(
        config.cleanup_policy.reap_interval(),
        config.peer_ttl(),
        in_memory_torrent_repository.clone(),
        shutdown.subscribe(),
    ));

    tracing::info!(
        flush_interval_secs = config.flush_policy.flush_interval_secs,
        reap_interval_secs = config.cleanup_policy.reap_interval_secs,
        "background jobs started"
    );

    Running {
        shutdown,
        stats_sync,
        peer_cleanup,
    }
}
