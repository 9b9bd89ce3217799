//! The stats sync job: the write-behind flusher.
//!
//! Every flush interval the job swaps each delta queue with an empty one
//! and submits the batches to the backing store, one `sync` call per store
//! kind. A failed batch is logged and dropped: the counters are advisory,
//! and the peers keep re-announcing fresh deltas.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::databases::Stores;
use crate::flush::DeltaQueues;

/// Runs the flusher loop until the shutdown signal arrives, then drains
/// once more and exits.
pub async fn run(flush_interval: Duration, delta_queues: Arc<DeltaQueues>, stores: Arc<Stores>, mut shutdown: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(flush_interval);

    // The first tick fires immediately; skip it so the loop waits a full
    // interval before the first flush.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                flush_once(&delta_queues, &stores);
            }
            _ = shutdown.recv() => {
                tracing::debug!("stats sync shutting down, draining once more");
                flush_once(&delta_queues, &stores);
                break;
            }
        }
    }
}

/// Drains all three queues and submits the non-empty batches.
pub fn flush_once(delta_queues: &DeltaQueues, stores: &Stores) {
    let peer_batch = delta_queues.peers.drain();
    if !peer_batch.is_empty() {
        let batch_len = peer_batch.len();
        if let Err(err) = stores.peers.sync(&peer_batch) {
            tracing::error!(%err, batch_len, "dropped peer stats batch");
        }
    }

    let torrent_batch = delta_queues.torrents.drain();
    if !torrent_batch.is_empty() {
        let batch_len = torrent_batch.len();
        if let Err(err) = stores.torrents.sync(&torrent_batch) {
            tracing::error!(%err, batch_len, "dropped torrent stats batch");
        }
    }

    let user_batch = delta_queues.users.drain();
    if !user_batch.is_empty() {
        let batch_len = user_batch.len();
        if let Err(err) = stores.users.sync(&user_batch) {
            tracing::error!(%err, batch_len, "dropped user stats batch");
        }
    }
}
