//! Scrape handler.
//!
//! The `scrape` request allows clients to query swarm counters in bulk
//! without joining any swarm. The request names one or more infohashes; the
//! response carries one `files` entry per infohash the tracker knows.
//! Unknown and soft-deleted torrents are silently omitted.
//!
//! The JSON representation of a sample `scrape` response would be:
//!
//! ```json
//! {
//!     "files": {
//!         "xxxxxxxxxxxxxxxxxxxx": { "complete": 11, "downloaded": 13772, "incomplete": 19 }
//!     }
//! }
//! ```
//!
//! where `xxxxxxxxxxxxxxxxxxxx` is a raw 20-byte infohash.
//!
//! ## References:
//!
//! - [BEP 48. Tracker Protocol Extension: Scrape](https://www.bittorrent.org/beps/bep_0048.html)
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::authentication::service::AuthenticationService;
use crate::error::AnnounceError;
use crate::primitives::info_hash::InfoHash;
use crate::primitives::swarm_metadata::SwarmMetadata;
use crate::requests::ScrapeRequest;
use crate::torrent::repository::in_memory::InMemoryTorrentRepository;

/// The aggregate data for a `scrape` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeData {
    /// One entry per known requested torrent.
    pub files: BTreeMap<InfoHash, SwarmMetadata>,
}

impl ScrapeData {
    /// Creates an empty `ScrapeData` with no files.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds one file to the scrape response.
    pub fn add_file(&mut self, info_hash: &InfoHash, swarm_metadata: SwarmMetadata) {
        self.files.insert(*info_hash, swarm_metadata);
    }
}

/// Handles scrape requests, providing swarm counters in bulk.
pub struct ScrapeHandler {
    /// Passkey resolution.
    authentication_service: Arc<AuthenticationService>,

    /// The sharded swarm index.
    in_memory_torrent_repository: Arc<InMemoryTorrentRepository>,
}

impl ScrapeHandler {
    /// Creates a new `ScrapeHandler` instance.
    #[must_use]
    pub fn new(
        authentication_service: &Arc<AuthenticationService>,
        in_memory_torrent_repository: &Arc<InMemoryTorrentRepository>,
    ) -> Self {
        Self {
            authentication_service: authentication_service.clone(),
            in_memory_torrent_repository: in_memory_torrent_repository.clone(),
        }
    }

    /// Handles a scrape request for multiple torrents.
    ///
    /// Returns counters for each requested torrent the tracker knows;
    /// unknown infohashes simply do not appear in the result.
    ///
    /// # Errors
    ///
    /// Returns the generic [`AnnounceError`] if the passkey does not resolve
    /// to an enabled user.
    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeData, AnnounceError> {
        self.authentication_service.authenticate(&request.passkey).await?;

        let mut scrape_data = ScrapeData::empty();

        for info_hash in &request.info_hashes {
            if let Some(swarm_metadata) = self.in_memory_torrent_repository.get_swarm_metadata(info_hash) {
                scrape_data.add_file(info_hash, swarm_metadata);
            }
        }

        Ok(scrape_data)
    }
}

#[cfg(test)]
mod tests {

    mod the_scrape_handler {
        use crate::authentication::Passkey;
        use crate::requests::ScrapeRequest;
        use crate::test_helpers::tests::{initialize_handler_container, sample_info_hash, sample_raw_announce_request};

        #[tokio::test]
        async fn it_should_omit_unknown_torrents_from_the_response() {
            let container = initialize_handler_container().await;

            let request = ScrapeRequest {
                passkey: Passkey::new("pk1"),
                info_hashes: vec!["ffffffffffffffffffffffffffffffffffffffff".parse().unwrap()],
            };

            let scrape_data = container.scrape_handler.scrape(&request).await.unwrap();

            assert!(scrape_data.files.is_empty());
        }

        #[tokio::test]
        async fn it_should_return_the_swarm_counters_for_a_known_torrent() {
            let container = initialize_handler_container().await;

            let announce = sample_raw_announce_request(1)
                .validate("pk1", container.config.swarm_policy.max_num_want)
                .unwrap();
            container.announce_handler.announce(&announce).await.unwrap();

            let request = ScrapeRequest {
                passkey: Passkey::new("pk1"),
                info_hashes: vec![sample_info_hash()],
            };

            let scrape_data = container.scrape_handler.scrape(&request).await.unwrap();

            let stats = scrape_data.files.get(&sample_info_hash()).unwrap();

            assert_eq!(stats.incomplete, 1);
            assert_eq!(stats.complete, 0);
        }

        #[tokio::test]
        async fn it_should_reject_an_unknown_passkey_with_the_generic_error() {
            let container = initialize_handler_container().await;

            let request = ScrapeRequest {
                passkey: Passkey::new("who-is-this"),
                info_hashes: vec![sample_info_hash()],
            };

            let err = container.scrape_handler.scrape(&request).await.unwrap_err();

            assert_eq!(err.to_string(), "Generic Error :(");
        }

        #[tokio::test]
        async fn it_should_omit_a_soft_deleted_torrent() {
            let container = initialize_handler_container().await;

            let announce = sample_raw_announce_request(1)
                .validate("pk1", container.config.swarm_policy.max_num_want)
                .unwrap();
            container.announce_handler.announce(&announce).await.unwrap();

            container
                .in_memory_torrent_repository
                .delete_torrent(&sample_info_hash(), false)
                .unwrap();

            let request = ScrapeRequest {
                passkey: Passkey::new("pk1"),
                info_hashes: vec![sample_info_hash()],
            };

            let scrape_data = container.scrape_handler.scrape(&request).await.unwrap();

            assert!(scrape_data.files.is_empty());
        }
    }
}
