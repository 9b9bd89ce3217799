//! The engine: the composition root of the tracker core.
//!
//! An [`Engine`] is an explicit value constructed at startup from a
//! [`Core`] configuration. It owns the in-memory state (swarm index, user
//! registry, client whitelist, delta queues), the request handlers, the
//! managers for the admin operations, and the backing store handles. The
//! delivery layer keeps it behind an `Arc` and calls [`announce`](Engine::announce)
//! and [`scrape`](Engine::scrape); tests instantiate their own.
//!
//! Startup order: `Engine::new` builds the store driver, `warm` loads the
//! persisted torrents, users and whitelist, `start_jobs` launches the
//! flusher and the reaper. Shutdown reverses it: [`stop`](Engine::stop)
//! signals the jobs (the flusher drains once more) and closes the stores.
use std::sync::Arc;

use crate::announce_handler::{AnnounceData, AnnounceHandler};
use crate::authentication::manager::UserManager;
use crate::authentication::repository::in_memory::InMemoryUserRepository;
use crate::authentication::service::AuthenticationService;
use crate::config::Core;
use crate::databases::{self, setup, Stores};
use crate::error::AnnounceError;
use crate::flush::DeltaQueues;
use crate::jobs;
use crate::requests::{AnnounceRequest, ScrapeRequest};
use crate::scrape_handler::{ScrapeData, ScrapeHandler};
use crate::torrent::manager::TorrentsManager;
use crate::torrent::repository::in_memory::InMemoryTorrentRepository;
use crate::whitelist::authorization::WhitelistAuthorization;
use crate::whitelist::manager::WhitelistManager;
use crate::whitelist::repository::in_memory::InMemoryWhitelist;

pub struct Engine {
    config: Core,

    stores: Arc<Stores>,

    in_memory_torrent_repository: Arc<InMemoryTorrentRepository>,
    in_memory_user_repository: Arc<InMemoryUserRepository>,
    in_memory_whitelist: Arc<InMemoryWhitelist>,

    delta_queues: Arc<DeltaQueues>,

    announce_handler: Arc<AnnounceHandler>,
    scrape_handler: Arc<ScrapeHandler>,

    torrents_manager: Arc<TorrentsManager>,
    user_manager: Arc<UserManager>,
    whitelist_manager: Arc<WhitelistManager>,
}

impl Engine {
    /// Builds an engine from its configuration, connecting the store
    /// driver.
    ///
    /// # Panics
    ///
    /// Will panic if the configured store driver cannot be initialized. A
    /// tracker without its store must not start.
    #[must_use]
    pub fn new(config: Core) -> Self {
        let stores = setup::initialize_stores(&config);

        let in_memory_torrent_repository = Arc::new(InMemoryTorrentRepository::new(config.swarm_policy.shard_count));
        let in_memory_user_repository = Arc::new(InMemoryUserRepository::default());
        let in_memory_whitelist = Arc::new(InMemoryWhitelist::default());

        let delta_queues = Arc::new(DeltaQueues::new(config.flush_policy.delta_queue_capacity));

        let authentication_service = Arc::new(AuthenticationService::new(&in_memory_user_repository));
        let whitelist_authorization = Arc::new(WhitelistAuthorization::new(&config, &in_memory_whitelist));

        let announce_handler = Arc::new(AnnounceHandler::new(
            &config,
            &in_memory_torrent_repository,
            &in_memory_user_repository,
            &authentication_service,
            &whitelist_authorization,
            &delta_queues,
        ));

        let scrape_handler = Arc::new(ScrapeHandler::new(&authentication_service, &in_memory_torrent_repository));

        let torrents_manager = Arc::new(TorrentsManager::new(stores.torrents.clone(), &in_memory_torrent_repository));
        let user_manager = Arc::new(UserManager::new(stores.users.clone(), &in_memory_user_repository));
        let whitelist_manager = Arc::new(WhitelistManager::new(stores.torrents.clone(), &in_memory_whitelist));

        Self {
            config,
            stores,
            in_memory_torrent_repository,
            in_memory_user_repository,
            in_memory_whitelist,
            delta_queues,
            announce_handler,
            scrape_handler,
            torrents_manager,
            user_manager,
            whitelist_manager,
        }
    }

    /// Loads the persisted state into memory: torrents, users and the
    /// client whitelist. Peers are never restored; they re-announce.
    ///
    /// Warm-up store failures are fatal: a tracker that cannot see its
    /// users must not start answering announces.
    ///
    /// # Errors
    ///
    /// Returns the first `databases::error::Error` encountered.
    pub async fn warm(&self) -> Result<(), databases::error::Error> {
        self.torrents_manager.load_torrents_from_store()?;
        self.user_manager.load_users_from_store().await?;
        self.whitelist_manager.load_whitelist_from_store().await?;

        let torrents = self.in_memory_torrent_repository.count_torrents();
        let users = self.in_memory_user_repository.count().await;
        tracing::info!(torrents, users, "warm-up complete");

        Ok(())
    }

    /// Launches the flusher and reaper loops.
    #[must_use]
    pub fn start_jobs(&self) -> jobs::Running {
        jobs::start(
            &self.config,
            &self.delta_queues,
            &self.stores,
            &self.in_memory_torrent_repository,
        )
    }

    /// Stops the background jobs (the flusher drains once more) and closes
    /// the stores.
    ///
    /// # Errors
    ///
    /// Returns a `databases::error::Error` if a store fails to close.
    pub async fn stop(&self, running: jobs::Running) -> Result<(), databases::error::Error> {
        running.shutdown().await;
        self.stores.close()
    }

    /// Processes an announce request. See [`AnnounceHandler::announce`].
    ///
    /// # Errors
    ///
    /// Returns the [`AnnounceError`] kind to bencode back to the client.
    pub async fn announce(&self, request: &AnnounceRequest) -> Result<AnnounceData, AnnounceError> {
        self.announce_handler.announce(request).await
    }

    /// Processes a scrape request. See [`ScrapeHandler::scrape`].
    ///
    /// # Errors
    ///
    /// Returns the [`AnnounceError`] kind to bencode back to the client.
    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeData, AnnounceError> {
        self.scrape_handler.scrape(request).await
    }

    #[must_use]
    pub fn config(&self) -> &Core {
        &self.config
    }

    #[must_use]
    pub fn torrents_manager(&self) -> &Arc<TorrentsManager> {
        &self.torrents_manager
    }

    #[must_use]
    pub fn user_manager(&self) -> &Arc<UserManager> {
        &self.user_manager
    }

    #[must_use]
    pub fn whitelist_manager(&self) -> &Arc<WhitelistManager> {
        &self.whitelist_manager
    }

    #[must_use]
    pub fn delta_queues(&self) -> &Arc<DeltaQueues> {
        &self.delta_queues
    }

    #[must_use]
    pub fn in_memory_torrent_repository(&self) -> &Arc<InMemoryTorrentRepository> {
        &self.in_memory_torrent_repository
    }

    #[must_use]
    pub fn in_memory_whitelist(&self) -> &Arc<InMemoryWhitelist> {
        &self.in_memory_whitelist
    }

    #[must_use]
    pub fn stores(&self) -> &Arc<Stores> {
        &self.stores
    }
}

#[cfg(test)]
mod tests {

    mod the_engine {
        use crate::authentication::{Passkey, User};
        use crate::config::Core;
        use crate::engine::Engine;
        use crate::test_helpers::tests::{sample_info_hash, sample_torrent};

        async fn warmed_engine() -> Engine {
            let engine = Engine::new(Core::default());

            engine
                .stores()
                .users
                .add(&User::new(Passkey::new("pk1"), 1))
                .unwrap();
            engine.stores().torrents.add(&sample_torrent(&sample_info_hash())).unwrap();

            engine.warm().await.unwrap();

            engine
        }

        #[tokio::test]
        async fn it_should_load_torrents_and_users_on_warm_up() {
            let engine = warmed_engine().await;

            assert_eq!(engine.in_memory_torrent_repository().count_torrents(), 1);

            let raw = crate::test_helpers::tests::sample_raw_announce_request(1);
            let request = raw.validate("pk1", engine.config().swarm_policy.max_num_want).unwrap();

            assert!(engine.announce(&request).await.is_ok());
        }

        #[tokio::test]
        async fn it_should_flush_staged_deltas_through_the_jobs_on_shutdown() {
            let engine = warmed_engine().await;

            let raw = crate::test_helpers::tests::sample_raw_announce_request(1);
            let mut request = raw.validate("pk1", engine.config().swarm_policy.max_num_want).unwrap();
            request.uploaded = 500;

            let running = engine.start_jobs();

            engine.announce(&request).await.unwrap();

            // Stop the jobs without closing the stores, so the effect of
            // the final drain stays observable.
            running.shutdown().await;

            let stored = engine.stores().torrents.get(&sample_info_hash()).unwrap().unwrap();

            assert_eq!(stored.total_uploaded, 500);
            assert!(engine.delta_queues().torrents.is_empty());
        }
    }
}
