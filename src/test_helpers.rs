//! Some generic test helpers functions.

#[cfg(test)]
pub(crate) mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;

    use rand::Rng;

    use crate::announce_handler::AnnounceHandler;
    use crate::authentication::repository::in_memory::InMemoryUserRepository;
    use crate::authentication::service::AuthenticationService;
    use crate::authentication::{Passkey, User};
    use crate::config::Core;
    use crate::flush::DeltaQueues;
    use crate::primitives::info_hash::InfoHash;
    use crate::primitives::peer::{AnnounceEvent, Peer, PeerId};
    use crate::requests::RawAnnounceRequest;
    use crate::scrape_handler::ScrapeHandler;
    use crate::torrent::entry::PeerAnnouncement;
    use crate::torrent::repository::in_memory::InMemoryTorrentRepository;
    use crate::torrent::Torrent;
    use crate::whitelist::authorization::WhitelistAuthorization;
    use crate::whitelist::repository::in_memory::InMemoryWhitelist;

    /// Generates a random `InfoHash`.
    #[must_use]
    pub fn random_info_hash() -> InfoHash {
        let mut rng = rand::rng();
        let mut random_bytes = [0u8; 20];
        rng.fill(&mut random_bytes);

        InfoHash::from_bytes(&random_bytes)
    }

    /// # Panics
    ///
    /// Will panic if the string representation of the info hash is not a valid info hash.
    #[must_use]
    pub fn sample_info_hash() -> InfoHash {
        "3b245504cf5f11bbdbe1201cea6a6bf45aee1bc0" // DevSkim: ignore DS173237
            .parse::<InfoHash>()
            .expect("String should be a valid info hash")
    }

    /// A torrent record with zeroed counters for the given infohash.
    #[must_use]
    pub fn sample_torrent(info_hash: &InfoHash) -> Torrent {
        Torrent::new(*info_hash, "ubuntu-22.04-desktop-amd64.iso", Duration::from_secs(1_669_397_478))
    }

    /// It generates a peer id from a number where the number is the last
    /// part of the peer ID. For example, for `12` it returns
    /// `-qB00000000000000012`.
    #[must_use]
    pub fn numeric_peer_id(two_digits_value: u8) -> PeerId {
        let idx_str = format!("{two_digits_value:02}");

        let base = b"-qB00000000000000000";

        let mut peer_id_bytes = [0u8; 20];
        peer_id_bytes[..base.len()].copy_from_slice(base);
        peer_id_bytes[base.len() - idx_str.len()..].copy_from_slice(idx_str.as_bytes());

        PeerId(peer_id_bytes)
    }

    /// Sample peer whose state is not relevant for the tests.
    #[must_use]
    pub fn sample_peer() -> Peer {
        Peer {
            peer_id: numeric_peer_id(0),
            ip: Ipv4Addr::new(126, 0, 0, 1),
            port: 8080,
            user_id: 1,
            uploaded: 0,
            downloaded: 0,
            corrupt: 0,
            left: 0, // No bytes left to download
            announces: 1,
            first_announce: Duration::from_secs(1_669_397_478),
            last_announce: Duration::from_secs(1_669_397_478),
            active: true,
        }
    }

    /// A numbered announcement, so tests can juggle several distinct peers.
    #[must_use]
    pub fn sample_announcement(peer_number: u8, event: AnnounceEvent, left: u64) -> PeerAnnouncement {
        PeerAnnouncement {
            peer_id: numeric_peer_id(peer_number),
            ip: Ipv4Addr::new(126, 0, 0, peer_number),
            port: 8000 + u16::from(peer_number),
            user_id: 1,
            uploaded: 0,
            downloaded: 0,
            corrupt: 0,
            left,
            event,
        }
    }

    /// A raw announce request for the sample torrent, as the transport
    /// would hand it over.
    #[must_use]
    pub fn sample_raw_announce_request(peer_number: u8) -> RawAnnounceRequest {
        RawAnnounceRequest {
            info_hash: Some(sample_info_hash().bytes().to_vec()),
            peer_id: Some(numeric_peer_id(peer_number).0.to_vec()),
            port: Some((30000 + u32::from(peer_number)).to_string()),
            uploaded: Some("0".to_string()),
            downloaded: Some("0".to_string()),
            left: Some("1000".to_string()),
            remote_addr: Some(IpAddr::V4(Ipv4Addr::new(126, 0, 0, peer_number))),
            ..Default::default()
        }
    }

    /// The handlers plus every dependency a test may want to poke at.
    pub struct Container {
        pub config: Core,
        pub announce_handler: Arc<AnnounceHandler>,
        pub scrape_handler: Arc<ScrapeHandler>,
        pub in_memory_torrent_repository: Arc<InMemoryTorrentRepository>,
        pub in_memory_user_repository: Arc<InMemoryUserRepository>,
        pub in_memory_whitelist: Arc<InMemoryWhitelist>,
        pub delta_queues: Arc<DeltaQueues>,
    }

    /// A public in-memory tracker with the user `pk1` and the sample
    /// torrent registered.
    pub async fn initialize_handler_container() -> Container {
        initialize_handler_container_with(Core::default()).await
    }

    /// Like [`initialize_handler_container`], but in listed mode: announces
    /// must come from whitelisted clients.
    pub async fn initialize_listed_handler_container() -> Container {
        let config = Core {
            listed: true,
            ..Default::default()
        };

        initialize_handler_container_with(config).await
    }

    async fn initialize_handler_container_with(config: Core) -> Container {
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

        in_memory_user_repository.add(User::new(Passkey::new("pk1"), 1)).await;

        in_memory_torrent_repository
            .add_torrent(sample_torrent(&sample_info_hash()))
            .expect("the sample torrent should not be registered yet");

        Container {
            config,
            announce_handler,
            scrape_handler,
            in_memory_torrent_repository,
            in_memory_user_repository,
            in_memory_whitelist,
            delta_queues,
        }
    }
}
