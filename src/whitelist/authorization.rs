use std::panic::Location;
use std::sync::Arc;

use tracing::instrument;

use super::repository::in_memory::InMemoryWhitelist;
use crate::config::Core;
use crate::error::WhitelistError;
use crate::primitives::peer::PeerId;

pub struct WhitelistAuthorization {
    /// Core tracker configuration.
    config: Core,

    /// The in-memory list of allowed clients.
    in_memory_whitelist: Arc<InMemoryWhitelist>,
}

impl WhitelistAuthorization {
    /// Creates a new authorization instance.
    pub fn new(config: &Core, in_memory_whitelist: &Arc<InMemoryWhitelist>) -> Self {
        Self {
            config: config.clone(),
            in_memory_whitelist: in_memory_whitelist.clone(),
        }
    }

    /// It returns `Ok` if the client software is authorized to announce.
    ///
    /// # Errors
    ///
    /// Will return an error if the tracker is running in `listed` mode
    /// and the `peer_id` prefix is not whitelisted.
    #[instrument(skip(self, peer_id), err)]
    pub async fn authorize(&self, peer_id: &PeerId) -> Result<(), WhitelistError> {
        if !self.is_listed() {
            return Ok(());
        }

        if self.in_memory_whitelist.is_valid_client(peer_id).await {
            return Ok(());
        }

        Err(WhitelistError::ClientNotWhitelisted {
            peer_id: *peer_id,
            location: Location::caller(),
        })
    }

    /// Returns `true` is the tracker is in listed mode.
    fn is_listed(&self) -> bool {
        self.config.listed
    }
}
