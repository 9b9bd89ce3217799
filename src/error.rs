//! Engine errors.
//!
//! The announce protocol carries its own error taxonomy: every rejection has
//! a numeric wire code and a human-readable failure reason that ends up in
//! the bencoded `failure reason` dict. Authentication failures deliberately
//! collapse into the generic error so that a caller can not probe which
//! passkeys exist.
use std::panic::Location;

use crate::primitives::info_hash::InfoHash;
use crate::primitives::peer::PeerId;

/// A rejected announce or scrape request.
///
/// The `Display` implementation is the failure reason string sent to the
/// client, so these messages are part of the wire protocol.
#[derive(thiserror::Error, Debug, Clone)]
pub enum AnnounceError {
    #[error("Invalid request type")]
    InvalidRequestType,

    #[error("info_hash missing from request")]
    MissingInfoHash,

    #[error("peer_id missing from request")]
    MissingPeerId,

    #[error("port missing from request")]
    MissingPort,

    #[error("Invalid port")]
    InvalidPort,

    #[error("Torrent info hash must be 20 characters")]
    InvalidInfoHash,

    #[error("Peer ID Invalid")]
    InvalidPeerId,

    #[error("num_want invalid")]
    InvalidNumWant,

    #[error("info_hash was not found, better luck next time")]
    InfoHashNotFound,

    #[error("Slow down there jimmy.")]
    RateLimited,

    #[error("Generic Error :(")]
    Unauthorized,

    #[error("Malformed request")]
    MalformedRequest,

    #[error("Generic Error :(")]
    Generic,
}

impl AnnounceError {
    /// The numeric code carried alongside the failure reason.
    #[must_use]
    pub fn wire_code(&self) -> u16 {
        match self {
            Self::InvalidRequestType => 100,
            Self::MissingInfoHash => 101,
            Self::MissingPeerId => 102,
            Self::MissingPort => 103,
            Self::InvalidPort => 104,
            Self::InvalidInfoHash => 150,
            Self::InvalidPeerId => 151,
            Self::InvalidNumWant => 152,
            Self::InfoHashNotFound => 200,
            Self::RateLimited => 500,
            Self::Unauthorized | Self::Generic => 900,
            Self::MalformedRequest => 901,
        }
    }
}

/// Errors related to client whitelisting.
///
/// Returned when an announce comes from client software whose `peer_id`
/// prefix is not on the whitelist.
#[derive(thiserror::Error, Debug, Clone)]
pub enum WhitelistError {
    #[error("The client with peer id: {peer_id}, is not whitelisted, {location}")]
    ClientNotWhitelisted {
        peer_id: PeerId,
        location: &'static Location<'static>,
    },
}

impl From<WhitelistError> for AnnounceError {
    fn from(err: WhitelistError) -> Self {
        match err {
            WhitelistError::ClientNotWhitelisted { .. } => Self::InvalidPeerId,
        }
    }
}

/// Errors related to passkey authentication.
///
/// There is a single variant on purpose: unknown and disabled passkeys must
/// be indistinguishable from the outside.
#[derive(thiserror::Error, Debug, Clone)]
pub enum AuthenticationError {
    #[error("Unauthorized passkey, {location}")]
    Unauthorized { location: &'static Location<'static> },
}

impl From<AuthenticationError> for AnnounceError {
    fn from(err: AuthenticationError) -> Self {
        match err {
            AuthenticationError::Unauthorized { .. } => Self::Unauthorized,
        }
    }
}

/// Errors from the torrent side of the engine: the in-memory index and the
/// admin operations that maintain it.
#[derive(thiserror::Error, Debug, Clone)]
pub enum TorrentError {
    /// The torrent is already tracked.
    #[error("The torrent: {info_hash}, already exists, {location}")]
    AlreadyExists {
        info_hash: InfoHash,
        location: &'static Location<'static>,
    },

    /// The torrent is unknown (or soft-deleted, which looks the same).
    #[error("The torrent: {info_hash}, was not found, {location}")]
    NotFound {
        info_hash: InfoHash,
        location: &'static Location<'static>,
    },

    /// The backing store rejected the operation.
    #[error("Can't persist torrent: {source}")]
    Database { source: crate::databases::error::Error },
}

impl From<TorrentError> for AnnounceError {
    fn from(err: TorrentError) -> Self {
        match err {
            TorrentError::NotFound { .. } => Self::InfoHashNotFound,
            TorrentError::AlreadyExists { .. } | TorrentError::Database { .. } => Self::Generic,
        }
    }
}

#[cfg(test)]
mod tests {

    mod the_announce_error {
        use crate::error::AnnounceError;

        #[test]
        fn it_should_carry_the_original_wire_codes() {
            assert_eq!(AnnounceError::MissingInfoHash.wire_code(), 101);
            assert_eq!(AnnounceError::InvalidPort.wire_code(), 104);
            assert_eq!(AnnounceError::InvalidPeerId.wire_code(), 151);
            assert_eq!(AnnounceError::InfoHashNotFound.wire_code(), 200);
            assert_eq!(AnnounceError::Unauthorized.wire_code(), 900);
            assert_eq!(AnnounceError::MalformedRequest.wire_code(), 901);
        }

        #[test]
        fn it_should_not_disclose_why_authentication_failed() {
            assert_eq!(AnnounceError::Unauthorized.to_string(), AnnounceError::Generic.to_string());
        }
    }

    mod the_whitelist_error {
        use crate::error::{AnnounceError, WhitelistError};
        use crate::primitives::peer::PeerId;

        #[test]
        fn it_should_surface_as_an_invalid_peer_id_on_the_wire() {
            let err = WhitelistError::ClientNotWhitelisted {
                peer_id: PeerId(*b"-XX0000-000000000001"),
                location: std::panic::Location::caller(),
            };

            assert!(matches!(AnnounceError::from(err), AnnounceError::InvalidPeerId));
        }
    }
}
