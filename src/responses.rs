//! Bencoded response composition.
//!
//! The tracker speaks bencoding on the wire. Responses are dictionaries
//! whose keys must be emitted in lexicographic order, so the structs below
//! declare their fields in exactly that order and serialize through
//! `serde_bencode`.
//!
//! Peer lists use the compact format of
//! [BEP 23](https://www.bittorrent.org/beps/bep_0023.html): 4 bytes of
//! big-endian IPv4 followed by 2 bytes of big-endian port per peer,
//! concatenated into one byte string.
//!
//! Errors are a single-key dictionary `{"failure reason": <string>}`,
//! delivered with HTTP 200. That is `BitTorrent` convention, not HTTP error
//! semantics.
use std::collections::BTreeMap;

use serde::Serialize;
use serde_bytes::ByteBuf;

use crate::announce_handler::AnnounceData;
use crate::error::AnnounceError;
use crate::primitives::peer::Peer;
use crate::scrape_handler::ScrapeData;

/// A successful announce response.
///
/// `peers` is omitted entirely when the client asked for zero peers.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct AnnounceResponse {
    pub complete: u32,

    pub incomplete: u32,

    pub interval: u32,

    #[serde(rename = "min interval")]
    pub min_interval: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub peers: Option<ByteBuf>,
}

impl AnnounceResponse {
    /// Composes the response for an announce outcome.
    ///
    /// `num_want` is the validated number of peers the client asked for;
    /// zero omits the `peers` key.
    #[must_use]
    pub fn from_data(data: &AnnounceData, num_want: u32) -> Self {
        let peers = if num_want == 0 {
            None
        } else {
            Some(compact_peers(&data.peers))
        };

        Self {
            complete: data.stats.complete,
            incomplete: data.stats.incomplete,
            interval: data.policy.interval,
            min_interval: data.policy.interval_min,
            peers,
        }
    }

    /// Bencodes the response body.
    ///
    /// # Errors
    ///
    /// Returns a `serde_bencode::Error` if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}

/// Encodes a peer list in compact form: `6 * k` bytes for `k` peers.
#[must_use]
pub fn compact_peers(peers: &[Peer]) -> ByteBuf {
    let mut bytes = Vec::with_capacity(peers.len() * 6);

    for peer in peers {
        bytes.extend_from_slice(&peer.ip.octets());
        bytes.extend_from_slice(&peer.port.to_be_bytes());
    }

    ByteBuf::from(bytes)
}

/// Per-file counters in a scrape response, in BEP 48 key order.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ScrapeFile {
    pub complete: u32,
    pub downloaded: u32,
    pub incomplete: u32,
}

/// A scrape response: one `files` dictionary keyed by the raw 20-byte
/// infohashes, sorted bytewise.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ScrapeResponse {
    pub files: BTreeMap<ByteBuf, ScrapeFile>,
}

impl ScrapeResponse {
    #[must_use]
    pub fn from_data(data: &ScrapeData) -> Self {
        let files = data
            .files
            .iter()
            .map(|(info_hash, stats)| {
                (
                    ByteBuf::from(info_hash.bytes().to_vec()),
                    ScrapeFile {
                        complete: stats.complete,
                        downloaded: stats.downloaded,
                        incomplete: stats.incomplete,
                    },
                )
            })
            .collect();

        Self { files }
    }

    /// Bencodes the response body.
    ///
    /// # Errors
    ///
    /// Returns a `serde_bencode::Error` if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}

/// A bencoded failure for the torrent client to display to the user.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    #[serde(rename = "failure reason")]
    pub failure_reason: String,
}

impl ErrorResponse {
    /// Bencodes the response body.
    ///
    /// # Errors
    ///
    /// Returns a `serde_bencode::Error` if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}

impl From<&AnnounceError> for ErrorResponse {
    fn from(err: &AnnounceError) -> Self {
        Self {
            failure_reason: err.to_string(),
        }
    }
}
