//! Announce and scrape request parsing.
//!
//! The transport hands over the raw query parameters; this module validates
//! them into typed requests, applying the protocol's defaults and producing
//! the specific error kind for each malformed field.
//!
//! The client IP is resolved here as well. Trackers do not trust the
//! announce body alone: the `ip` query parameter is honored first, then the
//! `X-Forwarded-For` header set by a reverse proxy, then the transport
//! remote address.
use std::net::{IpAddr, Ipv4Addr};

use crate::authentication::Passkey;
use crate::error::AnnounceError;
use crate::primitives::info_hash::InfoHash;
use crate::primitives::peer::{AnnounceEvent, PeerId};

/// Number of peers handed out when the client does not say how many it
/// wants.
pub const DEFAULT_NUM_WANT: u32 = 30;

/// The raw announce parameters, exactly as the transport extracted them
/// from the query string and connection.
#[derive(Debug, Default, Clone)]
pub struct RawAnnounceRequest {
    /// URL-decoded `info_hash` bytes.
    pub info_hash: Option<Vec<u8>>,

    /// URL-decoded `peer_id` bytes.
    pub peer_id: Option<Vec<u8>>,

    pub port: Option<String>,
    pub uploaded: Option<String>,
    pub downloaded: Option<String>,
    pub left: Option<String>,
    pub corrupt: Option<String>,
    pub event: Option<String>,
    pub num_want: Option<String>,
    pub compact: Option<String>,

    /// The `ip` query parameter, if any.
    pub ip: Option<String>,

    /// The `X-Forwarded-For` header, if any.
    pub x_forwarded_for: Option<String>,

    /// The transport-level remote address.
    pub remote_addr: Option<IpAddr>,
}

/// A validated announce request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceRequest {
    pub passkey: Passkey,
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub ip: Ipv4Addr,
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
    pub corrupt: u64,
    pub event: AnnounceEvent,
    pub num_want: u32,
    pub compact: bool,
}

impl RawAnnounceRequest {
    /// Validates the raw parameters into an [`AnnounceRequest`].
    ///
    /// Defaults: absent `event` is a plain announce, absent `num_want` is
    /// [`DEFAULT_NUM_WANT`] (always clamped to `max_num_want`), absent
    /// `corrupt` is zero, absent `compact` is compact.
    ///
    /// # Errors
    ///
    /// Returns the [`AnnounceError`] kind naming the first offending field.
    pub fn validate(&self, passkey: &str, max_num_want: u32) -> Result<AnnounceRequest, AnnounceError> {
        let info_hash_bytes = self.info_hash.as_ref().ok_or(AnnounceError::MissingInfoHash)?;
        let info_hash = InfoHash::try_from_bytes(info_hash_bytes).map_err(|_| AnnounceError::InvalidInfoHash)?;

        let peer_id_bytes = self.peer_id.as_ref().ok_or(AnnounceError::MissingPeerId)?;
        let peer_id = PeerId::try_from_bytes(peer_id_bytes).ok_or(AnnounceError::InvalidPeerId)?;

        let port: u64 = self
            .port
            .as_ref()
            .ok_or(AnnounceError::MissingPort)?
            .parse()
            .map_err(|_| AnnounceError::InvalidPort)?;
        if !(1024..=65535).contains(&port) {
            return Err(AnnounceError::InvalidPort);
        }
        let port = u16::try_from(port).map_err(|_| AnnounceError::InvalidPort)?;

        let uploaded = required_counter(self.uploaded.as_deref())?;
        let downloaded = required_counter(self.downloaded.as_deref())?;
        let left = required_counter(self.left.as_deref())?;

        // Assume the parameter is simply not there.
        let corrupt = self.corrupt.as_deref().and_then(|value| value.parse().ok()).unwrap_or(0);

        let event = match self.event.as_deref() {
            Some("started") => AnnounceEvent::Started,
            Some("stopped") => AnnounceEvent::Stopped,
            Some("completed" | "complete") => AnnounceEvent::Completed,
            _ => AnnounceEvent::Announce,
        };

        let num_want = match self.num_want.as_deref() {
            None => DEFAULT_NUM_WANT,
            Some(value) => value.parse::<u32>().map_err(|_| AnnounceError::InvalidNumWant)?,
        }
        .min(max_num_want);

        let compact = self.compact.as_deref() != Some("0");

        let ip = resolve_client_ip(self.ip.as_deref(), self.x_forwarded_for.as_deref(), self.remote_addr)?;

        Ok(AnnounceRequest {
            passkey: Passkey::new(passkey),
            info_hash,
            peer_id,
            ip,
            port,
            uploaded,
            downloaded,
            left,
            corrupt,
            event,
            num_want,
            compact,
        })
    }
}

fn required_counter(value: Option<&str>) -> Result<u64, AnnounceError> {
    value
        .ok_or(AnnounceError::MalformedRequest)?
        .parse()
        .map_err(|_| AnnounceError::MalformedRequest)
}

/// Resolves the announcing client's IPv4 address: `ip` query parameter
/// first, `X-Forwarded-For` next, transport remote address last.
fn resolve_client_ip(
    ip_param: Option<&str>,
    x_forwarded_for: Option<&str>,
    remote_addr: Option<IpAddr>,
) -> Result<Ipv4Addr, AnnounceError> {
    if let Some(ip) = ip_param.and_then(parse_ipv4) {
        return Ok(ip);
    }

    if let Some(header) = x_forwarded_for {
        let first_hop = header.split(',').next().unwrap_or_default().trim();

        return parse_ipv4(first_hop).ok_or(AnnounceError::MalformedRequest);
    }

    match remote_addr {
        Some(IpAddr::V4(ip)) => Ok(ip),
        Some(IpAddr::V6(ip)) => ip.to_ipv4_mapped().ok_or(AnnounceError::MalformedRequest),
        None => Err(AnnounceError::MalformedRequest),
    }
}

fn parse_ipv4(value: &str) -> Option<Ipv4Addr> {
    value.parse().ok()
}

/// The raw scrape parameters: every `info_hash` occurrence in the query.
#[derive(Debug, Default, Clone)]
pub struct RawScrapeRequest {
    pub info_hashes: Vec<Vec<u8>>,
}

/// A validated scrape request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub passkey: Passkey,
    pub info_hashes: Vec<InfoHash>,
}

impl RawScrapeRequest {
    /// Validates the raw parameters into a [`ScrapeRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`AnnounceError::InvalidInfoHash`] if any `info_hash` is not
    /// exactly 20 bytes.
    pub fn validate(&self, passkey: &str) -> Result<ScrapeRequest, AnnounceError> {
        let mut info_hashes = Vec::with_capacity(self.info_hashes.len());

        for bytes in &self.info_hashes {
            info_hashes.push(InfoHash::try_from_bytes(bytes).map_err(|_| AnnounceError::InvalidInfoHash)?);
        }

        Ok(ScrapeRequest {
            passkey: Passkey::new(passkey),
            info_hashes,
        })
    }
}
