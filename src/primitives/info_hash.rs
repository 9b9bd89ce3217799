//! The `BitTorrent` infohash: the 20-byte SHA-1 identifier of a torrent's
//! metainfo. Equality and hashing are bytewise.
use std::fmt;
use std::panic::Location;

use thiserror::Error;

/// A 20-byte torrent identifier.
///
/// There are two representations in use: the raw byte array (wire format,
/// map keys) and the 40-char lowercase hex string (databases, logs):
///
/// ```rust
/// use bittorrent_tracker_engine::primitives::info_hash::InfoHash;
///
/// let info_hash: InfoHash = [255u8; 20].into();
///
/// assert_eq!(
///     info_hash,
///     "ffffffffffffffffffffffffffffffffffffffff".parse::<InfoHash>().unwrap()
/// );
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash(pub [u8; 20]);

impl InfoHash {
    /// Returns the raw bytes.
    #[must_use]
    pub fn bytes(&self) -> [u8; 20] {
        self.0
    }

    /// Builds an infohash from a byte slice.
    ///
    /// # Panics
    ///
    /// Will panic if the slice is not exactly 20 bytes. Use [`try_from_bytes`](Self::try_from_bytes)
    /// for fallible conversion of untrusted input.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut ret = Self([0u8; 20]);
        ret.0.copy_from_slice(bytes);
        ret
    }

    /// Builds an infohash from a byte slice of untrusted length.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseInfoHashError`] if the slice is not exactly 20 bytes.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, ParseInfoHashError> {
        if bytes.len() != 20 {
            return Err(ParseInfoHashError::InvalidLength {
                len: bytes.len(),
                location: Location::caller(),
            });
        }
        Ok(Self::from_bytes(bytes))
    }

    /// The lowercase hex representation, as stored in databases.
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({self})")
    }
}

impl From<[u8; 20]> for InfoHash {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl std::str::FromStr for InfoHash {
    type Err = ParseInfoHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(ParseInfoHashError::InvalidLength {
                len: s.len(),
                location: Location::caller(),
            });
        }

        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ParseInfoHashError::InvalidHexDigit {
                    location: Location::caller(),
                })?;
        }

        Ok(Self(bytes))
    }
}

/// Errors parsing an infohash from its hex or raw representation.
#[derive(Error, Debug, Clone)]
pub enum ParseInfoHashError {
    #[error("Invalid infohash length: {len}, {location}")]
    InvalidLength {
        len: usize,
        location: &'static Location<'static>,
    },

    #[error("Invalid hex digit in infohash, {location}")]
    InvalidHexDigit { location: &'static Location<'static> },
}
