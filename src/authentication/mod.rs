//! Passkey authentication.
//!
//! Every announce URL embeds a per-user passkey
//! (`GET /<passkey>/announce?...`). The engine resolves the passkey to a
//! [`User`] through the in-memory registry before touching any swarm state.
//!
//! Lookup failures never say why: an unknown passkey and a disabled user
//! produce the same generic error, so the endpoint can not be used to probe
//! which passkeys exist.
pub mod manager;
pub mod repository;
pub mod service;

use std::fmt;

/// A per-user opaque secret, used as the registry lookup key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Passkey(String);

impl Passkey {
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Passkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Passkey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A registered tracker user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    /// The announce-URL secret this user is looked up by.
    pub passkey: Passkey,

    /// Numeric user id. Zero is reserved for "not found" and never assigned.
    pub user_id: u32,

    /// Lifetime bytes uploaded across all this user's peers. Monotonic.
    pub uploaded: u64,

    /// Lifetime bytes downloaded across all this user's peers. Monotonic.
    pub downloaded: u64,

    /// Lifetime announce count. Monotonic.
    pub announces: u32,

    /// Disabled users fail authentication exactly like unknown passkeys.
    pub enabled: bool,
}

impl User {
    /// A fresh enabled user with zeroed counters.
    #[must_use]
    pub fn new(passkey: Passkey, user_id: u32) -> Self {
        Self {
            passkey,
            user_id,
            uploaded: 0,
            downloaded: 0,
            announces: 0,
            enabled: true,
        }
    }
}
