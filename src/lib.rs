//! The core `bittorrent-tracker-engine` crate contains the generic
//! `BitTorrent` tracker logic which is independent of the delivery layer.
//!
//! It contains the tracker services and their dependencies. It's a domain
//! layer which does not specify how the end user should connect to the
//! tracker.
//!
//! Typically this crate is intended to be used by higher components like:
//!
//! - An HTTP tracker
//! - A tracker REST API for the admin operations
//!
//! ```text
//!   Delivery layer  |   Domain layer
//! -----------------------------------
//!     HTTP tracker  |
//! Tracker REST API  |-> Tracker engine
//! ```
//!
//! # Table of contents
//!
//! - [Introduction](#introduction)
//! - [Components](#components)
//! - [Concurrency](#concurrency)
//!
//! # Introduction
//!
//! The engine has two main responsibilities:
//!
//! - To handle **announce** requests: authenticate the peer's passkey,
//!   validate its client software, apply the announce event to the swarm,
//!   and hand back a compact peer list with the swarm counters.
//! - To handle **scrape** requests: swarm counters in bulk.
//!
//! It also maintains the persistent side of that state through a pluggable
//! backing store (`memory`, `mysql` or `redis`), written to in batches by a
//! background flusher so that store latency never sits on the announce
//! path.
//!
//! # Components
//!
//! - [`engine`]: the composition root. Construct one [`engine::Engine`] at
//!   startup, `warm()` it from the store, `start_jobs()`, and pass it to
//!   the delivery layer.
//! - [`announce_handler`] / [`scrape_handler`]: the request services.
//! - [`requests`] / [`responses`]: query-parameter validation and bencoded
//!   response composition.
//! - [`torrent`]: the sharded swarm index and the torrent admin manager.
//! - [`authentication`]: passkeys, the user registry and its manager.
//! - [`whitelist`]: the client-software whitelist.
//! - [`flush`] / [`jobs`]: the write-behind delta queues and the background
//!   loops draining them (stats sync) and reaping silent peers (peer
//!   cleanup).
//! - [`databases`]: the backing-store traits and drivers.
//!
//! # Concurrency
//!
//! The swarm index is sharded; every single-swarm operation takes exactly
//! one shard lock, and the announce mutation plus its peer selection happen
//! in one critical section. The user registry and the whitelist each sit
//! behind one async RW-lock. Where more than one lock is involved the
//! acquisition order is: shard lock, then user lock, then whitelist lock —
//! in practice the handlers hold at most one at a time, and no lock is ever
//! held across a store call.
pub mod announce_handler;
pub mod authentication;
pub mod clock;
pub mod config;
pub mod databases;
pub mod engine;
pub mod error;
pub mod flush;
pub mod jobs;
pub mod primitives;
pub mod requests;
pub mod responses;
pub mod scrape_handler;
pub mod torrent;
pub mod whitelist;

pub mod test_helpers;

/// This clock alias switches the whole crate between real and stopped
/// time. Working version, for production.
#[cfg(not(test))]
pub(crate) type CurrentClock = clock::Working;

/// Stopped version, for testing.
#[cfg(test)]
pub(crate) type CurrentClock = clock::Stopped;
