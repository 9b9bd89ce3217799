//! The Redis store driver.
//!
//! Records are kept as Redis hashes under `t:`-prefixed keys:
//!
//! | key | value |
//! |---|---|
//! | `t:torrent:<info_hash>` | torrent record fields |
//! | `t:peer:<info_hash>:<peer_id>` | peer record fields |
//! | `t:user:<passkey>` | user record fields |
//! | `t:whitelist` | one field per client prefix, value is the client name |
//!
//! Counter batches are applied with `HINCRBY`, so syncs are additive on the
//! server without a read-modify-write round trip.
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::panic::Location;
use std::str::FromStr;
use std::sync::Arc;

use redis::{Client, Commands, Connection};

use super::super::error::Error;
use super::super::{PeerStore, Stores, TorrentStore, UserStore};
use super::Driver;
use crate::authentication::{Passkey, User};
use crate::flush::{PeerStatsDelta, TorrentStatsDelta, UserStatsDelta};
use crate::primitives::info_hash::InfoHash;
use crate::primitives::peer::{Peer, PeerId, PeerKey};
use crate::primitives::DurationSinceUnixEpoch;
use crate::torrent::Torrent;
use crate::whitelist::WhitelistEntry;

const DRIVER: Driver = Driver::Redis;

const WHITELIST_KEY: &str = "t:whitelist";

/// Builds the three Redis-backed store kinds over one shared client.
///
/// # Errors
///
/// Will return an `Error` if the connection URL is invalid.
pub(crate) fn build(db_path: &str) -> Result<Stores, Error> {
    let client = Client::open(db_path)?;

    Ok(Stores {
        peers: Arc::new(RedisPeerStore { client: client.clone() }),
        torrents: Arc::new(RedisTorrentStore { client: client.clone() }),
        users: Arc::new(RedisUserStore { client }),
    })
}

fn torrent_key(info_hash: &InfoHash) -> String {
    format!("t:torrent:{info_hash}")
}

fn peer_key(info_hash: &InfoHash, peer_id: &PeerId) -> String {
    format!("t:peer:{}:{}", info_hash.to_hex_string(), peer_id.to_hex_string())
}

fn user_key(passkey: &Passkey) -> String {
    format!("t:user:{passkey}")
}

fn field(fields: &HashMap<String, String>, name: &str) -> String {
    fields.get(name).cloned().unwrap_or_default()
}

fn numeric_field<T: FromStr + Default>(fields: &HashMap<String, String>, name: &str) -> T {
    field(fields, name).parse().unwrap_or_default()
}

fn flag_field(fields: &HashMap<String, String>, name: &str) -> bool {
    field(fields, name) == "1"
}

pub struct RedisTorrentStore {
    client: Client,
}

impl RedisTorrentStore {
    fn connection(&self) -> Result<Connection, Error> {
        Ok(self.client.get_connection()?)
    }
}

impl TorrentStore for RedisTorrentStore {
    fn sync(&self, batch: &HashMap<InfoHash, TorrentStatsDelta>) -> Result<(), Error> {
        let mut conn = self.connection()?;

        for (info_hash, stats) in batch {
            let key = torrent_key(info_hash);

            // Deleted torrent before the sync occurred.
            let exists: bool = conn.exists(&key)?;
            if !exists {
                continue;
            }

            let _: i64 = conn.hincr(&key, "total_uploaded", stats.uploaded)?;
            let _: i64 = conn.hincr(&key, "total_downloaded", stats.downloaded)?;
            let _: i64 = conn.hincr(&key, "completed", stats.snatches)?;
        }

        Ok(())
    }

    fn get(&self, info_hash: &InfoHash) -> Result<Option<Torrent>, Error> {
        let mut conn = self.connection()?;

        let fields: HashMap<String, String> = conn.hgetall(torrent_key(info_hash))?;

        if fields.is_empty() || flag_field(&fields, "is_deleted") {
            return Ok(None);
        }

        Ok(Some(Torrent {
            info_hash: *info_hash,
            name: field(&fields, "name"),
            is_deleted: false,
            created_on: DurationSinceUnixEpoch::from_secs(numeric_field(&fields, "created_on")),
            completed: numeric_field(&fields, "completed"),
            total_uploaded: numeric_field(&fields, "total_uploaded"),
            total_downloaded: numeric_field(&fields, "total_downloaded"),
        }))
    }

    fn add(&self, torrent: &Torrent) -> Result<(), Error> {
        let mut conn = self.connection()?;

        let key = torrent_key(&torrent.info_hash);

        let exists: bool = conn.exists(&key)?;
        if exists {
            return Err(Error::Duplicate {
                location: Location::caller(),
                driver: DRIVER,
            });
        }

        let _: () = conn.hset_multiple(
            &key,
            &[
                ("name", torrent.name.clone()),
                ("is_deleted", flag(torrent.is_deleted)),
                ("created_on", torrent.created_on.as_secs().to_string()),
                ("completed", torrent.completed.to_string()),
                ("total_uploaded", torrent.total_uploaded.to_string()),
                ("total_downloaded", torrent.total_downloaded.to_string()),
            ],
        )?;

        Ok(())
    }

    fn delete(&self, info_hash: &InfoHash, hard: bool) -> Result<(), Error> {
        let mut conn = self.connection()?;

        let key = torrent_key(info_hash);

        if hard {
            let _: () = conn.del(&key)?;
        } else {
            let _: () = conn.hset(&key, "is_deleted", "1")?;
        }

        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Torrent>, Error> {
        let mut conn = self.connection()?;

        let keys: Vec<String> = conn.scan_match("t:torrent:*")?.collect();

        let mut torrents = Vec::with_capacity(keys.len());

        for key in keys {
            let Some(hex) = key.strip_prefix("t:torrent:") else {
                continue;
            };
            let Ok(info_hash) = InfoHash::from_str(hex) else {
                continue;
            };

            if let Some(torrent) = self.get(&info_hash)? {
                torrents.push(torrent);
            }
        }

        Ok(torrents)
    }

    fn whitelist_add(&self, entry: &WhitelistEntry) -> Result<(), Error> {
        let mut conn = self.connection()?;

        let _: () = conn.hset(WHITELIST_KEY, entry.prefix.clone(), entry.name.clone())?;

        Ok(())
    }

    fn whitelist_remove(&self, prefix: &str) -> Result<(), Error> {
        let mut conn = self.connection()?;

        let _: () = conn.hdel(WHITELIST_KEY, prefix)?;

        Ok(())
    }

    fn whitelist_all(&self) -> Result<Vec<WhitelistEntry>, Error> {
        let mut conn = self.connection()?;

        let entries: HashMap<String, String> = conn.hgetall(WHITELIST_KEY)?;

        Ok(entries
            .into_iter()
            .map(|(prefix, name)| WhitelistEntry { prefix, name })
            .collect())
    }

    fn close(&self) -> Result<(), Error> {
        // Connections are per-call and close on drop.
        Ok(())
    }
}

pub struct RedisPeerStore {
    client: Client,
}

impl RedisPeerStore {
    fn connection(&self) -> Result<Connection, Error> {
        Ok(self.client.get_connection()?)
    }
}

impl PeerStore for RedisPeerStore {
    fn sync(&self, batch: &HashMap<PeerKey, PeerStatsDelta>) -> Result<(), Error> {
        let mut conn = self.connection()?;

        for (key, stats) in batch {
            let key = peer_key(&key.info_hash(), &key.peer_id());

            let exists: bool = conn.exists(&key)?;
            if !exists {
                continue;
            }

            let _: i64 = conn.hincr(&key, "uploaded", stats.uploaded)?;
            let _: i64 = conn.hincr(&key, "downloaded", stats.downloaded)?;
            let _: i64 = conn.hincr(&key, "announces", stats.announces)?;
            let _: () = conn.hset(&key, "last_announce", stats.last_announce.as_secs().to_string())?;
        }

        Ok(())
    }

    fn get(&self, info_hash: &InfoHash, peer_id: &PeerId) -> Result<Option<Peer>, Error> {
        let mut conn = self.connection()?;

        let fields: HashMap<String, String> = conn.hgetall(peer_key(info_hash, peer_id))?;

        if fields.is_empty() {
            return Ok(None);
        }

        Ok(Some(Peer {
            peer_id: *peer_id,
            ip: Ipv4Addr::from_str(&field(&fields, "ip")).unwrap_or(Ipv4Addr::UNSPECIFIED),
            port: numeric_field(&fields, "port"),
            user_id: numeric_field(&fields, "user_id"),
            uploaded: numeric_field(&fields, "uploaded"),
            downloaded: numeric_field(&fields, "downloaded"),
            corrupt: numeric_field(&fields, "corrupt"),
            left: numeric_field(&fields, "bytes_left"),
            announces: numeric_field(&fields, "announces"),
            first_announce: DurationSinceUnixEpoch::from_secs(numeric_field(&fields, "first_announce")),
            last_announce: DurationSinceUnixEpoch::from_secs(numeric_field(&fields, "last_announce")),
            active: flag_field(&fields, "active"),
        }))
    }

    fn add(&self, info_hash: &InfoHash, peer: &Peer) -> Result<(), Error> {
        let mut conn = self.connection()?;

        let _: () = conn.hset_multiple(
            peer_key(info_hash, &peer.peer_id),
            &[
                ("ip", peer.ip.to_string()),
                ("port", peer.port.to_string()),
                ("user_id", peer.user_id.to_string()),
                ("uploaded", peer.uploaded.to_string()),
                ("downloaded", peer.downloaded.to_string()),
                ("corrupt", peer.corrupt.to_string()),
                ("bytes_left", peer.left.to_string()),
                ("announces", peer.announces.to_string()),
                ("first_announce", peer.first_announce.as_secs().to_string()),
                ("last_announce", peer.last_announce.as_secs().to_string()),
                ("active", flag(peer.active)),
            ],
        )?;

        Ok(())
    }

    fn delete(&self, info_hash: &InfoHash, peer_id: &PeerId) -> Result<(), Error> {
        let mut conn = self.connection()?;

        let _: () = conn.del(peer_key(info_hash, peer_id))?;

        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

pub struct RedisUserStore {
    client: Client,
}

impl RedisUserStore {
    fn connection(&self) -> Result<Connection, Error> {
        Ok(self.client.get_connection()?)
    }
}

impl UserStore for RedisUserStore {
    fn sync(&self, batch: &HashMap<Passkey, UserStatsDelta>) -> Result<(), Error> {
        let mut conn = self.connection()?;

        for (passkey, stats) in batch {
            let key = user_key(passkey);

            let exists: bool = conn.exists(&key)?;
            if !exists {
                continue;
            }

            let _: i64 = conn.hincr(&key, "uploaded", stats.uploaded)?;
            let _: i64 = conn.hincr(&key, "downloaded", stats.downloaded)?;
            let _: i64 = conn.hincr(&key, "announces", stats.announces)?;
        }

        Ok(())
    }

    fn get_by_passkey(&self, passkey: &Passkey) -> Result<Option<User>, Error> {
        let mut conn = self.connection()?;

        let fields: HashMap<String, String> = conn.hgetall(user_key(passkey))?;

        if fields.is_empty() {
            return Ok(None);
        }

        Ok(Some(User {
            passkey: passkey.clone(),
            user_id: numeric_field(&fields, "user_id"),
            uploaded: numeric_field(&fields, "uploaded"),
            downloaded: numeric_field(&fields, "downloaded"),
            announces: numeric_field(&fields, "announces"),
            enabled: flag_field(&fields, "enabled"),
        }))
    }

    fn add(&self, user: &User) -> Result<(), Error> {
        let mut conn = self.connection()?;

        let _: () = conn.hset_multiple(
            user_key(&user.passkey),
            &[
                ("user_id", user.user_id.to_string()),
                ("uploaded", user.uploaded.to_string()),
                ("downloaded", user.downloaded.to_string()),
                ("announces", user.announces.to_string()),
                ("enabled", flag(user.enabled)),
            ],
        )?;

        Ok(())
    }

    fn delete(&self, passkey: &Passkey) -> Result<(), Error> {
        let mut conn = self.connection()?;

        let _: () = conn.del(user_key(passkey))?;

        Ok(())
    }

    fn load_all(&self) -> Result<Vec<User>, Error> {
        let mut conn = self.connection()?;

        let keys: Vec<String> = conn.scan_match("t:user:*")?.collect();

        let mut users = Vec::with_capacity(keys.len());

        for key in keys {
            let Some(passkey) = key.strip_prefix("t:user:") else {
                continue;
            };

            if let Some(user) = self.get_by_passkey(&Passkey::new(passkey))? {
                users.push(user);
            }
        }

        Ok(users)
    }

    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

fn flag(value: bool) -> String {
    String::from(if value { "1" } else { "0" })
}
