//! The in-memory user registry.
use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::authentication::{Passkey, User};

/// In-memory registry mapping passkeys to users.
///
/// Lookups are read-mostly; a single RW-lock suffices.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Passkey, User>>,
}

impl InMemoryUserRepository {
    /// Adds a user, replacing any previous record under the same passkey.
    pub async fn add(&self, user: User) {
        self.users.write().await.insert(user.passkey.clone(), user);
    }

    /// Removes a user.
    ///
    /// # Returns
    ///
    /// - `true` if the user was present and removed.
    /// - `false` if the passkey was not found.
    pub async fn remove(&self, passkey: &Passkey) -> bool {
        self.users.write().await.remove(passkey).is_some()
    }

    /// Returns a value snapshot of the user, known or not, enabled or not.
    /// Interpreting that is the authentication service's job.
    pub async fn get_by_passkey(&self, passkey: &Passkey) -> Option<User> {
        self.users.read().await.get(passkey).cloned()
    }

    /// Applies one announce's deltas to the user counters.
    pub async fn apply_stats(&self, passkey: &Passkey, uploaded_delta: u64, downloaded_delta: u64) {
        if let Some(user) = self.users.write().await.get_mut(passkey) {
            user.uploaded += uploaded_delta;
            user.downloaded += downloaded_delta;
            user.announces += 1;
        }
    }

    /// Clears all users from the registry.
    pub(crate) async fn clear(&self) {
        self.users.write().await.clear();
    }

    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}
