//! User manager.
//!
//! Keeps the in-memory user registry and the backing store in step for the
//! admin operations (user add/remove) and for warm-up.
use std::sync::Arc;

use super::repository::in_memory::InMemoryUserRepository;
use super::{Passkey, User};
use crate::databases::{self, UserStore};

pub struct UserManager {
    /// The persisted users.
    user_store: Arc<dyn UserStore>,

    /// The in-memory user registry.
    in_memory_user_repository: Arc<InMemoryUserRepository>,
}

impl UserManager {
    #[must_use]
    pub fn new(user_store: Arc<dyn UserStore>, in_memory_user_repository: &Arc<InMemoryUserRepository>) -> Self {
        Self {
            user_store,
            in_memory_user_repository: in_memory_user_repository.clone(),
        }
    }

    /// Registers a user in the store and the registry.
    ///
    /// # Errors
    ///
    /// Returns a `databases::error::Error` if the store rejects the user.
    pub async fn add_user(&self, user: User) -> Result<(), databases::error::Error> {
        self.user_store.add(&user)?;
        self.in_memory_user_repository.add(user).await;
        Ok(())
    }

    /// Removes a user from the store and the registry.
    ///
    /// # Errors
    ///
    /// Returns a `databases::error::Error` if the store fails.
    pub async fn remove_user(&self, passkey: &Passkey) -> Result<(), databases::error::Error> {
        self.user_store.delete(passkey)?;
        self.in_memory_user_repository.remove(passkey).await;
        Ok(())
    }

    /// Loads every persisted user into the registry, replacing its contents.
    /// Called once on warm-up.
    ///
    /// # Errors
    ///
    /// Returns a `databases::error::Error` if the users cannot be loaded.
    pub async fn load_users_from_store(&self) -> Result<(), databases::error::Error> {
        let users = self.user_store.load_all()?;

        self.in_memory_user_repository.clear().await;

        for user in users {
            self.in_memory_user_repository.add(user).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {

    mod the_user_manager {
        use std::sync::Arc;

        use crate::authentication::manager::UserManager;
        use crate::authentication::repository::in_memory::InMemoryUserRepository;
        use crate::authentication::{Passkey, User};
        use crate::databases::driver::memory::MemoryUserStore;
        use crate::databases::UserStore;

        fn initialize_user_manager() -> (UserManager, Arc<dyn UserStore>, Arc<InMemoryUserRepository>) {
            let user_store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::default());
            let in_memory_user_repository = Arc::new(InMemoryUserRepository::default());
            let user_manager = UserManager::new(user_store.clone(), &in_memory_user_repository);

            (user_manager, user_store, in_memory_user_repository)
        }

        fn sample_user() -> User {
            User::new(Passkey::new("YZSl4lMZupRuOpSRC3krIKR5BPB14nrJ"), 1)
        }

        #[tokio::test]
        async fn it_should_add_a_user_to_both_layers() {
            let (user_manager, user_store, in_memory_user_repository) = initialize_user_manager();

            let user = sample_user();
            user_manager.add_user(user.clone()).await.unwrap();

            assert!(in_memory_user_repository.get_by_passkey(&user.passkey).await.is_some());
            assert!(user_store.get_by_passkey(&user.passkey).unwrap().is_some());
        }

        #[tokio::test]
        async fn it_should_remove_a_user_from_both_layers() {
            let (user_manager, user_store, in_memory_user_repository) = initialize_user_manager();

            let user = sample_user();
            user_manager.add_user(user.clone()).await.unwrap();

            user_manager.remove_user(&user.passkey).await.unwrap();

            assert!(in_memory_user_repository.get_by_passkey(&user.passkey).await.is_none());
            assert!(user_store.get_by_passkey(&user.passkey).unwrap().is_none());
        }

        #[tokio::test]
        async fn it_should_load_the_users_from_the_store_on_warm_up() {
            let (user_manager, user_store, in_memory_user_repository) = initialize_user_manager();

            let user = sample_user();
            user_store.add(&user).unwrap();

            user_manager.load_users_from_store().await.unwrap();

            assert!(in_memory_user_repository.get_by_passkey(&user.passkey).await.is_some());
        }
    }
}
