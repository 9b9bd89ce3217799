//! The authentication service: resolves a passkey to a user.
use std::panic::Location;
use std::sync::Arc;

use super::repository::in_memory::InMemoryUserRepository;
use super::{Passkey, User};
use crate::error::AuthenticationError;

pub struct AuthenticationService {
    /// The in-memory user registry.
    in_memory_user_repository: Arc<InMemoryUserRepository>,
}

impl AuthenticationService {
    #[must_use]
    pub fn new(in_memory_user_repository: &Arc<InMemoryUserRepository>) -> Self {
        Self {
            in_memory_user_repository: in_memory_user_repository.clone(),
        }
    }

    /// Resolves the passkey to an enabled user.
    ///
    /// # Errors
    ///
    /// Will return the same [`AuthenticationError::Unauthorized`] whether the
    /// passkey is unknown or the user is disabled. The caller must not be
    /// able to tell the difference.
    pub async fn authenticate(&self, passkey: &Passkey) -> Result<User, AuthenticationError> {
        match self.in_memory_user_repository.get_by_passkey(passkey).await {
            Some(user) if user.enabled => Ok(user),
            Some(_) | None => Err(AuthenticationError::Unauthorized {
                location: Location::caller(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {

    mod the_authentication_service {
        use std::sync::Arc;

        use crate::authentication::repository::in_memory::InMemoryUserRepository;
        use crate::authentication::service::AuthenticationService;
        use crate::authentication::{Passkey, User};

        fn initialize_service() -> (AuthenticationService, Arc<InMemoryUserRepository>) {
            let in_memory_user_repository = Arc::new(InMemoryUserRepository::default());
            let service = AuthenticationService::new(&in_memory_user_repository);

            (service, in_memory_user_repository)
        }

        #[tokio::test]
        async fn it_should_authenticate_an_enabled_user() {
            let (service, repository) = initialize_service();

            let user = User::new(Passkey::new("YZSl4lMZupRuOpSRC3krIKR5BPB14nrJ"), 1);
            repository.add(user.clone()).await;

            let authenticated = service.authenticate(&user.passkey).await.unwrap();

            assert_eq!(authenticated.user_id, 1);
        }

        #[tokio::test]
        async fn it_should_reject_an_unknown_passkey() {
            let (service, _repository) = initialize_service();

            assert!(service.authenticate(&Passkey::new("unknown")).await.is_err());
        }

        #[tokio::test]
        async fn it_should_reject_a_disabled_user_with_the_same_error_as_an_unknown_passkey() {
            let (service, repository) = initialize_service();

            let mut user = User::new(Passkey::new("YZSl4lMZupRuOpSRC3krIKR5BPB14nrJ"), 1);
            user.enabled = false;
            repository.add(user.clone()).await;

            let disabled_err = service.authenticate(&user.passkey).await.unwrap_err();
            let unknown_err = service.authenticate(&Passkey::new("unknown")).await.unwrap_err();

            assert_eq!(
                crate::error::AnnounceError::from(disabled_err).to_string(),
                crate::error::AnnounceError::from(unknown_err).to_string()
            );
        }
    }
}
