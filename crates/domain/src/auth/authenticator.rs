use std::sync::Arc;

use common::UserId;
use serde::Serialize;
use store::Store;

use super::{AuthError, TokenIssuer};

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: UserId,
    pub is_admin: bool,
}

impl Principal {
    /// Fails with [`AuthError::Forbidden`] unless the principal is an admin.
    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Resolves bearer tokens into principals.
///
/// A valid signature is not enough: the user must still exist and be active,
/// and the admin flag is read from the store rather than the token.
pub struct Authenticator<S> {
    store: S,
    tokens: Arc<dyn TokenIssuer>,
}

impl<S: Store> Authenticator<S> {
    pub fn new(store: S, tokens: Arc<dyn TokenIssuer>) -> Self {
        Self { store, tokens }
    }

    #[tracing::instrument(skip_all)]
    pub async fn authenticate(&self, bearer: &str) -> Result<Principal, AuthError> {
        let user_id = self.tokens.verify_access(bearer)?;

        match self.store.get_user(user_id).await? {
            Some(user) if user.is_active() => Ok(Principal {
                id: user.id,
                is_admin: user.is_admin,
            }),
            _ => {
                tracing::debug!(%user_id, "token for unknown or disabled user");
                Err(AuthError::UnknownPrincipal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use common::User;
    use secrecy::SecretString;
    use store::{InMemoryStore, Transaction, TransactionCoordinator};

    use super::*;
    use crate::ErrorKind;
    use crate::auth::HmacTokenIssuer;

    fn issuer() -> Arc<dyn TokenIssuer> {
        Arc::new(HmacTokenIssuer::new(
            SecretString::from("access".to_string()),
            SecretString::from("refresh".to_string()),
            Duration::hours(1),
            Duration::days(1),
        ))
    }

    async fn insert(store: &InMemoryStore, user: &User) {
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(user).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn resolves_active_user() {
        let store = InMemoryStore::new();
        let tokens = issuer();
        let admin = User::new("Root", "root@example.com", "hash").with_admin(true);
        insert(&store, &admin).await;

        let auth = Authenticator::new(store, tokens.clone());
        let principal = auth
            .authenticate(&tokens.issue_access(admin.id).unwrap())
            .await
            .unwrap();

        assert_eq!(principal.id, admin.id);
        assert!(principal.require_admin().is_ok());
    }

    #[tokio::test]
    async fn rejects_disabled_and_unknown_users() {
        let store = InMemoryStore::new();
        let tokens = issuer();
        let mut user = User::new("Ann", "ann@example.com", "hash");
        user.is_disabled = true;
        insert(&store, &user).await;

        let auth = Authenticator::new(store, tokens.clone());
        for id in [user.id, UserId::new()] {
            let err = auth
                .authenticate(&tokens.issue_access(id).unwrap())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
        }
    }

    #[test]
    fn non_admin_is_forbidden() {
        let principal = Principal {
            id: UserId::new(),
            is_admin: false,
        };
        assert_eq!(
            principal.require_admin().unwrap_err().kind(),
            ErrorKind::Forbidden
        );
    }
}
