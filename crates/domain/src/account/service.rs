//! Account service: registration, login and the deprovisioning workflows.

use std::collections::HashMap;
use std::sync::Arc;

use common::{Cart, ProductId, RefreshToken, User, UserId, UserProfile};
use futures_util::FutureExt;
use store::{Store, Transaction, TransactionCoordinator, run_transaction};

use super::{AccountError, AccountSession, CommentVisibility, RegisterAccount};
use crate::auth::{AuthError, CredentialHasher, TokenIssuer};

/// Service for creating, signing in and removing user accounts.
pub struct AccountService<S> {
    store: S,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenIssuer>,
}

impl<S> AccountService<S>
where
    S: Store + TransactionCoordinator,
{
    pub fn new(store: S, hasher: Arc<dyn CredentialHasher>, tokens: Arc<dyn TokenIssuer>) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a user together with their empty cart and first refresh token.
    ///
    /// The duplicate-email check runs before the transaction; the store's
    /// uniqueness constraint catches registrations racing past it.
    #[tracing::instrument(skip(self, cmd), fields(email = %cmd.email))]
    pub async fn register(&self, cmd: RegisterAccount) -> Result<AccountSession, AccountError> {
        cmd.validate()?;

        if self
            .store
            .find_active_user_by_email(&cmd.email)
            .await?
            .is_some()
        {
            return Err(AccountError::DuplicateEmail);
        }

        let password_hash = self.hash_password(cmd.password).await?;
        let user = User::new(cmd.name, cmd.email, password_hash);
        let tokens = self.tokens.issue_pair(user.id)?;
        let refresh = RefreshToken::new(user.id, tokens.refresh_token.clone());
        let cart = Cart::empty_for(user.id);

        let user = run_transaction(&self.store, move |tx| {
            async move {
                tx.insert_user(&user).await?;
                tx.insert_refresh_token(&refresh).await?;
                tx.insert_cart(&cart).await?;
                Ok::<_, AccountError>(user)
            }
            .boxed()
        })
        .await?;

        metrics::counter!("accounts_registered_total").increment(1);
        tracing::info!(user_id = %user.id, "account registered");

        Ok(AccountSession {
            profile: UserProfile::from(user),
            tokens,
        })
    }

    /// Signs an active user in, replacing any refresh tokens issued earlier.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AccountSession, AccountError> {
        let Some(user) = self.store.find_active_user_by_email(email).await? else {
            return Err(AccountError::InvalidCredentials);
        };

        if !self
            .verify_password(user.password_hash.clone(), password.to_string())
            .await?
        {
            return Err(AccountError::InvalidCredentials);
        }

        let tokens = self.tokens.issue_pair(user.id)?;
        let refresh = RefreshToken::new(user.id, tokens.refresh_token.clone());
        let user_id = user.id;

        run_transaction(&self.store, move |tx| {
            async move {
                tx.delete_refresh_tokens_for_user(user_id).await?;
                tx.insert_refresh_token(&refresh).await?;
                Ok::<_, AccountError>(())
            }
            .boxed()
        })
        .await?;

        tracing::info!(%user_id, "user signed in");
        Ok(AccountSession {
            profile: UserProfile::from(user),
            tokens,
        })
    }

    /// Removes a user with their cart, comments and refresh tokens.
    ///
    /// Users referenced by a non-disabled order are never removed. A user
    /// without a cart indicates earlier corruption and aborts the deletion.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, user_id: UserId) -> Result<(), AccountError> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AccountError::NotFound(user_id));
        }
        if self.store.has_active_order_for_user(user_id).await? {
            return Err(AccountError::HasOrders(user_id));
        }

        let (comments, tokens) = run_transaction(&self.store, move |tx| {
            async move {
                if tx.delete_user(user_id).await?.is_none() {
                    return Err(AccountError::InternalConsistency(format!(
                        "user {user_id} disappeared during deletion"
                    )));
                }
                if tx.delete_cart_for_user(user_id).await?.is_none() {
                    return Err(AccountError::InternalConsistency(format!(
                        "user {user_id} has no cart"
                    )));
                }
                let comments = tx.delete_comments_by_user(user_id).await?;
                let tokens = tx.delete_refresh_tokens_for_user(user_id).await?;
                Ok::<_, AccountError>((comments, tokens))
            }
            .boxed()
        })
        .await?;

        metrics::counter!("accounts_deleted_total").increment(1);
        tracing::info!(comments, tokens, "user deleted");
        Ok(())
    }

    /// Soft-deletes an active user and hides everything they wrote.
    #[tracing::instrument(skip(self))]
    pub async fn disable_user(&self, user_id: UserId) -> Result<UserProfile, AccountError> {
        match self.store.get_user(user_id).await? {
            Some(user) if user.is_active() => {}
            _ => return Err(AccountError::NotFound(user_id)),
        }
        if self.store.has_active_order_for_user(user_id).await? {
            return Err(AccountError::HasOrders(user_id));
        }

        let user = run_transaction(&self.store, move |tx| {
            async move {
                let user = tx.set_user_disabled(user_id, true).await?.ok_or_else(|| {
                    AccountError::InternalConsistency(format!(
                        "user {user_id} disappeared while disabling"
                    ))
                })?;
                let hidden = tx.disable_comments_by_user(user_id).await?;
                tracing::debug!(hidden, "comments hidden");
                Ok::<_, AccountError>(user)
            }
            .boxed()
        })
        .await?;

        tracing::info!("user disabled");
        Ok(UserProfile::from(user))
    }

    /// Re-enables a disabled user.
    ///
    /// Each comment and reply the user wrote is shown again only if its
    /// subject product is enabled.
    #[tracing::instrument(skip(self))]
    pub async fn restore_user(&self, user_id: UserId) -> Result<UserProfile, AccountError> {
        let user = match self.store.get_user(user_id).await? {
            Some(user) if user.is_disabled => user,
            _ => return Err(AccountError::NotFound(user_id)),
        };
        if self
            .store
            .find_active_user_by_name(&user.name)
            .await?
            .is_some()
        {
            return Err(AccountError::DuplicateName);
        }
        if self
            .store
            .find_active_user_by_email(&user.email)
            .await?
            .is_some()
        {
            return Err(AccountError::DuplicateEmail);
        }

        let user = run_transaction(&self.store, move |tx| {
            async move {
                let user = tx.set_user_disabled(user_id, false).await?.ok_or_else(|| {
                    AccountError::InternalConsistency(format!(
                        "user {user_id} disappeared while restoring"
                    ))
                })?;
                let visibility = CommentVisibility::for_author(&user);

                let mut subjects: HashMap<ProductId, bool> = HashMap::new();
                for mut comment in tx.disabled_comments_involving(user_id).await? {
                    let product_ids = std::iter::once(comment.product_id)
                        .chain(comment.replies.iter().map(|r| r.product_id))
                        .collect::<Vec<_>>();
                    for product_id in product_ids {
                        if !subjects.contains_key(&product_id) {
                            // A product that no longer exists keeps its comments hidden.
                            let disabled = tx
                                .get_product(product_id)
                                .await?
                                .is_none_or(|p| p.is_disabled);
                            subjects.insert(product_id, disabled);
                        }
                    }

                    let subject_disabled = |id: ProductId| subjects.get(&id).copied().unwrap_or(true);
                    if visibility.apply(&mut comment, subject_disabled) {
                        tx.save_comment(&comment).await?;
                    }
                }
                Ok::<_, AccountError>(user)
            }
            .boxed()
        })
        .await?;

        tracing::info!("user restored");
        Ok(UserProfile::from(user))
    }

    async fn hash_password(&self, password: String) -> Result<String, AccountError> {
        let hasher = Arc::clone(&self.hasher);
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))??;
        Ok(hash)
    }

    async fn verify_password(&self, hash: String, password: String) -> Result<bool, AccountError> {
        let hasher = Arc::clone(&self.hasher);
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))??;
        Ok(matches)
    }
}
