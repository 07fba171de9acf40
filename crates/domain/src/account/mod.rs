//! Account provisioning and deprovisioning.

mod service;
mod visibility;

pub use service::AccountService;
pub use visibility::{CommentVisibility, derived_disabled};

use common::{UserId, UserProfile};
use serde::Serialize;
use store::{ACTIVE_EMAIL_CONSTRAINT, StoreError};
use thiserror::Error;

use crate::auth::{AuthError, TokenPair};
use crate::error::ErrorKind;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Invalid account data: {0}")]
    Validation(String),

    /// An active user already owns the email.
    #[error("Email already in use")]
    DuplicateEmail,

    /// An active user already owns the name.
    #[error("Name already in use")]
    DuplicateName,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not found: {0}")]
    NotFound(UserId),

    /// The user is referenced by at least one non-disabled order.
    #[error("User {0} has orders")]
    HasOrders(UserId),

    /// A record the system guarantees to exist was missing.
    #[error("Internal consistency violation: {0}")]
    InternalConsistency(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(StoreError),
}

impl AccountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccountError::Validation(_) => ErrorKind::Validation,
            AccountError::DuplicateEmail => ErrorKind::DuplicateEmail,
            AccountError::DuplicateName => ErrorKind::DuplicateName,
            AccountError::InvalidCredentials => ErrorKind::Unauthorized,
            AccountError::NotFound(_) => ErrorKind::NotFound,
            AccountError::HasOrders(_) => ErrorKind::HasOrders,
            AccountError::InternalConsistency(_) => ErrorKind::InternalConsistency,
            AccountError::Auth(e) => e.kind(),
            AccountError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        if e.is_unique_violation_of(ACTIVE_EMAIL_CONSTRAINT) {
            AccountError::DuplicateEmail
        } else {
            AccountError::Store(e)
        }
    }
}

/// Command to register a new account.
#[derive(Debug, Clone)]
pub struct RegisterAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterAccount {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), AccountError> {
        if self.name.trim().is_empty() {
            return Err(AccountError::Validation("name is required".to_string()));
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(AccountError::Validation(
                "a valid email is required".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(AccountError::Validation("password is required".to_string()));
        }
        Ok(())
    }
}

/// A signed-in account: the public profile and freshly issued tokens.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSession {
    #[serde(flatten)]
    pub profile: UserProfile,

    #[serde(flatten)]
    pub tokens: TokenPair,
}
