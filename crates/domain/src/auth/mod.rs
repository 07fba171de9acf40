//! Authentication collaborators: credential hashing, token issuance and
//! bearer-token authentication.

mod authenticator;
mod credentials;
mod tokens;

pub use authenticator::{Authenticator, Principal};
pub use credentials::{Argon2Hasher, CredentialHasher};
pub use tokens::{HmacTokenIssuer, TokenIssuer, TokenKind, TokenPair};

use store::StoreError;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur while authenticating a request.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer token was presented.
    #[error("Missing bearer token")]
    MissingToken,

    /// The token is malformed, forged, or of the wrong kind.
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    /// The token names a user that no longer exists or is disabled.
    #[error("Unknown or disabled user")]
    UnknownPrincipal,

    /// The principal lacks admin rights.
    #[error("Admin rights required")]
    Forbidden,

    #[error("Credential hashing failed: {0}")]
    Hashing(String),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::UnknownPrincipal => ErrorKind::Unauthorized,
            AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::Hashing(_) | AuthError::Signing(_) | AuthError::Store(_) => {
                ErrorKind::Internal
            }
        }
    }
}
