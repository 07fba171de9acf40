//! Domain layer for the storefront backend.
//!
//! This crate provides the transactional workflows:
//! - Inventory ledger with conditional stock reservation
//! - Order placement and the payment/delivery updates
//! - Account registration, login, deletion, disable and restore
//! - Authentication collaborators (credential hashing, tokens, principals)

pub mod account;
pub mod auth;
pub mod error;
pub mod inventory;
pub mod order;

pub use account::{
    AccountError, AccountService, AccountSession, CommentVisibility, RegisterAccount,
    derived_disabled,
};
pub use auth::{
    Argon2Hasher, AuthError, Authenticator, CredentialHasher, HmacTokenIssuer, Principal,
    TokenIssuer, TokenKind, TokenPair,
};
pub use error::ErrorKind;
pub use inventory::{InventoryError, InventoryLedger};
pub use order::{MarkPaid, OrderError, OrderService, PlaceOrder};
