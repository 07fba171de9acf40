//! Transactional storage for the storefront backend.
//!
//! - [`Store`] covers plain reads and single-statement guarded updates.
//! - [`TransactionCoordinator`] opens a [`Transaction`]; [`run_transaction`]
//!   runs a unit of work inside one and commits or rolls back as a whole.
//! - [`InMemoryStore`] and [`PostgresStore`] implement both.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{ACTIVE_EMAIL_CONSTRAINT, CART_OWNER_CONSTRAINT, Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{Store, Transaction, TransactionCoordinator, run_transaction};
