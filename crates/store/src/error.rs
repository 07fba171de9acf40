use thiserror::Error;

/// Name of the uniqueness constraint on the email of active users.
pub const ACTIVE_EMAIL_CONSTRAINT: &str = "users_active_email_key";

/// Name of the uniqueness constraint on a cart's owner.
pub const CART_OWNER_CONSTRAINT: &str = "carts_user_id_key";

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A stored value could not be mapped back into a document.
    #[error("Corrupt stored data: {0}")]
    DataCorruption(String),

    /// A failure injected through the in-memory store's test hooks.
    #[error("Injected failure: {0}")]
    Injected(&'static str),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if this is a violation of the named uniqueness constraint.
    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
