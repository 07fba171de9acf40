//! Error kinds shared by every domain error.

use serde::Serialize;

/// The category of a domain failure.
///
/// Each domain error reports one kind so callers can translate failures
/// without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or empty input. Nothing was written.
    Validation,
    /// A line item asked for more than the product has in stock.
    InsufficientStock,
    /// An active user already owns the email.
    DuplicateEmail,
    /// An active user already owns the name.
    DuplicateName,
    /// The user is referenced by a non-disabled order.
    HasOrders,
    /// The referenced record does not exist.
    NotFound,
    /// An invariant the system maintains itself was found broken.
    InternalConsistency,
    Unauthorized,
    Forbidden,
    /// Infrastructure failure (storage, hashing, signing).
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::DuplicateEmail => "duplicate_email",
            ErrorKind::DuplicateName => "duplicate_name",
            ErrorKind::HasOrders => "has_orders",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InternalConsistency => "internal_consistency",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
