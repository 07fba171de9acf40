//! User accounts and the records they own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CartId, ProductId, RefreshTokenId, UserId};

/// Avatar shown for users who never uploaded one.
pub const DEFAULT_AVATAR_URL: &str = "/images/avatar/default.png";

/// A persisted user account.
///
/// `password_hash` is whatever the credential hasher produced; it never leaves
/// the backend (see [`UserProfile`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub is_disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new active, non-admin user.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            avatar_url: None,
            is_admin: false,
            is_disabled: false,
            created_at: Utc::now(),
        }
    }

    /// Returns the same user with admin rights.
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn is_active(&self) -> bool {
        !self.is_disabled
    }
}

/// The outward-facing view of a user.
///
/// This is the only place a missing avatar is replaced with
/// [`DEFAULT_AVATAR_URL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
    pub is_admin: bool,
    pub is_disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            avatar_url: user
                .avatar_url
                .clone()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
            is_admin: user.is_admin,
            is_disabled: user.is_disabled,
            created_at: user.created_at,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

/// An item sitting in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A user's shopping cart. Exactly one exists per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart owned by `user_id`.
    pub fn empty_for(user_id: UserId) -> Self {
        Self {
            id: CartId::new(),
            user_id,
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A server-side record of the refresh token most recently issued to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: RefreshTokenId,
    pub user_id: UserId,
    pub token_value: String,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new(user_id: UserId, token_value: impl Into<String>) -> Self {
        Self {
            id: RefreshTokenId::new(),
            user_id,
            token_value: token_value.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_substitutes_default_avatar() {
        let user = User::new("Ann", "ann@example.com", "hash");
        let profile = UserProfile::from(&user);
        assert_eq!(profile.avatar_url, DEFAULT_AVATAR_URL);

        let mut blank = user.clone();
        blank.avatar_url = Some("   ".to_string());
        assert_eq!(UserProfile::from(&blank).avatar_url, DEFAULT_AVATAR_URL);
    }

    #[test]
    fn profile_keeps_custom_avatar() {
        let mut user = User::new("Ann", "ann@example.com", "hash");
        user.avatar_url = Some("/images/avatar/ann.png".to_string());
        assert_eq!(UserProfile::from(user).avatar_url, "/images/avatar/ann.png");
    }

    #[test]
    fn profile_does_not_serialize_password_hash() {
        let user = User::new("Ann", "ann@example.com", "secret-hash");
        let json = serde_json::to_string(&UserProfile::from(&user)).unwrap();
        assert!(!json.contains("secret-hash"));
    }

    #[test]
    fn new_cart_is_empty_and_owned() {
        let user_id = UserId::new();
        let cart = Cart::empty_for(user_id);
        assert_eq!(cart.user_id, user_id);
        assert!(cart.items.is_empty());
    }
}
