//! Shared types for the storefront backend.
//!
//! Everything persisted by the `store` crate and manipulated by the `domain`
//! crate lives here: typed identifiers, money, and the entity documents
//! (users, carts, orders, products, comments, refresh tokens).

pub mod catalog;
pub mod money;
pub mod order;
pub mod types;
pub mod user;

pub use catalog::{Comment, Product, Reply};
pub use money::Money;
pub use order::{LineItem, Order, PaymentResult, PriceBreakdown, ShippingAddress};
pub use types::{CartId, CommentId, OrderId, ProductId, RefreshTokenId, ReplyId, UserId};
pub use user::{Cart, CartItem, DEFAULT_AVATAR_URL, RefreshToken, User, UserProfile};
