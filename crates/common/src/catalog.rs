//! Catalog documents: products and the comments written about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CommentId, Money, ProductId, ReplyId, UserId};

/// A catalog product. Only the fields the order workflow touches are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub count_in_stock: u32,
    pub total_sales: u32,
    pub is_disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Money, count_in_stock: u32) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            price,
            count_in_stock,
            total_sales: 0,
            is_disabled: false,
            created_at: Utc::now(),
        }
    }
}

/// A reply nested under a comment. Replies carry their own author and subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: ReplyId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub content: String,
    pub is_disabled: bool,
}

impl Reply {
    pub fn new(user_id: UserId, product_id: ProductId, content: impl Into<String>) -> Self {
        Self {
            id: ReplyId::new(),
            user_id,
            product_id,
            content: content.into(),
            is_disabled: false,
        }
    }
}

/// A product review comment with its replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub content: String,
    pub rating: u8,
    pub is_disabled: bool,
    pub replies: Vec<Reply>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        user_id: UserId,
        product_id: ProductId,
        content: impl Into<String>,
        rating: u8,
    ) -> Self {
        Self {
            id: CommentId::new(),
            user_id,
            product_id,
            content: content.into(),
            rating,
            is_disabled: false,
            replies: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns the same comment with a reply appended.
    pub fn with_reply(mut self, reply: Reply) -> Self {
        self.replies.push(reply);
        self
    }

    /// True if the comment or any of its replies was written by `user_id`.
    pub fn involves(&self, user_id: UserId) -> bool {
        self.user_id == user_id || self.replies.iter().any(|r| r.user_id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_product_has_no_sales() {
        let product = Product::new("Widget", Money::from_cents(999), 4);
        assert_eq!(product.count_in_stock, 4);
        assert_eq!(product.total_sales, 0);
        assert!(!product.is_disabled);
    }

    #[test]
    fn involves_author_and_repliers_only() {
        let (author, replier, stranger) = (UserId::new(), UserId::new(), UserId::new());
        let product = ProductId::new();
        let comment = Comment::new(author, product, "Great", 5)
            .with_reply(Reply::new(replier, product, "Agreed"));

        assert!(comment.involves(author));
        assert!(comment.involves(replier));
        assert!(!comment.involves(stranger));
    }
}
