use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Cart, Comment, CommentId, Order, OrderId, PaymentResult, Product, ProductId, RefreshToken,
    User, UserId,
};
use futures_util::future::BoxFuture;

use crate::{Result, StoreError};

/// Reads and single-statement guarded updates that need no surrounding
/// transaction.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// Retrieves a user by id, disabled or not.
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Retrieves the active (non-disabled) user with this exact email.
    async fn find_active_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Retrieves the active (non-disabled) user with this exact name.
    async fn find_active_user_by_name(&self, name: &str) -> Result<Option<User>>;

    /// Retrieves the cart owned by a user.
    async fn get_cart_for_user(&self, user_id: UserId) -> Result<Option<Cart>>;

    /// Retrieves the refresh tokens persisted for a user.
    async fn get_refresh_tokens_for_user(&self, user_id: UserId) -> Result<Vec<RefreshToken>>;

    /// Returns true if a non-disabled order references the user.
    async fn has_active_order_for_user(&self, user_id: UserId) -> Result<bool>;

    /// Retrieves an order by id.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Lists every order, newest first.
    async fn list_all_orders(&self) -> Result<Vec<Order>>;

    /// Marks an order paid in a single update.
    ///
    /// Returns the updated order, or None if it doesn't exist.
    async fn mark_order_paid(
        &self,
        id: OrderId,
        paid_at: DateTime<Utc>,
        result: &PaymentResult,
    ) -> Result<Option<Order>>;

    /// Marks an order delivered in a single update.
    ///
    /// Returns the updated order, or None if it doesn't exist.
    async fn mark_order_delivered(
        &self,
        id: OrderId,
        delivered_at: DateTime<Utc>,
    ) -> Result<Option<Order>>;

    /// Retrieves a product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Inserts or replaces a product.
    async fn save_product(&self, product: &Product) -> Result<()>;

    /// Retrieves a comment with its replies.
    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>>;

    /// Inserts or replaces a comment together with its replies.
    async fn save_comment(&self, comment: &Comment) -> Result<()>;
}

/// A unit of work against the store.
///
/// Every write made through a transaction becomes visible on [`commit`]
/// and is discarded on [`rollback`] or when the transaction is dropped
/// uncommitted.
///
/// [`commit`]: Transaction::commit
/// [`rollback`]: Transaction::rollback
#[async_trait]
pub trait Transaction: Send {
    /// Decrements stock and increments sales by `quantity` if and only if the
    /// product has at least `quantity` in stock, as one conditional update.
    ///
    /// Returns false when nothing was updated (too little stock or no such
    /// product).
    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool>;

    /// Increments stock and decrements sales by `quantity` if and only if the
    /// product has at least `quantity` recorded sales.
    ///
    /// Returns false when nothing was updated.
    async fn release_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool>;

    /// Persists a new order.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Persists a new user.
    ///
    /// Fails with [`StoreError::UniqueViolation`] on
    /// [`ACTIVE_EMAIL_CONSTRAINT`](crate::ACTIVE_EMAIL_CONSTRAINT) if another
    /// active user owns the email.
    async fn insert_user(&mut self, user: &User) -> Result<()>;

    /// Persists a new cart.
    async fn insert_cart(&mut self, cart: &Cart) -> Result<()>;

    /// Persists a refresh token.
    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> Result<()>;

    /// Retrieves a user as seen by this transaction.
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>>;

    /// Retrieves a product as seen by this transaction.
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Sets or clears a user's disabled flag.
    ///
    /// Clearing the flag is subject to the active-email constraint.
    /// Returns the updated user, or None if it doesn't exist.
    async fn set_user_disabled(&mut self, id: UserId, disabled: bool) -> Result<Option<User>>;

    /// Deletes a user, returning the deleted record.
    async fn delete_user(&mut self, id: UserId) -> Result<Option<User>>;

    /// Deletes the cart owned by a user, returning the deleted record.
    async fn delete_cart_for_user(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Deletes the comments and replies written by a user.
    ///
    /// Returns how many comments and replies were removed.
    async fn delete_comments_by_user(&mut self, user_id: UserId) -> Result<u64>;

    /// Disables every enabled comment and reply written by a user.
    ///
    /// Returns how many comments and replies changed.
    async fn disable_comments_by_user(&mut self, user_id: UserId) -> Result<u64>;

    /// Retrieves comments that are disabled and written by the user, or that
    /// hold a disabled reply written by the user. Replies are included.
    async fn disabled_comments_involving(&mut self, user_id: UserId) -> Result<Vec<Comment>>;

    /// Inserts or replaces a comment together with its replies.
    async fn save_comment(&mut self, comment: &Comment) -> Result<()>;

    /// Deletes every refresh token persisted for a user.
    async fn delete_refresh_tokens_for_user(&mut self, user_id: UserId) -> Result<u64>;

    /// Makes every write of this transaction visible.
    async fn commit(self) -> Result<()>
    where
        Self: Sized;

    /// Discards every write of this transaction.
    async fn rollback(self) -> Result<()>
    where
        Self: Sized;
}

/// Opens transactions against a store.
#[async_trait]
pub trait TransactionCoordinator: Send + Sync {
    /// The transaction type handed to units of work.
    type Tx: Transaction;

    /// Begins a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// Runs `work` inside a transaction with all-or-nothing semantics.
///
/// The transaction is committed when `work` returns `Ok` and explicitly
/// rolled back when it returns `Err`; the error is then handed back to the
/// caller unchanged. Nothing is retried.
///
/// Values needed by the work should be moved into the closure: the future it
/// returns may only borrow the transaction.
pub async fn run_transaction<C, T, E, F>(coordinator: &C, work: F) -> std::result::Result<T, E>
where
    C: TransactionCoordinator + ?Sized,
    T: Send,
    E: From<StoreError> + Send,
    F: for<'t> FnOnce(&'t mut C::Tx) -> BoxFuture<'t, std::result::Result<T, E>> + Send,
{
    let started = Instant::now();
    let mut tx = coordinator.begin().await?;

    let outcome = work(&mut tx).await;

    let result = match outcome {
        Ok(value) => match tx.commit().await {
            Ok(()) => {
                metrics::counter!("transactions_total", "outcome" => "committed").increment(1);
                Ok(value)
            }
            Err(e) => {
                tracing::error!(error = %e, "transaction commit failed");
                metrics::counter!("transactions_total", "outcome" => "commit_failed")
                    .increment(1);
                Err(E::from(e))
            }
        },
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "transaction rollback failed");
            }
            metrics::counter!("transactions_total", "outcome" => "aborted").increment(1);
            Err(err)
        }
    };

    metrics::histogram!("transaction_duration_seconds").record(started.elapsed().as_secs_f64());
    result
}
