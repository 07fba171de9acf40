use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Cart, CartId, Comment, CommentId, Order, OrderId, PaymentResult, Product, ProductId,
    RefreshToken, User, UserId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    ACTIVE_EMAIL_CONSTRAINT, CART_OWNER_CONSTRAINT, Result, StoreError,
    store::{Store, Transaction, TransactionCoordinator},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    carts: HashMap<CartId, Cart>,
    orders: HashMap<OrderId, Order>,
    products: HashMap<ProductId, Product>,
    comments: HashMap<CommentId, Comment>,
    refresh_tokens: Vec<RefreshToken>,
}

impl Tables {
    fn active_user_with_email(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.is_active() && u.email == email && Some(u.id) != except)
    }

    fn orders_newest_first(&self, filter: impl Fn(&Order) -> bool) -> Vec<Order> {
        let mut orders: Vec<_> = self.orders.values().filter(|o| filter(o)).cloned().collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.id.as_uuid().cmp(&a.id.as_uuid()))
        });
        orders
    }
}

#[derive(Debug, Default)]
struct FailPoints {
    cart_insert: AtomicBool,
    order_insert: AtomicBool,
}

/// In-memory store implementation for testing and local runs.
///
/// Transactions are fully serialized: [`begin`](TransactionCoordinator::begin)
/// takes an async lock over all tables and works on a staged copy that replaces
/// the tables on commit. A task holding an open transaction must not call the
/// non-transactional [`Store`] methods, which wait for the same lock.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail: Arc<FailPoints>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures cart inserts to fail until reset.
    pub fn set_fail_on_cart_insert(&self, fail: bool) {
        self.fail.cart_insert.store(fail, Ordering::SeqCst);
    }

    /// Configures order inserts to fail until reset.
    pub fn set_fail_on_order_insert(&self, fail: bool) {
        self.fail.order_insert.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of users stored.
    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }

    /// Returns the number of carts stored.
    pub async fn cart_count(&self) -> usize {
        self.tables.lock().await.carts.len()
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_active_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.is_active() && u.email == email)
            .cloned())
    }

    async fn find_active_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.is_active() && u.name == name)
            .cloned())
    }

    async fn get_cart_for_user(&self, user_id: UserId) -> Result<Option<Cart>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .carts
            .values()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn get_refresh_tokens_for_user(&self, user_id: UserId) -> Result<Vec<RefreshToken>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .refresh_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn has_active_order_for_user(&self, user_id: UserId) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .any(|o| o.user_id == user_id && !o.is_disabled))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables.orders_newest_first(|o| o.user_id == user_id))
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        Ok(tables.orders_newest_first(|_| true))
    }

    async fn mark_order_paid(
        &self,
        id: OrderId,
        paid_at: DateTime<Utc>,
        result: &PaymentResult,
    ) -> Result<Option<Order>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.orders.get_mut(&id).map(|order| {
            order.is_paid = true;
            order.paid_at = Some(paid_at);
            order.payment_result = Some(result.clone());
            order.clone()
        }))
    }

    async fn mark_order_delivered(
        &self,
        id: OrderId,
        delivered_at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.orders.get_mut(&id).map(|order| {
            order.is_delivered = true;
            order.delivered_at = Some(delivered_at);
            order.clone()
        }))
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>> {
        Ok(self.tables.lock().await.comments.get(&id).cloned())
    }

    async fn save_comment(&self, comment: &Comment) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.comments.insert(comment.id, comment.clone());
        Ok(())
    }
}

/// A transaction over an [`InMemoryStore`].
///
/// Holds the store-wide lock for its whole lifetime.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    fail: Arc<FailPoints>,
}

#[async_trait]
impl TransactionCoordinator for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            staged,
            fail: self.fail.clone(),
        })
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        match self.staged.products.get_mut(&product_id) {
            Some(product) if product.count_in_stock >= quantity => {
                product.count_in_stock -= quantity;
                product.total_sales = product.total_sales.saturating_add(quantity);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        match self.staged.products.get_mut(&product_id) {
            Some(product) if product.total_sales >= quantity => {
                product.total_sales -= quantity;
                product.count_in_stock = product.count_in_stock.saturating_add(quantity);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.fail.order_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Injected("order insert"));
        }
        self.staged.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        if user.is_active() && self.staged.active_user_with_email(&user.email, None) {
            return Err(StoreError::UniqueViolation {
                constraint: ACTIVE_EMAIL_CONSTRAINT.to_string(),
            });
        }
        self.staged.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_cart(&mut self, cart: &Cart) -> Result<()> {
        if self.fail.cart_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Injected("cart insert"));
        }
        if self
            .staged
            .carts
            .values()
            .any(|c| c.user_id == cart.user_id)
        {
            return Err(StoreError::UniqueViolation {
                constraint: CART_OWNER_CONSTRAINT.to_string(),
            });
        }
        self.staged.carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> Result<()> {
        self.staged.refresh_tokens.push(token.clone());
        Ok(())
    }

    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn set_user_disabled(&mut self, id: UserId, disabled: bool) -> Result<Option<User>> {
        let Some(email) = self.staged.users.get(&id).map(|u| u.email.clone()) else {
            return Ok(None);
        };
        if !disabled && self.staged.active_user_with_email(&email, Some(id)) {
            return Err(StoreError::UniqueViolation {
                constraint: ACTIVE_EMAIL_CONSTRAINT.to_string(),
            });
        }
        Ok(self.staged.users.get_mut(&id).map(|user| {
            user.is_disabled = disabled;
            user.clone()
        }))
    }

    async fn delete_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.staged.users.remove(&id))
    }

    async fn delete_cart_for_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        let cart_id = self
            .staged
            .carts
            .values()
            .find(|c| c.user_id == user_id)
            .map(|c| c.id);
        Ok(cart_id.and_then(|id| self.staged.carts.remove(&id)))
    }

    async fn delete_comments_by_user(&mut self, user_id: UserId) -> Result<u64> {
        let before = self.staged.comments.len();
        self.staged.comments.retain(|_, c| c.user_id != user_id);
        let mut removed = (before - self.staged.comments.len()) as u64;

        for comment in self
            .staged
            .comments
            .values_mut()
            .filter(|c| c.involves(user_id))
        {
            let replies_before = comment.replies.len();
            comment.replies.retain(|r| r.user_id != user_id);
            removed += (replies_before - comment.replies.len()) as u64;
        }
        Ok(removed)
    }

    async fn disable_comments_by_user(&mut self, user_id: UserId) -> Result<u64> {
        let mut changed = 0;
        for comment in self
            .staged
            .comments
            .values_mut()
            .filter(|c| c.involves(user_id))
        {
            if comment.user_id == user_id && !comment.is_disabled {
                comment.is_disabled = true;
                changed += 1;
            }
            for reply in comment.replies.iter_mut() {
                if reply.user_id == user_id && !reply.is_disabled {
                    reply.is_disabled = true;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn disabled_comments_involving(&mut self, user_id: UserId) -> Result<Vec<Comment>> {
        let mut comments: Vec<_> = self
            .staged
            .comments
            .values()
            .filter(|c| {
                (c.user_id == user_id && c.is_disabled)
                    || c.replies
                        .iter()
                        .any(|r| r.user_id == user_id && r.is_disabled)
            })
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    async fn save_comment(&mut self, comment: &Comment) -> Result<()> {
        self.staged.comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn delete_refresh_tokens_for_user(&mut self, user_id: UserId) -> Result<u64> {
        let before = self.staged.refresh_tokens.len();
        self.staged.refresh_tokens.retain(|t| t.user_id != user_id);
        Ok((before - self.staged.refresh_tokens.len()) as u64)
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTransaction {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
