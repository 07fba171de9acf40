use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Cart, CartId, CartItem, Comment, CommentId, LineItem, Money, Order, OrderId, PaymentResult,
    PriceBreakdown, Product, ProductId, RefreshToken, RefreshTokenId, Reply, ReplyId,
    ShippingAddress, User, UserId,
};
use sqlx::{PgConnection, PgPool, Postgres, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{Store, Transaction, TransactionCoordinator},
};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, avatar_url, is_admin, is_disabled, created_at";

const ORDER_COLUMNS: &str = "id, user_id, items, shipping_address, payment_method, \
     items_price_cents, tax_price_cents, shipping_price_cents, total_price_cents, \
     is_paid, paid_at, payment_result, is_delivered, delivered_at, is_disabled, created_at";

const PRODUCT_COLUMNS: &str =
    "id, name, price_cents, count_in_stock, total_sales, is_disabled, created_at";

const COMMENT_COLUMNS: &str =
    "id, user_id, product_id, content, rating, is_disabled, created_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a failed write, turning unique violations into [`StoreError::UniqueViolation`].
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return StoreError::UniqueViolation {
            constraint: db_err.constraint().unwrap_or_default().to_string(),
        };
    }
    StoreError::Database(err)
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::DataCorruption(format!("{column} out of range: {value}")))
}

fn row_to_user(row: &PgRow) -> Result<User> {
    Ok(User {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        avatar_url: row.try_get("avatar_url")?,
        is_admin: row.try_get("is_admin")?,
        is_disabled: row.try_get("is_disabled")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_cart(row: &PgRow) -> Result<Cart> {
    Ok(Cart {
        id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        items: row.try_get::<Json<Vec<CartItem>>, _>("items")?.0,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        count_in_stock: to_u32(row.try_get("count_in_stock")?, "count_in_stock")?,
        total_sales: to_u32(row.try_get("total_sales")?, "total_sales")?,
        is_disabled: row.try_get("is_disabled")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        items: row.try_get::<Json<Vec<LineItem>>, _>("items")?.0,
        shipping_address: row.try_get::<Json<ShippingAddress>, _>("shipping_address")?.0,
        payment_method: row.try_get("payment_method")?,
        prices: PriceBreakdown {
            items: Money::from_cents(row.try_get("items_price_cents")?),
            tax: Money::from_cents(row.try_get("tax_price_cents")?),
            shipping: Money::from_cents(row.try_get("shipping_price_cents")?),
            total: Money::from_cents(row.try_get("total_price_cents")?),
        },
        is_paid: row.try_get("is_paid")?,
        paid_at: row.try_get("paid_at")?,
        payment_result: row
            .try_get::<Option<Json<PaymentResult>>, _>("payment_result")?
            .map(|json| json.0),
        is_delivered: row.try_get("is_delivered")?,
        delivered_at: row.try_get("delivered_at")?,
        is_disabled: row.try_get("is_disabled")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_refresh_token(row: &PgRow) -> Result<RefreshToken> {
    Ok(RefreshToken {
        id: RefreshTokenId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        token_value: row.try_get("token_value")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_reply(row: &PgRow) -> Result<Reply> {
    Ok(Reply {
        id: ReplyId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        content: row.try_get("content")?,
        is_disabled: row.try_get("is_disabled")?,
    })
}

fn row_to_comment(row: &PgRow, replies: Vec<Reply>) -> Result<Comment> {
    let rating: i16 = row.try_get("rating")?;
    Ok(Comment {
        id: CommentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        content: row.try_get("content")?,
        rating: u8::try_from(rating)
            .map_err(|_| StoreError::DataCorruption(format!("rating out of range: {rating}")))?,
        is_disabled: row.try_get("is_disabled")?,
        replies,
        created_at: row.try_get("created_at")?,
    })
}

// Queries shared by pooled reads and open transactions.

async fn fetch_user(conn: &mut PgConnection, id: UserId) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_user).transpose()
}

async fn fetch_product(conn: &mut PgConnection, id: ProductId) -> Result<Option<Product>> {
    let row = sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(row_to_product).transpose()
}

async fn fetch_replies(conn: &mut PgConnection, comment_id: Uuid) -> Result<Vec<Reply>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, product_id, content, is_disabled
        FROM comment_replies
        WHERE comment_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(comment_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(row_to_reply).collect()
}

async fn fetch_comment(conn: &mut PgConnection, id: CommentId) -> Result<Option<Comment>> {
    let row = sqlx::query(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let replies = fetch_replies(conn, id.as_uuid()).await?;
            Ok(Some(row_to_comment(&row, replies)?))
        }
        None => Ok(None),
    }
}

async fn upsert_comment(conn: &mut PgConnection, comment: &Comment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO comments (id, user_id, product_id, content, rating, is_disabled, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE SET
            content = EXCLUDED.content,
            rating = EXCLUDED.rating,
            is_disabled = EXCLUDED.is_disabled
        "#,
    )
    .bind(comment.id.as_uuid())
    .bind(comment.user_id.as_uuid())
    .bind(comment.product_id.as_uuid())
    .bind(&comment.content)
    .bind(i16::from(comment.rating))
    .bind(comment.is_disabled)
    .bind(comment.created_at)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM comment_replies WHERE comment_id = $1")
        .bind(comment.id.as_uuid())
        .execute(&mut *conn)
        .await?;

    for (position, reply) in comment.replies.iter().enumerate() {
        let position = i32::try_from(position).map_err(|_| {
            StoreError::DataCorruption(format!("too many replies on comment {}", comment.id))
        })?;
        sqlx::query(
            r#"
            INSERT INTO comment_replies (id, comment_id, position, user_id, product_id, content, is_disabled)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(reply.id.as_uuid())
        .bind(comment.id.as_uuid())
        .bind(position)
        .bind(reply.user_id.as_uuid())
        .bind(reply.product_id.as_uuid())
        .bind(&reply.content)
        .bind(reply.is_disabled)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        fetch_user(&mut conn, id).await
    }

    async fn find_active_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND NOT is_disabled"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_active_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE name = $1 AND NOT is_disabled LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_cart_for_user(&self, user_id: UserId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT id, user_id, items, created_at FROM carts WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_cart).transpose()
    }

    async fn get_refresh_tokens_for_user(&self, user_id: UserId) -> Result<Vec<RefreshToken>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, token_value, created_at
            FROM refresh_tokens
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_refresh_token).collect()
    }

    async fn has_active_order_for_user(&self, user_id: UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM orders WHERE user_id = $1 AND NOT is_disabled)",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn mark_order_paid(
        &self,
        id: OrderId,
        paid_at: DateTime<Utc>,
        result: &PaymentResult,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET is_paid = TRUE, paid_at = $2, payment_result = $3
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(paid_at)
        .bind(Json(result))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn mark_order_delivered(
        &self,
        id: OrderId,
        delivered_at: DateTime<Utc>,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET is_delivered = TRUE, delivered_at = $2
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(delivered_at)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, count_in_stock, total_sales, is_disabled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                count_in_stock = EXCLUDED.count_in_stock,
                total_sales = EXCLUDED.total_sales,
                is_disabled = EXCLUDED.is_disabled
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.count_in_stock))
        .bind(i64::from(product.total_sales))
        .bind(product.is_disabled)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>> {
        let mut conn = self.pool.acquire().await?;
        fetch_comment(&mut conn, id).await
    }

    async fn save_comment(&self, comment: &Comment) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_comment(&mut tx, comment).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// A transaction over a [`PostgresStore`].
///
/// Dropping it without calling [`commit`](Transaction::commit) rolls back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl TransactionCoordinator for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn reserve_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET count_in_stock = count_in_stock - $2, total_sales = total_sales + $2
            WHERE id = $1 AND count_in_stock >= $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET count_in_stock = count_in_stock + $2, total_sales = total_sales - $2
            WHERE id = $1 AND total_sales >= $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, items, shipping_address, payment_method,
                items_price_cents, tax_price_cents, shipping_price_cents, total_price_cents,
                is_paid, paid_at, payment_result, is_delivered, delivered_at, is_disabled, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(Json(&order.items))
        .bind(Json(&order.shipping_address))
        .bind(&order.payment_method)
        .bind(order.prices.items.cents())
        .bind(order.prices.tax.cents())
        .bind(order.prices.shipping.cents())
        .bind(order.prices.total.cents())
        .bind(order.is_paid)
        .bind(order.paid_at)
        .bind(order.payment_result.as_ref().map(Json))
        .bind(order.is_delivered)
        .bind(order.delivered_at)
        .bind(order.is_disabled)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.avatar_url)
        .bind(user.is_admin)
        .bind(user.is_disabled)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn insert_cart(&mut self, cart: &Cart) -> Result<()> {
        sqlx::query("INSERT INTO carts (id, user_id, items, created_at) VALUES ($1, $2, $3, $4)")
            .bind(cart.id.as_uuid())
            .bind(cart.user_id.as_uuid())
            .bind(Json(&cart.items))
            .bind(cart.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_error)?;

        Ok(())
    }

    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> Result<()> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_value, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(token.id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(&token.token_value)
        .bind(token.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_user(&mut self, id: UserId) -> Result<Option<User>> {
        fetch_user(&mut self.tx, id).await
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        fetch_product(&mut self.tx, id).await
    }

    async fn set_user_disabled(&mut self, id: UserId, disabled: bool) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET is_disabled = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(disabled)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_write_error)?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn delete_user(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn delete_cart_for_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        let row =
            sqlx::query("DELETE FROM carts WHERE user_id = $1 RETURNING id, user_id, items, created_at")
                .bind(user_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?;
        row.as_ref().map(row_to_cart).transpose()
    }

    async fn delete_comments_by_user(&mut self, user_id: UserId) -> Result<u64> {
        // Replies under the user's own comments go with them through the cascade.
        let comments = sqlx::query("DELETE FROM comments WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        let replies = sqlx::query("DELETE FROM comment_replies WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        Ok(comments + replies)
    }

    async fn disable_comments_by_user(&mut self, user_id: UserId) -> Result<u64> {
        let comments = sqlx::query(
            "UPDATE comments SET is_disabled = TRUE WHERE user_id = $1 AND NOT is_disabled",
        )
        .bind(user_id.as_uuid())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        let replies = sqlx::query(
            "UPDATE comment_replies SET is_disabled = TRUE WHERE user_id = $1 AND NOT is_disabled",
        )
        .bind(user_id.as_uuid())
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(comments + replies)
    }

    async fn disabled_comments_involving(&mut self, user_id: UserId) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments c
            WHERE (c.user_id = $1 AND c.is_disabled)
               OR EXISTS (
                   SELECT 1 FROM comment_replies r
                   WHERE r.comment_id = c.id AND r.user_id = $1 AND r.is_disabled
               )
            ORDER BY c.created_at ASC
            "#
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: Uuid = row.try_get("id")?;
            let replies = fetch_replies(&mut self.tx, id).await?;
            comments.push(row_to_comment(row, replies)?);
        }
        Ok(comments)
    }

    async fn save_comment(&mut self, comment: &Comment) -> Result<()> {
        upsert_comment(&mut self.tx, comment).await
    }

    async fn delete_refresh_tokens_for_user(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
