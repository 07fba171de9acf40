//! Order service providing the order-placement workflow and order queries.

use chrono::Utc;
use common::{Order, OrderId, UserId};
use futures_util::FutureExt;
use store::{Store, Transaction, TransactionCoordinator, run_transaction};

use super::{MarkPaid, OrderError, PlaceOrder};
use crate::inventory::InventoryLedger;

/// Service for placing and managing orders.
pub struct OrderService<S> {
    store: S,
}

impl<S> OrderService<S>
where
    S: Store + TransactionCoordinator,
{
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order.
    ///
    /// Every line is reserved, in the order given, in the same transaction
    /// that persists the order. The first line that cannot be reserved aborts
    /// the transaction, so either the order and all of its stock decrements
    /// become visible or none of them do.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id, items = cmd.items.len()))]
    pub async fn create_order(&self, cmd: PlaceOrder) -> Result<Order, OrderError> {
        if let Err(e) = cmd.validate() {
            metrics::counter!("order_placement_failures_total", "reason" => e.kind().as_str())
                .increment(1);
            return Err(e);
        }

        let PlaceOrder {
            user_id,
            items,
            shipping_address,
            payment_method,
            prices,
        } = cmd;
        let order = Order::new(user_id, items, shipping_address, payment_method, prices);

        let result = run_transaction(&self.store, move |tx| {
            async move {
                let mut ledger = InventoryLedger::new(&mut *tx);
                for item in &order.items {
                    ledger.reserve(item.product_id, item.quantity).await?;
                }
                tx.insert_order(&order).await?;
                Ok::<_, OrderError>(order)
            }
            .boxed()
        })
        .await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                metrics::counter!("order_units_total").increment(order.unit_count());
                tracing::info!(
                    order_id = %order.id,
                    units = order.unit_count(),
                    line_total = %order.line_total(),
                    "order placed"
                );
            }
            Err(e) => {
                metrics::counter!("order_placement_failures_total", "reason" => e.kind().as_str())
                    .increment(1);
                tracing::warn!(error = %e, "order placement aborted");
            }
        }
        result
    }

    /// Loads an order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))
    }

    /// Lists a user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders_for_user(user_id).await?)
    }

    /// Lists every order, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_all_orders(&self) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_all_orders().await?)
    }

    /// Marks an order paid, storing the provider's payload.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn mark_paid(&self, cmd: MarkPaid) -> Result<Order, OrderError> {
        let order = self
            .store
            .mark_order_paid(cmd.order_id, Utc::now(), &cmd.payment_result)
            .await?
            .ok_or(OrderError::NotFound(cmd.order_id))?;

        tracing::info!("order paid");
        Ok(order)
    }

    /// Marks an order delivered.
    #[tracing::instrument(skip(self))]
    pub async fn mark_delivered(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let order = self
            .store
            .mark_order_delivered(order_id, Utc::now())
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        tracing::info!("order delivered");
        Ok(order)
    }
}
