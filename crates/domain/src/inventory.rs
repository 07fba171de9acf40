//! Inventory ledger: stock and sales counters, mutated only through
//! conditional updates inside a transaction.

use common::ProductId;
use store::{StoreError, Transaction};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur while adjusting inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The product has less stock than requested, or does not exist.
    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
    },

    /// Quantities must be at least one.
    #[error("Invalid quantity for product {product_id}: must be greater than 0")]
    InvalidQuantity { product_id: ProductId },

    /// The product has fewer recorded sales than the quantity to release.
    #[error("Nothing to release for product {product_id}: quantity {quantity}")]
    NothingToRelease { product_id: ProductId, quantity: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl InventoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            InventoryError::InvalidQuantity { .. } => ErrorKind::Validation,
            InventoryError::NothingToRelease { .. } => ErrorKind::InternalConsistency,
            InventoryError::Store(_) => ErrorKind::Internal,
        }
    }
}

/// Reserves and releases stock within an open transaction.
///
/// The ledger never reads a count and writes it back; each adjustment is one
/// conditional update, so concurrent reservations cannot drive stock negative.
pub struct InventoryLedger<'t, T: Transaction> {
    tx: &'t mut T,
}

impl<'t, T: Transaction> InventoryLedger<'t, T> {
    pub fn new(tx: &'t mut T) -> Self {
        Self { tx }
    }

    /// Takes `quantity` units out of stock and counts them as sold.
    ///
    /// On error the enclosing transaction must be aborted.
    pub async fn reserve(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity { product_id });
        }

        if !self.tx.reserve_stock(product_id, quantity).await? {
            tracing::debug!(%product_id, quantity, "stock reservation refused");
            return Err(InventoryError::InsufficientStock {
                product_id,
                requested: quantity,
            });
        }

        metrics::counter!("stock_reservations_total").increment(1);
        Ok(())
    }

    /// Puts `quantity` previously reserved units back into stock.
    pub async fn release(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity { product_id });
        }

        if !self.tx.release_stock(product_id, quantity).await? {
            return Err(InventoryError::NothingToRelease {
                product_id,
                quantity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, Product};
    use store::{InMemoryStore, Store, TransactionCoordinator};

    use super::*;

    async fn store_with_product(stock: u32) -> (InMemoryStore, ProductId) {
        let store = InMemoryStore::new();
        let product = Product::new("Widget", Money::from_cents(500), stock);
        store.save_product(&product).await.unwrap();
        (store, product.id)
    }

    #[tokio::test]
    async fn reserve_within_stock() {
        let (store, product_id) = store_with_product(5).await;

        let mut tx = store.begin().await.unwrap();
        InventoryLedger::new(&mut tx)
            .reserve(product_id, 5)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let product = store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.count_in_stock, 0);
        assert_eq!(product.total_sales, 5);
    }

    #[tokio::test]
    async fn reserve_beyond_stock_fails() {
        let (store, product_id) = store_with_product(2).await;

        let mut tx = store.begin().await.unwrap();
        let err = InventoryLedger::new(&mut tx)
            .reserve(product_id, 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InsufficientStock { requested: 3, .. }
        ));
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }

    #[tokio::test]
    async fn unknown_product_is_insufficient_stock() {
        let (store, _) = store_with_product(2).await;

        let mut tx = store.begin().await.unwrap();
        let err = InventoryLedger::new(&mut tx)
            .reserve(ProductId::new(), 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let (store, product_id) = store_with_product(2).await;

        let mut tx = store.begin().await.unwrap();
        let mut ledger = InventoryLedger::new(&mut tx);
        assert_eq!(
            ledger.reserve(product_id, 0).await.unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ledger.release(product_id, 0).await.unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[tokio::test]
    async fn release_reverses_reserve() {
        let (store, product_id) = store_with_product(4).await;

        let mut tx = store.begin().await.unwrap();
        let mut ledger = InventoryLedger::new(&mut tx);
        ledger.reserve(product_id, 3).await.unwrap();
        ledger.release(product_id, 3).await.unwrap();
        assert!(matches!(
            ledger.release(product_id, 1).await,
            Err(InventoryError::NothingToRelease { quantity: 1, .. })
        ));
        tx.commit().await.unwrap();

        let product = store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.count_in_stock, 4);
        assert_eq!(product.total_sales, 0);
    }
}
