//! Order placement and the guarded order mutations.

mod commands;
mod service;

pub use commands::{MarkPaid, PlaceOrder};
pub use service::OrderService;

use common::{OrderId, ProductId};
use store::StoreError;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::inventory::InventoryError;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order has no line items.
    #[error("Order has no items")]
    EmptyOrder,

    /// The request is malformed.
    #[error("Invalid order: {0}")]
    Validation(String),

    /// A line item could not be reserved. Nothing was written.
    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
    },

    /// Order not found.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// Any other inventory failure.
    #[error(transparent)]
    Inventory(InventoryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::EmptyOrder | OrderError::Validation(_) => ErrorKind::Validation,
            OrderError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            OrderError::NotFound(_) => ErrorKind::NotFound,
            OrderError::Inventory(e) => e.kind(),
            OrderError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<InventoryError> for OrderError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::InsufficientStock {
                product_id,
                requested,
            } => OrderError::InsufficientStock {
                product_id,
                requested,
            },
            InventoryError::InvalidQuantity { product_id } => OrderError::Validation(format!(
                "quantity for product {product_id} must be at least 1"
            )),
            InventoryError::Store(e) => OrderError::Store(e),
            other => OrderError::Inventory(other),
        }
    }
}
