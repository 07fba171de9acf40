//! Order commands.

use common::{LineItem, OrderId, PaymentResult, PriceBreakdown, ShippingAddress, UserId};

use super::OrderError;

/// Command to place a new order on behalf of a user.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// The user placing the order.
    pub user_id: UserId,

    /// The lines to reserve, in the order they are reserved.
    pub items: Vec<LineItem>,

    pub shipping_address: ShippingAddress,

    pub payment_method: String,

    /// Price components as computed at checkout.
    pub prices: PriceBreakdown,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command.
    pub fn new(
        user_id: UserId,
        items: Vec<LineItem>,
        shipping_address: ShippingAddress,
        payment_method: impl Into<String>,
        prices: PriceBreakdown,
    ) -> Self {
        Self {
            user_id,
            items,
            shipping_address,
            payment_method: payment_method.into(),
            prices,
        }
    }

    /// Checks everything that can be checked without touching the store.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        for item in &self.items {
            if item.quantity == 0 {
                return Err(OrderError::Validation(format!(
                    "quantity for product {} must be at least 1",
                    item.product_id
                )));
            }
            if item.unit_price.is_negative() {
                return Err(OrderError::Validation(format!(
                    "unit price for product {} must not be negative",
                    item.product_id
                )));
            }
        }

        let prices = &self.prices;
        for (name, amount) in [
            ("items", prices.items),
            ("tax", prices.tax),
            ("shipping", prices.shipping),
            ("total", prices.total),
        ] {
            if amount.is_negative() {
                return Err(OrderError::Validation(format!(
                    "{name} price must not be negative"
                )));
            }
        }

        let address = &self.shipping_address;
        for (name, value) in [
            ("address", &address.address),
            ("city", &address.city),
            ("postal code", &address.postal_code),
            ("country", &address.country),
        ] {
            if value.trim().is_empty() {
                return Err(OrderError::Validation(format!(
                    "shipping {name} is required"
                )));
            }
        }

        if self.payment_method.trim().is_empty() {
            return Err(OrderError::Validation(
                "payment method is required".to_string(),
            ));
        }

        Ok(())
    }
}

/// Command to record a successful payment.
#[derive(Debug, Clone)]
pub struct MarkPaid {
    pub order_id: OrderId,

    /// Payload reported by the payment provider, stored as-is.
    pub payment_result: PaymentResult,
}

impl MarkPaid {
    pub fn new(order_id: OrderId, payment_result: PaymentResult) -> Self {
        Self {
            order_id,
            payment_result,
        }
    }
}
