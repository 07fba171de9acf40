//! Order documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, OrderId, ProductId, UserId};

/// A line of an order.
///
/// Name, image and price are copied from the product when the order is placed
/// so historical orders stay stable when the catalog changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    pub fn new(
        product_id: ProductId,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id,
            name: name.into(),
            image: None,
            quantity,
            unit_price,
        }
    }

    /// Returns the total price for this line (quantity * unit_price).
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Price components computed by the client at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub items: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

/// Opaque payload reported by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub id: String,
    pub status: String,
    pub update_time: String,
    pub email_address: String,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub prices: PriceBreakdown,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_result: Option<PaymentResult>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub is_disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new unpaid, undelivered order stamped with the current time.
    pub fn new(
        user_id: UserId,
        items: Vec<LineItem>,
        shipping_address: ShippingAddress,
        payment_method: impl Into<String>,
        prices: PriceBreakdown,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            items,
            shipping_address,
            payment_method: payment_method.into(),
            prices,
            is_paid: false,
            paid_at: None,
            payment_result: None,
            is_delivered: false,
            delivered_at: None,
            is_disabled: false,
            created_at: Utc::now(),
        }
    }

    /// Total number of units across all lines.
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of the line totals, independent of the client-supplied breakdown.
    pub fn line_total(&self) -> Money {
        self.items.iter().map(LineItem::total_price).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn new_order_defaults_statuses() {
        let order = Order::new(
            UserId::new(),
            vec![LineItem::new(
                ProductId::new(),
                "Widget",
                2,
                Money::from_cents(500),
            )],
            address(),
            "PayPal",
            PriceBreakdown::default(),
        );

        assert!(!order.is_paid);
        assert!(order.paid_at.is_none());
        assert!(order.payment_result.is_none());
        assert!(!order.is_delivered);
        assert!(order.delivered_at.is_none());
        assert!(!order.is_disabled);
    }

    #[test]
    fn totals() {
        let order = Order::new(
            UserId::new(),
            vec![
                LineItem::new(ProductId::new(), "Widget", 2, Money::from_cents(500)),
                LineItem::new(ProductId::new(), "Gadget", 1, Money::from_cents(250)),
            ],
            address(),
            "PayPal",
            PriceBreakdown::default(),
        );

        assert_eq!(order.unit_count(), 3);
        assert_eq!(order.line_total(), Money::from_cents(1250));
    }
}
