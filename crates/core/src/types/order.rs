//! Orders and their line items.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId, VariantId};

/// The variant a customer picked for a line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedVariant {
    #[serde(rename = "variantID")]
    pub variant_id: VariantId,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

/// A single order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product: ProductId,
    pub name: String,
    pub selected_variant: SelectedVariant,
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
}

/// Where and to whom an order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub address: String,
    pub phone_no: String,
    #[serde(default)]
    pub shipping_province: Option<String>,
    #[serde(default)]
    pub shipping_city: Option<String>,
    #[serde(default)]
    pub shipping_ward: Option<String>,
    #[serde(default)]
    pub shipping_vender: Option<String>,
    /// Gateway transaction reference, set for prepaid orders.
    #[serde(default, rename = "orderID")]
    pub order_ref: Option<String>,
}

/// Payment state plus gateway metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub status: PaymentStatus,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl PaymentInfo {
    /// Payment info for an order settled by the gateway.
    #[must_use]
    pub fn settled_by(provider: &str, transaction_id: &str) -> Self {
        Self {
            status: PaymentStatus::Paid,
            provider: Some(provider.to_owned()),
            transaction_id: Some(transaction_id.to_owned()),
        }
    }

    /// Mark the payment as settled, keeping any gateway metadata.
    pub const fn settle(&mut self) {
        self.status = PaymentStatus::Paid;
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: OrderId,
    #[serde(rename = "orderItems")]
    pub items: Vec<OrderItem>,
    pub shipping_info: ShippingInfo,
    pub items_price: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_info: PaymentInfo,
    #[serde(rename = "orderStatus")]
    pub status: OrderStatus,
    pub user: UserId,
    /// Gateway transaction that materialized this order, if any.
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Inventory changes delivering this order implies.
    ///
    /// Lines that share a `(product, variant)` pair are merged so each
    /// variant is adjusted once.
    #[must_use]
    ///
    /// # Errors
    ///
    /// Returns [`InvalidOrder::QuantityTooLarge`] if a merged quantity
    /// exceeds what stock counters can hold.
    pub fn stock_adjustments(&self) -> Result<Vec<StockAdjustment>, InvalidOrder> {
        let mut merged: BTreeMap<(ProductId, VariantId), u32> = BTreeMap::new();
        for item in &self.items {
            let total = merged
                .entry((item.product, item.selected_variant.variant_id))
                .or_default();
            *total = total
                .checked_add(item.quantity)
                .filter(|q| i32::try_from(*q).is_ok())
                .ok_or(InvalidOrder::QuantityTooLarge(item.product))?;
        }
        Ok(merged
            .into_iter()
            .map(|((product, variant), quantity)| StockAdjustment {
                product,
                variant,
                quantity,
            })
            .collect())
    }

    /// Whether any line references the given product.
    #[must_use]
    pub fn contains_product(&self, product: ProductId) -> bool {
        self.items.iter().any(|item| item.product == product)
    }
}

/// Decrement stock and bump sold counters for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product: ProductId,
    pub variant: VariantId,
    pub quantity: u32,
}

/// Input for creating an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    #[serde(rename = "orderItems")]
    pub items: Vec<OrderItem>,
    pub shipping_info: ShippingInfo,
    pub items_price: Decimal,
    pub shipping_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_info: PaymentInfo,
}

/// Largest quantity a single order line may carry.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// Reasons a [`NewOrder`] is rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidOrder {
    #[error("order must contain at least one item")]
    Empty,
    #[error("quantity for product {0} must be positive")]
    ZeroQuantity(ProductId),
    #[error("quantity for product {0} exceeds the limit of {MAX_LINE_QUANTITY}")]
    QuantityTooLarge(ProductId),
    #[error("order amounts cannot be negative")]
    NegativeAmount,
    #[error("{0} orders must be placed through the payment gateway")]
    RequiresGateway(PaymentMethod),
}

impl NewOrder {
    /// Check the structural invariants of the order input.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidOrder`] describing the first violation found.
    pub fn validate(&self) -> Result<(), InvalidOrder> {
        if self.items.is_empty() {
            return Err(InvalidOrder::Empty);
        }
        if let Some(item) = self.items.iter().find(|item| item.quantity == 0) {
            return Err(InvalidOrder::ZeroQuantity(item.product));
        }
        if let Some(item) = self.items.iter().find(|item| item.quantity > MAX_LINE_QUANTITY) {
            return Err(InvalidOrder::QuantityTooLarge(item.product));
        }
        let amounts = [self.items_price, self.shipping_amount, self.total_amount];
        if amounts.iter().any(Decimal::is_sign_negative) {
            return Err(InvalidOrder::NegativeAmount);
        }
        Ok(())
    }
}
