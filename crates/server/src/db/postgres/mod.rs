//! `PostgreSQL` implementation of the repositories.
//!
//! # Tables
//!
//! - `products` - catalog entries with derived `ratings` / `num_of_reviews`
//! - `product_variants` - per-variant stock and sold counters
//! - `product_reviews` - one row per (product, user, order, variant)
//! - `orders` - line items, shipping and payment info as JSONB
//! - `payment_transactions` - verified gateway callbacks, unique by transaction id
//!
//! Queries are built at runtime with `sqlx::query_as` and mapped through
//! internal `FromRow` types.

mod orders;
mod products;
#[cfg(test)]
mod store_tests;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use fakeshion_core::{
    Order, OrderId, OrderItem, OrderStatus, PaymentInfo, PaymentMethod, Product, ProductId,
    Rating, Review, ReviewId, ShippingInfo, UserId, Variant, VariantId,
};

use super::{RepositoryError, Store};

/// Repositories backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// Internal Row Types
// =============================================================================

const ORDER_COLUMNS: &str = "id, user_id, items, shipping_info, items_price, shipping_amount, \
     total_amount, payment_method, payment_info, status, transaction_id, created_at, delivered_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    items: Json<Vec<OrderItem>>,
    shipping_info: Json<ShippingInfo>,
    items_price: Decimal,
    shipping_amount: Decimal,
    total_amount: Decimal,
    payment_method: String,
    payment_info: Json<PaymentInfo>,
    status: String,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<OrderStatus>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
        })?;
        let payment_method = row.payment_method.parse::<PaymentMethod>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            items: row.items.0,
            shipping_info: row.shipping_info.0,
            items_price: row.items_price,
            shipping_amount: row.shipping_amount,
            total_amount: row.total_amount,
            payment_method,
            payment_info: row.payment_info.0,
            status,
            user: UserId::new(row.user_id),
            transaction_id: row.transaction_id,
            created_at: row.created_at,
            delivered_at: row.delivered_at,
        })
    }
}

fn orders_from_rows(rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, category, sold_qty, ratings, num_of_reviews, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: Decimal,
    category: String,
    sold_qty: i32,
    ratings: f64,
    num_of_reviews: i32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i32,
    product_id: i32,
    color: Option<String>,
    size: Option<String>,
    stock: i32,
    sold_qty: i32,
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: VariantId::new(row.id),
            color: row.color,
            size: row.size,
            stock: row.stock,
            sold_qty: row.sold_qty,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    product_id: i32,
    user_id: i32,
    order_id: i32,
    variant_id: i32,
    rating: i16,
    comment: String,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(i64::from(row.rating)).map_err(|e| {
            RepositoryError::DataCorruption(format!("review {}: {e}", row.id))
        })?;
        Ok(Self {
            id: ReviewId::new(row.id),
            user: UserId::new(row.user_id),
            order: OrderId::new(row.order_id),
            variant: VariantId::new(row.variant_id),
            rating,
            comment: row.comment,
        })
    }
}

/// Attach variants and reviews to product rows, preserving row order.
async fn hydrate_products(
    conn: &mut PgConnection,
    rows: Vec<ProductRow>,
) -> Result<Vec<Product>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

    let variant_rows = sqlx::query_as::<_, VariantRow>(
        r"
        SELECT id, product_id, color, size, stock, sold_qty
        FROM product_variants
        WHERE product_id = ANY($1)
        ORDER BY id
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let review_rows = sqlx::query_as::<_, ReviewRow>(
        r"
        SELECT id, product_id, user_id, order_id, variant_id, rating, comment
        FROM product_reviews
        WHERE product_id = ANY($1)
        ORDER BY id
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut variants: HashMap<i32, Vec<Variant>> = HashMap::new();
    for row in variant_rows {
        variants.entry(row.product_id).or_default().push(row.into());
    }
    let mut reviews: HashMap<i32, Vec<Review>> = HashMap::new();
    for row in review_rows {
        let product_id = row.product_id;
        reviews.entry(product_id).or_default().push(row.try_into()?);
    }

    Ok(rows
        .into_iter()
        .map(|row| Product {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            category: row.category,
            variants: variants.remove(&row.id).unwrap_or_default(),
            sold_qty: row.sold_qty,
            ratings: row.ratings,
            num_of_reviews: row.num_of_reviews,
            reviews: reviews.remove(&row.id).unwrap_or_default(),
            created_at: row.created_at,
        })
        .collect())
}

/// Load one fully hydrated product.
async fn fetch_product(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id.as_i32())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    Ok(hydrate_products(conn, vec![row]).await?.pop())
}

/// Escape `LIKE` metacharacters in user input.
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("shirt"), "%shirt%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_order_row_with_unknown_status_is_corruption() {
        let row = OrderRow {
            id: 1,
            user_id: 1,
            items: Json(vec![]),
            shipping_info: Json(ShippingInfo::default()),
            items_price: Decimal::ZERO,
            shipping_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            payment_method: "COD".to_string(),
            payment_info: Json(PaymentInfo::default()),
            status: "Cancelled".to_string(),
            transaction_id: None,
            created_at: Utc::now(),
            delivered_at: None,
        };
        let result: Result<Order, _> = row.try_into();
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }
}
