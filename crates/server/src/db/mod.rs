//! Persistence for orders, products, reviews and payment transactions.
//!
//! # Stores
//!
//! - [`PgStore`] - `PostgreSQL` via `sqlx`, the system of record in production
//! - [`MemoryStore`] - process-local store for tests and local development
//!
//! Both implement [`OrderRepository`] and [`ProductRepository`]. Every
//! multi-row write is a single atomic unit at the store layer:
//!
//! - [`OrderRepository::commit_transition`] - status, stock and payment
//!   together, guarded by the status the caller last read
//! - [`OrderRepository::record_transaction`] - transaction id claim and order
//!   insert together, guarded by a uniqueness constraint
//! - [`ProductRepository::upsert_review`] / [`ProductRepository::delete_review`]
//!   - review change and rating recompute together
//!
//! # Migrations
//!
//! Migrations live in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p fakeshion-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use fakeshion_core::{
    NewOrder, NewProduct, Order, OrderId, OrderStatus, PaymentTransaction, Product, ProductId,
    ProductUpdate, Review, ReviewChange, ReviewDraft, ReviewId, StockAdjustment, UserId,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Products per page in filtered listings.
pub const PRODUCTS_PER_PAGE: u32 = 8;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A concurrent write got there first, or a constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// A validated status change ready to be written.
///
/// The store applies it only if the order is still in `from`; otherwise it
/// fails with [`RepositoryError::Conflict`] and writes nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCommit {
    pub order: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Stock decrements and sold-quantity increments, empty unless delivering.
    pub adjustments: Vec<StockAdjustment>,
    /// Mark the payment as settled in the same write.
    pub settle_payment: bool,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Result of materializing an order for a gateway transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// This call created the order.
    Created(Order),
    /// The transaction had already been recorded; no order was created.
    Existing(Option<Order>),
}

/// Keyword/category search over the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

impl ProductFilter {
    /// Drop blank values so equivalent filters share a cache key.
    #[must_use]
    pub fn normalized(self) -> Self {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
        };
        Self {
            keyword: clean(self.keyword),
            category: clean(self.category),
            page: self.page.filter(|p| *p > 1),
        }
    }

    /// 1-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Rows to skip for the requested page.
    #[must_use]
    pub fn offset(&self) -> u32 {
        (self.page() - 1).saturating_mul(PRODUCTS_PER_PAGE)
    }

    /// No keyword or category: the homepage listing.
    #[must_use]
    pub const fn is_unfiltered(&self) -> bool {
        self.keyword.is_none() && self.category.is_none()
    }

    /// Stable string form used as the list cache key suffix.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!(
            "keyword={}&category={}&page={}",
            self.keyword.as_deref().unwrap_or_default(),
            self.category.as_deref().unwrap_or_default(),
            self.page()
        )
    }

    /// Whether a product satisfies the keyword and category predicates.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        let keyword_ok = self.keyword.as_ref().is_none_or(|k| {
            product.name.to_lowercase().contains(&k.to_lowercase())
        });
        let category_ok = self
            .category
            .as_ref()
            .is_none_or(|c| product.category.eq_ignore_ascii_case(c));
        keyword_ok && category_ok
    }
}

/// One page of a filtered product listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub res_per_page: u32,
    pub filtered_products_count: u64,
    pub products: Vec<Product>,
}

/// The fields of an order the sales report needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleRecord {
    pub created_at: DateTime<Utc>,
    pub total_amount: Decimal,
}

/// Order persistence.
pub trait OrderRepository: Send + Sync {
    /// Insert a new order owned by `user`, in `Processing`.
    fn create_order(
        &self,
        user: UserId,
        input: &NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    fn get_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// A user's orders, newest first.
    fn list_orders_for_user(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Every order, newest first.
    fn list_orders(&self) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Delete an order, returning it if it existed.
    fn delete_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Apply a status change and its inventory/payment effects atomically.
    ///
    /// Fails with `Conflict` if the order is no longer in `commit.from`, and
    /// with `NotFound` if the order or any adjusted variant is missing. On
    /// failure nothing is written.
    fn commit_transition(
        &self,
        commit: &TransitionCommit,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    /// Record a verified gateway transaction and create its order.
    ///
    /// The claim on `transaction.transaction_id` and the order insert are
    /// one atomic unit; a second call for the same id creates nothing.
    fn record_transaction(
        &self,
        transaction: &PaymentTransaction,
        user: UserId,
        input: &NewOrder,
    ) -> impl Future<Output = Result<TransactionOutcome, RepositoryError>> + Send;

    /// Orders created in `[start, end]`.
    fn sales_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<SaleRecord>, RepositoryError>> + Send;

    /// Whether `user` has any order containing `product`.
    fn has_ordered_product(
        &self,
        user: UserId,
        product: ProductId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Catalog and review persistence.
pub trait ProductRepository: Send + Sync {
    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// One page of products matching `filter`, newest first.
    fn search_products(
        &self,
        filter: &ProductFilter,
    ) -> impl Future<Output = Result<ProductPage, RepositoryError>> + Send;

    /// Products rated at least `min_rating`, most reviewed first.
    fn top_rated_products(
        &self,
        min_rating: f64,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    fn create_product(
        &self,
        input: &NewProduct,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// Update descriptive fields. `None` if the product does not exist.
    fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Returns `false` if the product did not exist.
    fn delete_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    fn list_reviews(
        &self,
        product: ProductId,
    ) -> impl Future<Output = Result<Option<Vec<Review>>, RepositoryError>> + Send;

    /// Create or replace the review for the draft's (user, order, variant)
    /// and recompute the product's rating from the resulting set.
    fn upsert_review(
        &self,
        product: ProductId,
        draft: ReviewDraft,
    ) -> impl Future<Output = Result<(Product, ReviewChange), RepositoryError>> + Send;

    /// Remove a review and recompute the product's rating.
    fn delete_review(
        &self,
        product: ProductId,
        review: ReviewId,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;
}

/// Everything the services need from a store.
pub trait Store: OrderRepository + ProductRepository + Clone + 'static {
    /// Cheap liveness probe used by the readiness endpoint.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
