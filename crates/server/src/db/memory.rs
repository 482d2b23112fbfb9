//! Process-local store.
//!
//! Holds every table behind one `tokio` mutex, so each repository call is
//! trivially atomic. Used by the test suites and by `FAKESHION_STORE=memory`
//! for local development; data does not survive a restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use fakeshion_core::{
    NewOrder, NewProduct, Order, OrderId, OrderStatus, PaymentTransaction, Product, ProductId,
    ProductUpdate, Review, ReviewChange, ReviewDraft, ReviewId, StockAdjustment, UserId, Variant,
    VariantId,
};

use super::{
    OrderRepository, PRODUCTS_PER_PAGE, ProductFilter, ProductPage, ProductRepository,
    RepositoryError, SaleRecord, Store, TransactionOutcome, TransitionCommit,
};

/// In-memory implementation of the repositories.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    last_id: i32,
    orders: BTreeMap<OrderId, Order>,
    products: BTreeMap<ProductId, Product>,
    transactions: HashMap<String, PaymentTransaction>,
}

impl Tables {
    const fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn insert_order(&mut self, user: UserId, input: &NewOrder, transaction_id: Option<String>) -> Order {
        let order = Order {
            id: OrderId::new(self.next_id()),
            items: input.items.clone(),
            shipping_info: input.shipping_info.clone(),
            items_price: input.items_price,
            shipping_amount: input.shipping_amount,
            total_amount: input.total_amount,
            payment_method: input.payment_method,
            payment_info: input.payment_info.clone(),
            status: OrderStatus::Processing,
            user,
            transaction_id,
            created_at: Utc::now(),
            delivered_at: None,
        };
        self.orders.insert(order.id, order.clone());
        order
    }

    /// Check that every adjusted variant exists before anything is mutated.
    fn check_adjustments(&self, adjustments: &[StockAdjustment]) -> Result<(), RepositoryError> {
        for adj in adjustments {
            let product = self
                .products
                .get(&adj.product)
                .ok_or_else(|| RepositoryError::NotFound(format!("product {}", adj.product)))?;
            if product.variant(adj.variant).is_none() {
                return Err(RepositoryError::NotFound(format!(
                    "variant {} of product {}",
                    adj.variant, adj.product
                )));
            }
        }
        Ok(())
    }

    fn apply_adjustment(&mut self, adj: StockAdjustment) -> Result<(), RepositoryError> {
        let quantity = i32::try_from(adj.quantity)
            .map_err(|_| RepositoryError::DataCorruption(format!("quantity {} overflows", adj.quantity)))?;
        let product = self
            .products
            .get_mut(&adj.product)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {}", adj.product)))?;
        product.sold_qty += quantity;
        let variant = product.variant_mut(adj.variant).ok_or_else(|| {
            RepositoryError::NotFound(format!("variant {} of product {}", adj.variant, adj.product))
        })?;
        variant.stock -= quantity;
        variant.sold_qty += quantity;
        Ok(())
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite an order's creation time. Used to build sales fixtures.
    pub async fn set_order_created_at(&self, id: OrderId, created_at: DateTime<Utc>) -> bool {
        let mut tables = self.tables.lock().await;
        tables.orders.get_mut(&id).is_some_and(|order| {
            order.created_at = created_at;
            true
        })
    }

    /// Number of recorded gateway transactions.
    pub async fn transaction_count(&self) -> usize {
        self.tables.lock().await.transactions.len()
    }
}

impl OrderRepository for MemoryStore {
    async fn create_order(&self, user: UserId, input: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.insert_order(user, input, None))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn list_orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .rev()
            .filter(|o| o.user == user)
            .cloned()
            .collect())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        Ok(self.tables.lock().await.orders.values().rev().cloned().collect())
    }

    async fn delete_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.tables.lock().await.orders.remove(&id))
    }

    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.lock().await;

        let current = tables
            .orders
            .get(&commit.order)
            .ok_or_else(|| RepositoryError::NotFound(format!("order {}", commit.order)))?
            .status;
        if current != commit.from {
            return Err(RepositoryError::Conflict(format!(
                "order {} is {current}, expected {}",
                commit.order, commit.from
            )));
        }

        tables.check_adjustments(&commit.adjustments)?;
        for adj in &commit.adjustments {
            tables.apply_adjustment(*adj)?;
        }

        let order = tables
            .orders
            .get_mut(&commit.order)
            .ok_or_else(|| RepositoryError::NotFound(format!("order {}", commit.order)))?;
        order.status = commit.to;
        if commit.settle_payment {
            order.payment_info.settle();
        }
        if commit.delivered_at.is_some() {
            order.delivered_at = commit.delivered_at;
        }
        Ok(order.clone())
    }

    async fn record_transaction(
        &self,
        transaction: &PaymentTransaction,
        user: UserId,
        input: &NewOrder,
    ) -> Result<TransactionOutcome, RepositoryError> {
        let mut tables = self.tables.lock().await;

        if let Some(existing) = tables.transactions.get(&transaction.transaction_id) {
            let order = existing.order.and_then(|id| tables.orders.get(&id).cloned());
            return Ok(TransactionOutcome::Existing(order));
        }

        let order = tables.insert_order(user, input, Some(transaction.transaction_id.clone()));
        let mut recorded = transaction.clone();
        recorded.order = Some(order.id);
        tables
            .transactions
            .insert(recorded.transaction_id.clone(), recorded);
        Ok(TransactionOutcome::Created(order))
    }

    async fn sales_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SaleRecord>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| o.created_at >= start && o.created_at <= end)
            .map(|o| SaleRecord {
                created_at: o.created_at,
                total_amount: o.total_amount,
            })
            .collect())
    }

    async fn has_ordered_product(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .any(|o| o.user == user && o.contains_product(product)))
    }
}

impl ProductRepository for MemoryStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn search_products(&self, filter: &ProductFilter) -> Result<ProductPage, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut matching: Vec<&Product> = tables
            .products
            .values()
            .filter(|p| filter.matches(p))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let count = matching.len() as u64;
        let products = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(PRODUCTS_PER_PAGE as usize)
            .cloned()
            .collect();
        Ok(ProductPage {
            res_per_page: PRODUCTS_PER_PAGE,
            filtered_products_count: count,
            products,
        })
    }

    async fn top_rated_products(&self, min_rating: f64, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut rated: Vec<&Product> = tables
            .products
            .values()
            .filter(|p| p.ratings >= min_rating)
            .collect();
        rated.sort_by(|a, b| b.num_of_reviews.cmp(&a.num_of_reviews));
        Ok(rated.into_iter().take(limit as usize).cloned().collect())
    }

    async fn create_product(&self, input: &NewProduct) -> Result<Product, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let id = ProductId::new(tables.next_id());
        let variants = input
            .variants
            .iter()
            .map(|v| Variant {
                id: VariantId::new(tables.next_id()),
                color: v.color.clone(),
                size: v.size.clone(),
                stock: v.stock,
                sold_qty: 0,
            })
            .collect();
        let product = Product {
            id,
            name: input.name.clone(),
            description: input.description.clone(),
            price: input.price,
            category: input.category.clone(),
            variants,
            sold_qty: 0,
            ratings: 0.0,
            num_of_reviews: 0,
            reviews: Vec::new(),
            created_at: Utc::now(),
        };
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.products.get_mut(&id).map(|product| {
            update.apply_to(product);
            product.clone()
        }))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        Ok(self.tables.lock().await.products.remove(&id).is_some())
    }

    async fn list_reviews(&self, product: ProductId) -> Result<Option<Vec<Review>>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.products.get(&product).map(|p| p.reviews.clone()))
    }

    async fn upsert_review(
        &self,
        product: ProductId,
        draft: ReviewDraft,
    ) -> Result<(Product, ReviewChange), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let new_id = ReviewId::new(tables.next_id());
        let entry = tables
            .products
            .get_mut(&product)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {product}")))?;
        let change = entry.apply_review(draft, new_id);
        Ok((entry.clone(), change))
    }

    async fn delete_review(&self, product: ProductId, review: ReviewId) -> Result<Product, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .products
            .get_mut(&product)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {product}")))?;
        if !entry.remove_review(review) {
            return Err(RepositoryError::NotFound(format!("review {review}")));
        }
        Ok(entry.clone())
    }
}

impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
