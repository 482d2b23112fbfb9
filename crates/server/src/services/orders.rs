//! Order lifecycle: creation, cached reads and status transitions.
//!
//! Status changes follow `Processing -> Shipped -> Delivered`. Delivering an
//! order decrements stock and bumps sold counters for every line, and settles
//! cash-on-delivery payments. The status change and all of its side effects
//! are committed as one unit, guarded by the status read at the start of the
//! request, so two concurrent deliveries cannot both apply.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use fakeshion_core::{
    InvalidOrder, NewOrder, Order, OrderId, OrderStatus, PaymentInfo, PaymentMethod,
    StockAdjustment, TransitionError, UserId,
};

use crate::cache::{CacheKey, Invalidation, PRODUCT_LIST_PREFIX, ReadThrough};
use crate::db::{RepositoryError, Store, TransitionCommit};

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Invalid(#[from] InvalidOrder),

    /// Another request changed the order first.
    #[error("order was modified concurrently: {0}")]
    Conflict(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for OrderError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => Self::NotFound(what),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Repository(other),
        }
    }
}

/// A user's (or every) order, with a count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderList {
    pub orders_count: usize,
    pub orders: Vec<Order>,
}

impl From<Vec<Order>> for OrderList {
    fn from(orders: Vec<Order>) -> Self {
        Self {
            orders_count: orders.len(),
            orders,
        }
    }
}

/// Cache entries made stale by any change to `order`.
pub(crate) fn order_invalidation(id: OrderId, owner: UserId) -> Invalidation {
    Invalidation::new()
        .key(CacheKey::OrderDetail(id))
        .key(CacheKey::UserOrders(owner))
        .key(CacheKey::AllOrders)
}

/// Cache entries made stale by a new order for `owner`.
pub(crate) fn new_order_invalidation(owner: UserId) -> Invalidation {
    Invalidation::new()
        .key(CacheKey::UserOrders(owner))
        .key(CacheKey::AllOrders)
}

/// Order operations over a store and the shared cache.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    cache: ReadThrough,
}

impl<S: Store> OrderService<S> {
    #[must_use]
    pub const fn new(store: S, cache: ReadThrough) -> Self {
        Self { store, cache }
    }

    /// Place an order for `user`.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for malformed input or a prepaid payment method,
    /// `Repository` if the insert fails.
    #[instrument(skip(self, input), fields(user = %user))]
    pub async fn create(&self, user: UserId, mut input: NewOrder) -> Result<Order, OrderError> {
        input.validate()?;
        if input.payment_method == PaymentMethod::ZaloPay {
            return Err(InvalidOrder::RequiresGateway(input.payment_method).into());
        }
        // Settlement only ever comes from delivery or a verified callback.
        input.payment_info = PaymentInfo::default();
        let order = self.store.create_order(user, &input).await?;

        self.cache.invalidate(&new_order_invalidation(user)).await;
        info!(order = %order.id, method = %order.payment_method, "Order created");
        Ok(order)
    }

    /// Fetch one order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such order exists.
    pub async fn get(&self, id: OrderId) -> Result<Order, OrderError> {
        self.cache
            .get_or_load(&CacheKey::OrderDetail(id), || self.store.get_order(id))
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {id}")))
    }

    /// Orders placed by `user`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the store query fails.
    pub async fn list_for_user(&self, user: UserId) -> Result<OrderList, OrderError> {
        let orders = self
            .cache
            .get_or_load_value(&CacheKey::UserOrders(user), || {
                self.store.list_orders_for_user(user)
            })
            .await?;
        Ok(orders.into())
    }

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the store query fails.
    pub async fn list_all(&self) -> Result<OrderList, OrderError> {
        let orders = self
            .cache
            .get_or_load_value(&CacheKey::AllOrders, || self.store.list_orders())
            .await?;
        Ok(orders.into())
    }

    /// Move an order to `requested`, applying delivery side effects.
    ///
    /// Reads the current order from the store, not the cache, so the
    /// transition is validated against the latest committed state.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the order, or a product/variant it references, is missing
    /// - `Transition` if the state machine forbids the change
    /// - `Conflict` if the order changed between read and commit
    #[instrument(skip(self), fields(order = %id, to = %requested))]
    pub async fn update_status(&self, id: OrderId, requested: OrderStatus) -> Result<Order, OrderError> {
        let order = self
            .store
            .get_order(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;

        order.status.check_transition(requested)?;

        let delivering = requested == OrderStatus::Delivered;
        let adjustments = if delivering {
            let adjustments = order.stock_adjustments()?;
            self.check_variants(&adjustments).await?;
            adjustments
        } else {
            Vec::new()
        };

        let commit = TransitionCommit {
            order: id,
            from: order.status,
            to: requested,
            settle_payment: delivering && order.payment_method == PaymentMethod::CashOnDelivery,
            delivered_at: delivering.then(Utc::now),
            adjustments,
        };
        let updated = self.store.commit_transition(&commit).await?;

        let mut invalidation = order_invalidation(id, order.user);
        if delivering {
            for adj in &commit.adjustments {
                invalidation = invalidation.key(CacheKey::ProductDetail(adj.product));
            }
            invalidation = invalidation.key(CacheKey::TopRated).prefix(PRODUCT_LIST_PREFIX);
        }
        self.cache.invalidate(&invalidation).await;

        info!(from = %order.status, to = %updated.status, "Order status updated");
        Ok(updated)
    }

    /// Remove an order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such order exists.
    #[instrument(skip(self), fields(order = %id))]
    pub async fn delete(&self, id: OrderId) -> Result<(), OrderError> {
        let deleted = self
            .store
            .delete_order(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {id}")))?;

        self.cache.invalidate(&order_invalidation(id, deleted.user)).await;
        info!("Order deleted");
        Ok(())
    }

    /// Fail with `NotFound` before committing if any line points at a
    /// product or variant that does not exist.
    async fn check_variants(&self, adjustments: &[StockAdjustment]) -> Result<(), OrderError> {
        for adj in adjustments {
            let product = self
                .store
                .get_product(adj.product)
                .await?
                .ok_or_else(|| OrderError::NotFound(format!("product {}", adj.product)))?;
            if product.variant(adj.variant).is_none() {
                return Err(OrderError::NotFound(format!(
                    "variant {} of product {}",
                    adj.variant, adj.product
                )));
            }
        }
        Ok(())
    }
}
