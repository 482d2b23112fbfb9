//! Application state shared across handlers.

use std::sync::Arc;

use crate::cache::{CacheStore, ReadThrough};
use crate::db::Store;
use crate::gateway::ZaloPayClient;
use crate::services::{OrderService, PaymentService, ProductService, ReviewService, SalesService};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Every service shares the same store handle
/// and the same cache, so an invalidation by one is seen by all.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<S> {
    store: S,
    orders: OrderService<S>,
    products: ProductService<S>,
    reviews: ReviewService<S>,
    payments: PaymentService<S>,
    sales: SalesService<S>,
}

impl<S: Store> AppState<S> {
    /// Wire the services over one store, cache and gateway client.
    #[must_use]
    pub fn new(store: S, cache: CacheStore, gateway: ZaloPayClient) -> Self {
        let read_through = ReadThrough::new(cache);

        Self {
            inner: Arc::new(AppStateInner {
                orders: OrderService::new(store.clone(), read_through.clone()),
                products: ProductService::new(store.clone(), read_through.clone()),
                reviews: ReviewService::new(store.clone(), read_through.clone()),
                payments: PaymentService::new(store.clone(), read_through, gateway),
                sales: SalesService::new(store.clone()),
                store,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService<S> {
        &self.inner.orders
    }

    #[must_use]
    pub fn products(&self) -> &ProductService<S> {
        &self.inner.products
    }

    #[must_use]
    pub fn reviews(&self) -> &ReviewService<S> {
        &self.inner.reviews
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentService<S> {
        &self.inner.payments
    }

    #[must_use]
    pub fn sales(&self) -> &SalesService<S> {
        &self.inner.sales
    }
}
