//! Business operations over the store, the cache and the payment gateway.
//!
//! Each service owns a store handle and the shared [`ReadThrough`] cache.
//! Reads go through the cache; writes commit to the store first and then
//! invalidate whatever they made stale.
//!
//! [`ReadThrough`]: crate::cache::ReadThrough

pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod sales;

pub use orders::{OrderError, OrderList, OrderService};
pub use payments::{PaymentError, PaymentService, ReconcileError, Reconciled};
pub use products::{ProductError, ProductListing, ProductService};
pub use reviews::{ReviewError, ReviewInput, ReviewOutcome, ReviewService};
pub use sales::{DailySales, SalesError, SalesQuery, SalesReport, SalesService, aggregate};
