//! HTTP route handlers for the API server.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                           - Liveness
//! GET    /health/ready                     - Readiness (store reachable)
//!
//! # Orders
//! POST   /api/orders                       - Place order (user)
//! GET    /api/me/orders                    - My orders (user)
//! GET    /api/orders/{id}                  - Order detail (owner or admin)
//! GET    /api/admin/orders                 - All orders (admin)
//! PUT    /api/admin/orders/{id}            - Update status (admin)
//! DELETE /api/admin/orders/{id}            - Delete order (admin)
//! GET    /api/admin/get_sales              - Daily sales series (admin)
//!
//! # Products
//! GET    /api/products                     - List/filter products
//! GET    /api/products/{id}                - Product detail
//! POST   /api/admin/products               - Create product (admin)
//! PUT    /api/admin/products/{id}          - Update product (admin)
//! DELETE /api/admin/products/{id}          - Delete product (admin)
//!
//! # Reviews
//! PUT    /api/reviews                      - Create/update review (user)
//! GET    /api/reviews?id=                  - Product reviews
//! DELETE /api/admin/reviews?productId=&id= - Delete review (admin)
//! GET    /api/can_review?productId=        - Review eligibility (user)
//!
//! # Payments
//! POST   /api/payments/zalopay             - Start gateway payment (user)
//! POST   /api/payments/zalopay/callback    - Gateway callback
//! ```

pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::db::Store;
use crate::state::AppState;

/// Body of write endpoints that return nothing else.
#[derive(Debug, Serialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub const OK: Self = Self { success: true };
}

/// Create the order and sales routes router.
pub fn order_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/orders", post(orders::create::<S>))
        .route("/orders/{id}", get(orders::show::<S>))
        .route("/me/orders", get(orders::mine::<S>))
        .route("/admin/orders", get(orders::index::<S>))
        .route(
            "/admin/orders/{id}",
            put(orders::update_status::<S>).delete(orders::destroy::<S>),
        )
        .route("/admin/get_sales", get(orders::sales::<S>))
}

/// Create the product routes router.
pub fn product_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/products", get(products::index::<S>))
        .route("/products/{id}", get(products::show::<S>))
        .route("/admin/products", post(products::create::<S>))
        .route(
            "/admin/products/{id}",
            put(products::update::<S>).delete(products::destroy::<S>),
        )
}

/// Create the review routes router.
pub fn review_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route(
            "/reviews",
            get(reviews::index::<S>).put(reviews::upsert::<S>),
        )
        .route("/admin/reviews", axum::routing::delete(reviews::destroy::<S>))
        .route("/can_review", get(reviews::can_review::<S>))
}

/// Create the payment routes router.
pub fn payment_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/payments/zalopay", post(payments::initiate::<S>))
        .route("/payments/zalopay/callback", post(payments::callback::<S>))
}

/// Create the full application router.
pub fn router<S: Store>(state: AppState<S>) -> Router {
    let api = Router::new()
        .merge(order_routes())
        .merge(product_routes())
        .merge(review_routes())
        .merge(payment_routes());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S>))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness<S: Store>(State(state): State<AppState<S>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
