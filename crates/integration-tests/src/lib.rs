//! Integration tests for the Fakeshion API.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fakeshion-integration-tests
//! ```
//!
//! Every test drives the full axum router in-process with
//! `tower::ServiceExt::oneshot`, backed by a fresh `MemoryStore` and cache.
//! No database or network is needed; the payment gateway is only ever
//! called back, never called.
//!
//! # Test Categories
//!
//! - `orders` - order lifecycle, status transitions, inventory effects
//! - `payments` - callback verification and idempotent reconciliation
//! - `catalog` - products, reviews and cache coherence
//! - `sales` - admin sales series

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use fakeshion_core::{NewProduct, NewVariant, Product, UserId};
use fakeshion_server::cache::CacheStore;
use fakeshion_server::config::{CacheConfig, ZaloPayConfig};
use fakeshion_server::db::{MemoryStore, ProductRepository};
use fakeshion_server::gateway::{ZaloPayClient, sign};
use fakeshion_server::middleware::{ROLE_HEADER, USER_HEADER};
use fakeshion_server::{AppState, router};

/// Key the test gateway signs outbound requests with.
pub const KEY1: &str = "PcY4iZIKFCIdgZvA6ueMcMHHUbRLYjPL";

/// Key the test gateway signs callbacks with.
pub const KEY2: &str = "kLtgPl8HHhfvMuDHPwKfgfsY4Ydm9eIz";

/// Who a request is sent as.
#[derive(Debug, Clone, Copy)]
pub enum As {
    Anonymous,
    User(i32),
    Admin(i32),
}

/// An in-process server over a fresh in-memory store.
pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
}

#[must_use]
pub fn zalopay_config() -> ZaloPayConfig {
    ZaloPayConfig {
        app_id: "2553".to_string(),
        key1: SecretString::from(KEY1),
        key2: SecretString::from(KEY2),
        endpoint: Url::parse("http://127.0.0.1:9/v2/create").unwrap(),
        callback_url: Url::parse("http://localhost:4000/api/payments/zalopay/callback").unwrap(),
        redirect_url: Url::parse("http://localhost:3000/me/orders").unwrap(),
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let gateway = ZaloPayClient::new(zalopay_config()).unwrap();
        let state = AppState::new(
            store.clone(),
            CacheStore::open(&CacheConfig::default()),
            gateway,
        );
        Self {
            router: router(state),
            store,
        }
    }

    /// Send a request and return the status and JSON body (`Null` if empty).
    pub async fn send(&self, method: Method, uri: &str, who: As, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        match who {
            As::Anonymous => {}
            As::User(id) => builder = builder.header(USER_HEADER, id.to_string()),
            As::Admin(id) => {
                builder = builder
                    .header(USER_HEADER, id.to_string())
                    .header(ROLE_HEADER, "admin");
            }
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, who: As) -> (StatusCode, Value) {
        self.send(Method::GET, uri, who, None).await
    }

    pub async fn post(&self, uri: &str, who: As, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, who, Some(body)).await
    }

    pub async fn put(&self, uri: &str, who: As, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, who, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, who: As) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, who, None).await
    }

    /// Insert a one-variant product directly into the store.
    pub async fn seed_product(&self, name: &str, stock: i32) -> Product {
        self.store
            .create_product(&NewProduct {
                name: name.to_string(),
                description: String::new(),
                price: Decimal::new(100, 0),
                category: "Shirts".to_string(),
                variants: vec![NewVariant {
                    color: Some("white".to_string()),
                    size: Some("M".to_string()),
                    stock,
                }],
            })
            .await
            .unwrap()
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Order request body for `quantity` of the product's first variant.
#[must_use]
pub fn order_body(product: &Product, quantity: u32, method: &str) -> Value {
    let variant = product.variants.first().unwrap();
    let total = product.price * Decimal::from(quantity);
    json!({
        "orderItems": [{
            "product": product.id,
            "name": product.name,
            "selectedVariant": { "variantID": variant.id, "size": variant.size },
            "quantity": quantity,
            "price": product.price.to_string(),
        }],
        "shippingInfo": { "address": "1 Le Loi, District 1", "phoneNo": "0900000000" },
        "itemsPrice": total.to_string(),
        "shippingAmount": "0",
        "totalAmount": total.to_string(),
        "paymentMethod": method,
    })
}

/// A gateway callback for `order` as paid by `user`, signed with `key`.
#[must_use]
pub fn signed_callback(app_trans_id: &str, user: UserId, order: &Value, key: &str) -> Value {
    let mut payload = order.clone();
    payload["user"] = json!(user);
    let data = json!({
        "app_id": 2553,
        "app_trans_id": app_trans_id,
        "app_time": 1_704_085_200_000_i64,
        "app_user": format!("{user} - FakeshionShop"),
        "amount": 100,
        "embed_data": "{}",
        "item": serde_json::to_string(&[payload]).unwrap(),
        "zp_trans_id": 240_101_000_000_001_i64,
    })
    .to_string();
    let mac = sign(&data, &SecretString::from(key)).unwrap();
    json!({ "data": data, "mac": mac })
}
