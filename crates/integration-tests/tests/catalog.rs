//! Products, reviews and read-through cache coherence.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::{Value, json};

use fakeshion_core::Product;
use fakeshion_integration_tests::{As, TestApp, order_body};

fn review(product: &Product, order: &Value, rating: i64, comment: &str) -> Value {
    json!({
        "productId": product.id,
        "orderID": order["_id"],
        "selectedVariant": { "variantID": product.variants[0].id },
        "rating": rating,
        "comment": comment,
    })
}

async fn delivered_order(app: &TestApp, user: i32, product: &Product) -> Value {
    let (_, body) = app
        .post("/api/orders", As::User(user), order_body(product, 1, "COD"))
        .await;
    let order = body["order"].clone();
    let uri = format!("/api/admin/orders/{}", order["_id"]);
    app.put(&uri, As::Admin(1), json!({ "status": "Shipped" })).await;
    app.put(&uri, As::Admin(1), json!({ "status": "Delivered" })).await;
    order
}

#[tokio::test]
async fn test_product_update_is_visible_through_cache() {
    let app = TestApp::new();
    let product = app.seed_product("Linen shirt", 10).await;
    let uri = format!("/api/products/{}", product.id);

    let (_, body) = app.get(&uri, As::Anonymous).await;
    assert_eq!(body["product"]["name"], "Linen shirt");
    let (_, body) = app.get("/api/products?keyword=linen", As::Anonymous).await;
    assert_eq!(body["filteredProductsCount"], 1);

    let (status, _) = app
        .put(
            &format!("/api/admin/products/{}", product.id),
            As::Admin(1),
            json!({ "name": "Cotton shirt" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&uri, As::Anonymous).await;
    assert_eq!(body["product"]["name"], "Cotton shirt");
    let (_, body) = app.get("/api/products?keyword=linen", As::Anonymous).await;
    assert_eq!(body["filteredProductsCount"], 0);
    let (_, body) = app.get("/api/products?keyword=cotton", As::Anonymous).await;
    assert_eq!(body["filteredProductsCount"], 1);
}

#[tokio::test]
async fn test_product_admin_routes() {
    let app = TestApp::new();
    let input = json!({
        "name": "Wool coat",
        "description": "Warm",
        "price": "1200",
        "category": "Coats",
        "variants": [{ "color": "grey", "size": "L", "stock": 3 }],
    });

    let (status, _) = app.post("/api/admin/products", As::User(7), input.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post("/api/admin/products", As::Admin(1), input).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["product"]["_id"].clone();

    let (_, body) = app.get("/api/products", As::Anonymous).await;
    assert_eq!(body["filteredProductsCount"], 1);
    assert!(body["topRatedProducts"].is_array());

    let (status, _) = app.delete(&format!("/api/admin/products/{id}"), As::Admin(1)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/products/{id}"), As::Anonymous).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.get("/api/products", As::Anonymous).await;
    assert_eq!(body["filteredProductsCount"], 0);
}

#[tokio::test]
async fn test_reviews_update_rating_and_listing() {
    let app = TestApp::new();
    let product = app.seed_product("Linen shirt", 10).await;
    let first = delivered_order(&app, 7, &product).await;
    let second = delivered_order(&app, 8, &product).await;
    let uri = format!("/api/products/{}", product.id);
    let reviews_uri = format!("/api/reviews?id={}", product.id);

    // Warm both cached reads.
    app.get(&uri, As::Anonymous).await;
    let (_, body) = app.get(&reviews_uri, As::Anonymous).await;
    assert_eq!(body["reviews"].as_array().unwrap().len(), 0);

    let (status, _) = app
        .put("/api/reviews", As::User(7), review(&product, &first, 5, "Lovely"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .put("/api/reviews", As::User(8), review(&product, &second, 2, "Shrank"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&uri, As::Anonymous).await;
    assert_eq!(body["product"]["numOfReviews"], 2);
    assert_eq!(body["product"]["ratings"], 3.5);

    // Same author, order and variant edits in place.
    app.put("/api/reviews", As::User(8), review(&product, &second, 4, "Fine after all"))
        .await;
    let (_, body) = app.get(&uri, As::Anonymous).await;
    assert_eq!(body["product"]["numOfReviews"], 2);
    assert_eq!(body["product"]["ratings"], 4.5);

    let (_, body) = app.get(&reviews_uri, As::Anonymous).await;
    let reviews = body["reviews"].as_array().unwrap();
    assert_eq!(reviews.len(), 2);
    let edited = reviews.iter().find(|r| r["user"] == 8).unwrap();

    let delete_uri = format!(
        "/api/admin/reviews?productId={}&id={}",
        product.id, edited["_id"]
    );
    let (status, _) = app.delete(&delete_uri, As::Admin(1)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&uri, As::Anonymous).await;
    assert_eq!(body["product"]["numOfReviews"], 1);
    assert_eq!(body["product"]["ratings"], 5.0);
}

#[tokio::test]
async fn test_review_checks() {
    let app = TestApp::new();
    let product = app.seed_product("Linen shirt", 10).await;
    let order = delivered_order(&app, 7, &product).await;

    let (status, _) = app
        .put("/api/reviews", As::User(7), review(&product, &order, 6, "Too good"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put("/api/reviews", As::User(8), review(&product, &order, 5, "Not mine"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .put("/api/reviews", As::Anonymous, review(&product, &order, 5, "Who"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_can_review_requires_a_purchase() {
    let app = TestApp::new();
    let product = app.seed_product("Linen shirt", 10).await;
    let uri = format!("/api/can_review?productId={}", product.id);

    let (_, body) = app.get(&uri, As::User(7)).await;
    assert_eq!(body["canReview"], false);

    delivered_order(&app, 7, &product).await;

    let (status, body) = app.get(&uri, As::User(7)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["canReview"], true);
    let (_, body) = app.get(&uri, As::User(8)).await;
    assert_eq!(body["canReview"], false);
}
