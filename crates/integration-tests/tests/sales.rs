//! Admin sales series.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use chrono::{Days, Utc};

use fakeshion_integration_tests::{As, TestApp, order_body};

#[tokio::test]
async fn test_sales_series_fills_empty_days() {
    let app = TestApp::new();
    let product = app.seed_product("Linen shirt", 10).await;
    app.post("/api/orders", As::User(7), order_body(&product, 2, "COD")).await;
    app.post("/api/orders", As::User(8), order_body(&product, 1, "COD")).await;

    let today = Utc::now().date_naive();
    let start = today.checked_sub_days(Days::new(2)).unwrap();
    let uri = format!("/api/admin/get_sales?startDate={start}&endDate={today}");

    let (status, body) = app.get(&uri, As::Admin(1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalOrders"], 2);
    assert_eq!(body["totalSales"], "300");

    let series = body["series"].as_array().unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(series[0]["date"], start.to_string());
    assert_eq!(series[0]["orders"], 0);
    assert_eq!(series[0]["sales"], "0");
    assert_eq!(series[2]["date"], today.to_string());
    assert_eq!(series[2]["orders"], 2);
    assert_eq!(series[2]["sales"], "300");
}

#[tokio::test]
async fn test_sales_rejects_bad_ranges() {
    let app = TestApp::new();

    let (status, _) = app
        .get("/api/admin/get_sales?startDate=2024-01-05&endDate=2024-01-01", As::Admin(1))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get("/api/admin/get_sales?startDate=yesterday&endDate=2024-01-01", As::Admin(1))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get("/api/admin/get_sales?startDate=2024-01-01&endDate=2024-01-05", As::User(7))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sales_at_the_last_representable_date() {
    let app = TestApp::new();

    let (status, body) = app
        .get(
            "/api/admin/get_sales?startDate=%2B262142-12-31&endDate=%2B262142-12-31",
            As::Admin(1),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["series"].as_array().unwrap().len(), 1);
    assert_eq!(body["totalOrders"], 0);
}
