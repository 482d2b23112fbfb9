//! Liveness and readiness probes.

use axum::http::StatusCode;

use fakeshion_integration_tests::{As, TestApp};

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    assert_eq!(app.get("/health", As::Anonymous).await.0, StatusCode::OK);
    assert_eq!(app.get("/health/ready", As::Anonymous).await.0, StatusCode::OK);
    assert_eq!(app.get("/nope", As::Anonymous).await.0, StatusCode::NOT_FOUND);
}
