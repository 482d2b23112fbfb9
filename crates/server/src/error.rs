//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`;
//! bodies are JSON `{ "success": false, "message": ... }`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{OrderError, PaymentError, ProductError, ReviewError, SalesError};

/// Application-level error type for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Sales(#[from] SalesError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Database operation failed outside a service.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No caller identity on the request.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is known but lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Order(err) => match err {
                OrderError::NotFound(_) => StatusCode::NOT_FOUND,
                OrderError::Transition(_) | OrderError::Invalid(_) => StatusCode::BAD_REQUEST,
                OrderError::Conflict(_) => StatusCode::CONFLICT,
                OrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Product(err) => match err {
                ProductError::NotFound(_) => StatusCode::NOT_FOUND,
                ProductError::Invalid(_) => StatusCode::BAD_REQUEST,
                ProductError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Review(err) => match err {
                ReviewError::NotFound(_) => StatusCode::NOT_FOUND,
                ReviewError::Rating(_) => StatusCode::BAD_REQUEST,
                ReviewError::NotPurchased { .. } => StatusCode::FORBIDDEN,
                ReviewError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Sales(err) => match err {
                SalesError::InvalidRange { .. } | SalesError::RangeTooLong(_) => {
                    StatusCode::BAD_REQUEST
                }
                SalesError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Payment(err) => match err {
                PaymentError::Invalid(_) => StatusCode::BAD_REQUEST,
                PaymentError::Gateway(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::BAD_GATEWAY => "Payment gateway error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
