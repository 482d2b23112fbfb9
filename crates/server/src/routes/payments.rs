//! Payment gateway routes.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::warn;

use fakeshion_core::NewOrder;

use crate::db::Store;
use crate::error::Result;
use crate::gateway::{CallbackRequest, CallbackResponse, CreateOrderResponse};
use crate::middleware::RequireUser;
use crate::state::AppState;

/// POST /api/payments/zalopay
///
/// Returns the gateway's create-order response, including `order_url`.
pub async fn initiate<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(me): RequireUser,
    payload: std::result::Result<Json<NewOrder>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>> {
    let Json(input) = payload?;
    Ok(Json(state.payments().initiate(me.user, input).await?))
}

/// POST /api/payments/zalopay/callback
///
/// Always answered with 200; the outcome is in `return_code`.
pub async fn callback<S: Store>(
    State(state): State<AppState<S>>,
    payload: std::result::Result<Json<CallbackRequest>, JsonRejection>,
) -> Json<CallbackResponse> {
    let callback = match payload {
        Ok(Json(callback)) => callback,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Unreadable payment callback");
            return Json(CallbackResponse::rejected("malformed callback"));
        }
    };
    Json(state.payments().handle_callback(&callback).await)
}
