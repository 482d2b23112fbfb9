//! Order and sales routes.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use fakeshion_core::{NewOrder, Order, OrderId, OrderStatus};

use super::Success;
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::services::{OrderList, SalesQuery, SalesReport};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub order: Order,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            success: true,
            order,
        }
    }
}

/// Body of the admin status update.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

/// POST /api/orders
pub async fn create<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(me): RequireUser,
    payload: std::result::Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    let Json(input) = payload?;
    let order = state.orders().create(me.user, input).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /api/orders/{id}
///
/// Visible to the order's owner and to admins.
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(me): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>> {
    let order = state.orders().get(id).await?;
    if order.user != me.user && !me.is_admin() {
        return Err(AppError::NotFound(format!("order {id}")));
    }
    Ok(Json(order.into()))
}

/// GET /api/me/orders
pub async fn mine<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(me): RequireUser,
) -> Result<Json<OrderList>> {
    Ok(Json(state.orders().list_for_user(me.user).await?))
}

/// GET /api/admin/orders
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<OrderList>> {
    Ok(Json(state.orders().list_all().await?))
}

/// PUT /api/admin/orders/{id}
pub async fn update_status<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<OrderId>,
    payload: std::result::Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<OrderResponse>> {
    let Json(update) = payload?;
    let order = state.orders().update_status(id, update.status).await?;
    Ok(Json(order.into()))
}

/// DELETE /api/admin/orders/{id}
pub async fn destroy<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<Success>> {
    state.orders().delete(id).await?;
    Ok(Json(Success::OK))
}

/// GET /api/admin/get_sales?startDate=YYYY-MM-DD&endDate=YYYY-MM-DD
pub async fn sales<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
    query: std::result::Result<Query<SalesQuery>, QueryRejection>,
) -> Result<Json<SalesReport>> {
    let Query(range) = query?;
    Ok(Json(state.sales().report(range).await?))
}
