//! Catalog routes.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
};
use serde::Serialize;

use fakeshion_core::{NewProduct, Product, ProductId, ProductUpdate};

use super::Success;
use crate::db::{ProductFilter, Store};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::services::ProductListing;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub product: Product,
}

/// GET /api/products?keyword=&category=&page=
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    query: std::result::Result<Query<ProductFilter>, QueryRejection>,
) -> Result<Json<ProductListing>> {
    let Query(filter) = query?;
    Ok(Json(state.products().list(filter).await?))
}

/// GET /api/products/{id}
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductResponse>> {
    let product = state.products().get(id).await?;
    Ok(Json(ProductResponse { product }))
}

/// POST /api/admin/products
pub async fn create<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
    payload: std::result::Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    let Json(input) = payload?;
    let product = state.products().create(input).await?;
    Ok((StatusCode::CREATED, Json(ProductResponse { product })))
}

/// PUT /api/admin/products/{id}
pub async fn update<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    payload: std::result::Result<Json<ProductUpdate>, JsonRejection>,
) -> Result<Json<ProductResponse>> {
    let Json(update) = payload?;
    let product = state.products().update(id, update).await?;
    Ok(Json(ProductResponse { product }))
}

/// DELETE /api/admin/products/{id}
pub async fn destroy<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Success>> {
    state.products().delete(id).await?;
    Ok(Json(Success::OK))
}
