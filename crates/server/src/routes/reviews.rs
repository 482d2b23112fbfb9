//! Review routes.

use axum::{
    Json,
    extract::{Query, State, rejection::{JsonRejection, QueryRejection}},
};
use serde::{Deserialize, Serialize};

use fakeshion_core::{ProductId, Review, ReviewId};

use super::Success;
use crate::db::Store;
use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireUser};
use crate::services::ReviewInput;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReviewsQuery {
    /// Product whose reviews to list.
    pub id: ProductId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReviewQuery {
    pub product_id: ProductId,
    pub id: ReviewId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanReviewQuery {
    pub product_id: ProductId,
}

#[derive(Debug, Serialize)]
pub struct ReviewsResponse {
    pub reviews: Vec<Review>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanReviewResponse {
    pub can_review: bool,
}

/// PUT /api/reviews
pub async fn upsert<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(me): RequireUser,
    payload: std::result::Result<Json<ReviewInput>, JsonRejection>,
) -> Result<Json<Success>> {
    let Json(input) = payload?;
    state.reviews().upsert(me.user, input).await?;
    Ok(Json(Success::OK))
}

/// GET /api/reviews?id=
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    query: std::result::Result<Query<ReviewsQuery>, QueryRejection>,
) -> Result<Json<ReviewsResponse>> {
    let Query(q) = query?;
    let reviews = state.reviews().list(q.id).await?;
    Ok(Json(ReviewsResponse { reviews }))
}

/// DELETE /api/admin/reviews?productId=&id=
pub async fn destroy<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
    query: std::result::Result<Query<DeleteReviewQuery>, QueryRejection>,
) -> Result<Json<Success>> {
    let Query(q) = query?;
    state.reviews().delete(q.product_id, q.id).await?;
    Ok(Json(Success::OK))
}

/// GET /api/can_review?productId=
pub async fn can_review<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(me): RequireUser,
    query: std::result::Result<Query<CanReviewQuery>, QueryRejection>,
) -> Result<Json<CanReviewResponse>> {
    let Query(q) = query?;
    let can_review = state.reviews().can_review(me.user, q.product_id).await?;
    Ok(Json(CanReviewResponse { can_review }))
}
