//! Product reviews.
//!
//! A user may review a variant once per order that contains the product;
//! reviewing the same (order, variant) again replaces the earlier review.
//! The product's rating is recomputed from the final review set in the same
//! store write as the review change.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use fakeshion_core::{
    OrderId, Product, ProductId, Rating, RatingError, Review, ReviewChange, ReviewDraft, ReviewId,
    SelectedVariant, UserId,
};

use crate::cache::{CacheKey, Invalidation, PRODUCT_LIST_PREFIX, ReadThrough};
use crate::db::{RepositoryError, Store};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Rating(#[from] RatingError),

    /// The reviewer did not buy the product in the named order.
    #[error("order {order} does not contain product {product} for this user")]
    NotPurchased { order: OrderId, product: ProductId },

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ReviewError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => Self::NotFound(what),
            other => Self::Repository(other),
        }
    }
}

/// Body of a create/update review request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub product_id: ProductId,
    #[serde(rename = "orderID")]
    pub order_id: OrderId,
    pub selected_variant: SelectedVariant,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

/// Result of a review upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub product: Product,
    pub change: ReviewChange,
}

fn review_invalidation(product: ProductId) -> Invalidation {
    Invalidation::new()
        .key(CacheKey::ProductDetail(product))
        .key(CacheKey::ProductReviews(product))
        .key(CacheKey::TopRated)
        .prefix(PRODUCT_LIST_PREFIX)
}

#[derive(Clone)]
pub struct ReviewService<S> {
    store: S,
    cache: ReadThrough,
}

impl<S: Store> ReviewService<S> {
    #[must_use]
    pub const fn new(store: S, cache: ReadThrough) -> Self {
        Self { store, cache }
    }

    /// Create or replace `user`'s review of a variant bought in an order.
    ///
    /// # Errors
    ///
    /// - `Rating` if the rating is outside `1..=5`
    /// - `NotFound` if the product, variant or order does not exist
    /// - `NotPurchased` if the order is not the user's or lacks the product
    #[instrument(skip(self, input), fields(user = %user, product = %input.product_id))]
    pub async fn upsert(&self, user: UserId, input: ReviewInput) -> Result<ReviewOutcome, ReviewError> {
        let rating = Rating::new(input.rating)?;
        let product_id = input.product_id;
        let variant = input.selected_variant.variant_id;

        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| ReviewError::NotFound(format!("product {product_id}")))?;
        if product.variant(variant).is_none() {
            return Err(ReviewError::NotFound(format!(
                "variant {variant} of product {product_id}"
            )));
        }

        let order = self
            .store
            .get_order(input.order_id)
            .await?
            .ok_or_else(|| ReviewError::NotFound(format!("order {}", input.order_id)))?;
        if order.user != user || !order.contains_product(product_id) {
            return Err(ReviewError::NotPurchased {
                order: order.id,
                product: product_id,
            });
        }

        let draft = ReviewDraft {
            user,
            order: order.id,
            variant,
            rating,
            comment: input.comment,
        };
        let (product, change) = self.store.upsert_review(product_id, draft).await?;

        self.cache.invalidate(&review_invalidation(product_id)).await;
        info!(?change, ratings = product.ratings, "Review saved");
        Ok(ReviewOutcome { product, change })
    }

    /// Reviews of a product.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such product exists.
    pub async fn list(&self, product: ProductId) -> Result<Vec<Review>, ReviewError> {
        self.cache
            .get_or_load(&CacheKey::ProductReviews(product), || {
                self.store.list_reviews(product)
            })
            .await?
            .ok_or_else(|| ReviewError::NotFound(format!("product {product}")))
    }

    /// Remove a review and recompute the product's rating.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product or review does not exist.
    #[instrument(skip(self), fields(product = %product, review = %review))]
    pub async fn delete(&self, product: ProductId, review: ReviewId) -> Result<Product, ReviewError> {
        let updated = self.store.delete_review(product, review).await?;

        self.cache.invalidate(&review_invalidation(product)).await;
        info!(ratings = updated.ratings, "Review deleted");
        Ok(updated)
    }

    /// Whether `user` has an order containing `product`.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the store query fails.
    pub async fn can_review(&self, user: UserId, product: ProductId) -> Result<bool, ReviewError> {
        Ok(self.store.has_ordered_product(user, product).await?)
    }
}
