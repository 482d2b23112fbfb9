//! Products, variants and reviews.
//!
//! The rating of a product is always derived from its review set:
//! every mutation goes through [`Product::apply_review`] or
//! [`Product::remove_review`], both of which recompute it from the final
//! list of reviews.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{OrderId, ProductId, ReviewId, UserId, VariantId};

/// A purchasable configuration of a product carrying its own stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    #[serde(rename = "_id")]
    pub id: VariantId,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub stock: i32,
    #[serde(rename = "sellQty")]
    pub sold_qty: i32,
}

/// Error for out-of-range review ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rating must be between {min} and {max}, got {value}", min = Rating::MIN, max = Rating::MAX)]
pub struct RatingError {
    pub value: i64,
}

/// A review score between [`Rating::MIN`] and [`Rating::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Create a rating, rejecting values outside `1..=5`.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError`] if the value is out of range.
    pub fn new(value: i64) -> Result<Self, RatingError> {
        u8::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(RatingError { value })
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = RatingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// A customer review of a product variant bought in a specific order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: ReviewId,
    pub user: UserId,
    pub order: OrderId,
    pub variant: VariantId,
    pub rating: Rating,
    pub comment: String,
}

impl Review {
    /// Whether this review is the one a draft would replace.
    #[must_use]
    pub fn same_author_slot(&self, draft: &ReviewDraft) -> bool {
        self.user == draft.user && self.order == draft.order && self.variant == draft.variant
    }
}

/// Review input before it is attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub user: UserId,
    pub order: OrderId,
    pub variant: VariantId,
    pub rating: Rating,
    pub comment: String,
}

/// What [`Product::apply_review`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewChange {
    Created(ReviewId),
    Updated(ReviewId),
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub variants: Vec<Variant>,
    #[serde(rename = "sellQty")]
    pub sold_qty: i32,
    pub ratings: f64,
    pub num_of_reviews: i32,
    pub reviews: Vec<Review>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Find a variant by id.
    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// Find a variant by id, mutably.
    pub fn variant_mut(&mut self, id: VariantId) -> Option<&mut Variant> {
        self.variants.iter_mut().find(|v| v.id == id)
    }

    /// Insert or replace the review for the draft's (user, order, variant).
    ///
    /// `new_id` is used only when no matching review exists.
    pub fn apply_review(&mut self, draft: ReviewDraft, new_id: ReviewId) -> ReviewChange {
        let change = if let Some(existing) = self
            .reviews
            .iter_mut()
            .find(|r| r.same_author_slot(&draft))
        {
            existing.rating = draft.rating;
            existing.comment = draft.comment;
            ReviewChange::Updated(existing.id)
        } else {
            self.reviews.push(Review {
                id: new_id,
                user: draft.user,
                order: draft.order,
                variant: draft.variant,
                rating: draft.rating,
                comment: draft.comment,
            });
            ReviewChange::Created(new_id)
        };
        self.refresh_rating();
        change
    }

    /// Remove a review. Returns `false` if no review had that id.
    pub fn remove_review(&mut self, id: ReviewId) -> bool {
        let before = self.reviews.len();
        self.reviews.retain(|r| r.id != id);
        let removed = self.reviews.len() != before;
        self.refresh_rating();
        removed
    }

    /// Recompute the derived rating fields from the current review list.
    pub fn refresh_rating(&mut self) {
        self.ratings = average_rating(&self.reviews);
        self.num_of_reviews = i32::try_from(self.reviews.len()).unwrap_or(i32::MAX);
    }
}

/// Mean rating of a review set; 0 when there are no reviews.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: u32 = reviews.iter().map(|r| u32::from(r.rating.value())).sum();
    f64::from(sum) / reviews.len() as f64
}

/// Variant input for product creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVariant {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub stock: i32,
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub variants: Vec<NewVariant>,
}

/// Partial update of a product's descriptive fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
}

impl ProductUpdate {
    /// Apply the present fields to a product.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            product.description.clone_from(description);
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(category) = &self.category {
            product.category.clone_from(category);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId::new(1),
            name: "Linen shirt".to_string(),
            description: String::new(),
            price: Decimal::new(150_000, 0),
            category: "Shirts".to_string(),
            variants: vec![Variant {
                id: VariantId::new(10),
                color: Some("white".to_string()),
                size: Some("M".to_string()),
                stock: 5,
                sold_qty: 0,
            }],
            sold_qty: 0,
            ratings: 0.0,
            num_of_reviews: 0,
            reviews: vec![],
            created_at: Utc::now(),
        }
    }

    fn draft(user: i32, order: i32, rating: i64) -> ReviewDraft {
        ReviewDraft {
            user: UserId::new(user),
            order: OrderId::new(order),
            variant: VariantId::new(10),
            rating: Rating::new(rating).unwrap(),
            comment: "ok".to_string(),
        }
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert!(Rating::new(-3).is_err());
        assert_eq!(Rating::new(5).unwrap().value(), 5);
        assert!(serde_json::from_str::<Rating>("9").is_err());
    }

    #[test]
    fn test_apply_review_creates_then_updates_same_slot() {
        let mut p = product();
        let first = p.apply_review(draft(1, 1, 4), ReviewId::new(100));
        assert_eq!(first, ReviewChange::Created(ReviewId::new(100)));

        let second = p.apply_review(draft(1, 1, 2), ReviewId::new(101));
        assert_eq!(second, ReviewChange::Updated(ReviewId::new(100)));
        assert_eq!(p.reviews.len(), 1);
        assert!((p.ratings - 2.0).abs() < f64::EPSILON);
        assert_eq!(p.num_of_reviews, 1);
    }

    #[test]
    fn test_rating_is_mean_after_every_mutation() {
        let mut p = product();
        p.apply_review(draft(1, 1, 5), ReviewId::new(1));
        p.apply_review(draft(2, 2, 2), ReviewId::new(2));
        assert!((p.ratings - 3.5).abs() < f64::EPSILON);

        // A different order is a different slot.
        p.apply_review(draft(1, 3, 2), ReviewId::new(3));
        assert!((p.ratings - 3.0).abs() < f64::EPSILON);

        assert!(p.remove_review(ReviewId::new(1)));
        assert!((p.ratings - 2.0).abs() < f64::EPSILON);
        assert_eq!(p.num_of_reviews, 2);
    }

    #[test]
    fn test_removing_last_review_resets_rating() {
        let mut p = product();
        p.apply_review(draft(1, 1, 4), ReviewId::new(1));
        assert!(p.remove_review(ReviewId::new(1)));
        assert!(p.ratings.abs() < f64::EPSILON);
        assert_eq!(p.num_of_reviews, 0);
        assert!(!p.remove_review(ReviewId::new(1)));
    }

    #[test]
    fn test_product_update_applies_present_fields() {
        let mut p = product();
        let update = ProductUpdate {
            price: Some(Decimal::new(99_000, 0)),
            ..ProductUpdate::default()
        };
        update.apply_to(&mut p);
        assert_eq!(p.price, Decimal::new(99_000, 0));
        assert_eq!(p.name, "Linen shirt");
        assert_eq!(p.variants[0].stock, 5);
    }
}
