//! Catalog reads and admin writes.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use fakeshion_core::{NewProduct, Product, ProductId, ProductUpdate};

use crate::cache::{CacheKey, Invalidation, PRODUCT_LIST_PREFIX, ReadThrough};
use crate::db::{ProductFilter, ProductPage, RepositoryError, Store};

/// Minimum rating for the homepage list.
pub const TOP_RATED_MIN_RATING: f64 = 4.0;

/// Size of the homepage list.
pub const TOP_RATED_LIMIT: u32 = 12;

/// Errors from product operations.
#[derive(Debug, Error)]
pub enum ProductError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid product: {0}")]
    Invalid(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ProductError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => Self::NotFound(what),
            other => Self::Repository(other),
        }
    }
}

/// A product listing page as served to the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    pub res_per_page: u32,
    pub filtered_products_count: u64,
    pub products: Vec<Product>,
    /// Present only on the unfiltered listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_rated_products: Option<Vec<Product>>,
}

/// Entries made stale by any write to `id`.
pub(crate) fn product_invalidation(id: ProductId) -> Invalidation {
    Invalidation::new()
        .key(CacheKey::ProductDetail(id))
        .key(CacheKey::TopRated)
        .prefix(PRODUCT_LIST_PREFIX)
}

#[derive(Clone)]
pub struct ProductService<S> {
    store: S,
    cache: ReadThrough,
}

impl<S: Store> ProductService<S> {
    #[must_use]
    pub const fn new(store: S, cache: ReadThrough) -> Self {
        Self { store, cache }
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such product exists.
    pub async fn get(&self, id: ProductId) -> Result<Product, ProductError> {
        self.cache
            .get_or_load(&CacheKey::ProductDetail(id), || self.store.get_product(id))
            .await?
            .ok_or_else(|| ProductError::NotFound(format!("product {id}")))
    }

    /// Search the catalog. The unfiltered listing also carries the
    /// top-rated products.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if a store query fails.
    pub async fn list(&self, filter: ProductFilter) -> Result<ProductListing, ProductError> {
        let filter = filter.normalized();
        let page: ProductPage = self
            .cache
            .get_or_load_value(&CacheKey::ProductList(filter.canonical()), || {
                self.store.search_products(&filter)
            })
            .await?;

        let top_rated_products = if filter.is_unfiltered() {
            Some(self.top_rated().await?)
        } else {
            None
        };

        Ok(ProductListing {
            res_per_page: page.res_per_page,
            filtered_products_count: page.filtered_products_count,
            products: page.products,
            top_rated_products,
        })
    }

    /// Best-rated products, most reviewed first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the store query fails.
    pub async fn top_rated(&self) -> Result<Vec<Product>, ProductError> {
        Ok(self
            .cache
            .get_or_load_value(&CacheKey::TopRated, || {
                self.store
                    .top_rated_products(TOP_RATED_MIN_RATING, TOP_RATED_LIMIT)
            })
            .await?)
    }

    /// Add a product to the catalog.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a nameless or variantless product.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: NewProduct) -> Result<Product, ProductError> {
        if input.name.trim().is_empty() {
            return Err(ProductError::Invalid("name is required".to_owned()));
        }
        if input.variants.is_empty() {
            return Err(ProductError::Invalid("at least one variant is required".to_owned()));
        }
        if input.price.is_sign_negative() {
            return Err(ProductError::Invalid("price cannot be negative".to_owned()));
        }

        let product = self.store.create_product(&input).await?;
        self.cache.invalidate(&product_invalidation(product.id)).await;
        info!(product = %product.id, "Product created");
        Ok(product)
    }

    /// Update a product's descriptive fields.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such product exists.
    #[instrument(skip(self, update), fields(product = %id))]
    pub async fn update(&self, id: ProductId, update: ProductUpdate) -> Result<Product, ProductError> {
        if update.price.is_some_and(|p| p.is_sign_negative()) {
            return Err(ProductError::Invalid("price cannot be negative".to_owned()));
        }
        let product = self
            .store
            .update_product(id, &update)
            .await?
            .ok_or_else(|| ProductError::NotFound(format!("product {id}")))?;

        self.cache.invalidate(&product_invalidation(id)).await;
        info!("Product updated");
        Ok(product)
    }

    /// Remove a product and its reviews.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such product exists.
    #[instrument(skip(self), fields(product = %id))]
    pub async fn delete(&self, id: ProductId) -> Result<(), ProductError> {
        if !self.store.delete_product(id).await? {
            return Err(ProductError::NotFound(format!("product {id}")));
        }

        let invalidation = product_invalidation(id).key(CacheKey::ProductReviews(id));
        self.cache.invalidate(&invalidation).await;
        info!("Product deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use fakeshion_core::{NewVariant, OrderId, Rating, ReviewDraft, UserId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::cache::CacheStore;
    use crate::config::CacheConfig;
    use crate::db::{MemoryStore, ProductRepository};

    fn service(store: &MemoryStore) -> ProductService<MemoryStore> {
        ProductService::new(
            store.clone(),
            ReadThrough::new(CacheStore::open(&CacheConfig::default())),
        )
    }

    fn new_product(name: &str, category: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: String::new(),
            price: Decimal::new(150_000, 0),
            category: category.to_string(),
            variants: vec![NewVariant {
                color: None,
                size: Some("M".to_string()),
                stock: 5,
            }],
        }
    }

    #[tokio::test]
    async fn test_update_is_visible_through_cached_detail_and_list() {
        let store = MemoryStore::new();
        let products = service(&store);
        let p = products.create(new_product("Linen shirt", "Shirts")).await.unwrap();

        assert_eq!(products.get(p.id).await.unwrap().name, "Linen shirt");
        let listing = products.list(ProductFilter::default()).await.unwrap();
        assert_eq!(listing.products[0].name, "Linen shirt");

        products
            .update(
                p.id,
                ProductUpdate {
                    name: Some("Hemp shirt".to_string()),
                    ..ProductUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(products.get(p.id).await.unwrap().name, "Hemp shirt");
        let listing = products.list(ProductFilter::default()).await.unwrap();
        assert_eq!(listing.products[0].name, "Hemp shirt");
    }

    #[tokio::test]
    async fn test_new_product_appears_in_cached_filtered_list() {
        let store = MemoryStore::new();
        let products = service(&store);
        products.create(new_product("Linen shirt", "Shirts")).await.unwrap();

        let filter = ProductFilter {
            category: Some("shirts".to_string()),
            ..ProductFilter::default()
        };
        let before = products.list(filter.clone()).await.unwrap();
        assert_eq!(before.filtered_products_count, 1);
        assert!(before.top_rated_products.is_none());

        products.create(new_product("Oxford shirt", "Shirts")).await.unwrap();
        let after = products.list(filter).await.unwrap();
        assert_eq!(after.filtered_products_count, 2);
    }

    #[tokio::test]
    async fn test_unfiltered_listing_carries_top_rated() {
        let store = MemoryStore::new();
        let products = service(&store);
        let rated = products.create(new_product("Linen shirt", "Shirts")).await.unwrap();
        products.create(new_product("Wool scarf", "Accessories")).await.unwrap();

        store
            .upsert_review(
                rated.id,
                ReviewDraft {
                    user: UserId::new(1),
                    order: OrderId::new(1),
                    variant: rated.variants[0].id,
                    rating: Rating::new(5).unwrap(),
                    comment: "great".to_string(),
                },
            )
            .await
            .unwrap();

        let listing = products.list(ProductFilter::default()).await.unwrap();
        let top = listing.top_rated_products.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, rated.id);
        assert_eq!(listing.filtered_products_count, 2);
    }

    #[tokio::test]
    async fn test_delete_and_validation() {
        let store = MemoryStore::new();
        let products = service(&store);
        let p = products.create(new_product("Linen shirt", "Shirts")).await.unwrap();
        products.get(p.id).await.unwrap();

        products.delete(p.id).await.unwrap();
        assert!(matches!(products.get(p.id).await, Err(ProductError::NotFound(_))));
        assert!(matches!(products.delete(p.id).await, Err(ProductError::NotFound(_))));

        let mut nameless = new_product(" ", "Shirts");
        assert!(matches!(products.create(nameless.clone()).await, Err(ProductError::Invalid(_))));
        nameless.name = "Scarf".to_string();
        nameless.variants.clear();
        assert!(matches!(products.create(nameless).await, Err(ProductError::Invalid(_))));
    }
}
