//! Catalog and review queries.

use sqlx::PgConnection;
use tracing::instrument;

use fakeshion_core::{
    NewProduct, Product, ProductId, ProductUpdate, Review, ReviewChange, ReviewDraft, ReviewId,
    average_rating,
};

use super::{PRODUCT_COLUMNS, PgStore, ProductRow, ReviewRow, fetch_product, hydrate_products, like_pattern};
use crate::db::{
    PRODUCTS_PER_PAGE, ProductFilter, ProductPage, ProductRepository, RepositoryError,
};

#[derive(Debug, sqlx::FromRow)]
struct UpsertedReview {
    id: i32,
    inserted: bool,
}

/// Lock a product row for the rest of the transaction.
async fn lock_product(conn: &mut PgConnection, id: ProductId) -> Result<(), RepositoryError> {
    let locked: Option<i32> = sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(id.as_i32())
        .fetch_optional(&mut *conn)
        .await?;
    locked
        .map(|_| ())
        .ok_or_else(|| RepositoryError::NotFound(format!("product {id}")))
}

/// Recompute `ratings` and `num_of_reviews` from the current review rows.
async fn refresh_rating(conn: &mut PgConnection, id: ProductId) -> Result<(), RepositoryError> {
    let rows = sqlx::query_as::<_, ReviewRow>(
        r"
        SELECT id, product_id, user_id, order_id, variant_id, rating, comment
        FROM product_reviews
        WHERE product_id = $1
        ",
    )
    .bind(id.as_i32())
    .fetch_all(&mut *conn)
    .await?;
    let reviews = rows
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<Review>, _>>()?;

    let count = i32::try_from(reviews.len()).unwrap_or(i32::MAX);
    sqlx::query("UPDATE products SET ratings = $1, num_of_reviews = $2 WHERE id = $3")
        .bind(average_rating(&reviews))
        .bind(count)
        .bind(id.as_i32())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn fetch_locked_product(conn: &mut PgConnection, id: ProductId) -> Result<Product, RepositoryError> {
    fetch_product(conn, id)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("product {id}")))
}

impl ProductRepository for PgStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    #[instrument(skip(self))]
    async fn search_products(&self, filter: &ProductFilter) -> Result<ProductPage, RepositoryError> {
        let keyword = filter.keyword.as_deref().map(like_pattern);
        let category = filter.category.as_deref();
        let mut conn = self.pool.acquire().await?;

        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM products
            WHERE ($1::text IS NULL OR name ILIKE $1)
              AND ($2::text IS NULL OR LOWER(category) = LOWER($2))
            ",
        )
        .bind(keyword.as_deref())
        .bind(category)
        .fetch_one(&mut *conn)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE ($1::text IS NULL OR name ILIKE $1)
              AND ($2::text IS NULL OR LOWER(category) = LOWER($2))
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(keyword.as_deref())
        .bind(category)
        .bind(i64::from(PRODUCTS_PER_PAGE))
        .bind(i64::from(filter.offset()))
        .fetch_all(&mut *conn)
        .await?;

        Ok(ProductPage {
            res_per_page: PRODUCTS_PER_PAGE,
            filtered_products_count: u64::try_from(count).unwrap_or_default(),
            products: hydrate_products(&mut conn, rows).await?,
        })
    }

    async fn top_rated_products(&self, min_rating: f64, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE ratings >= $1
            ORDER BY num_of_reviews DESC, id
            LIMIT $2
            "
        ))
        .bind(min_rating)
        .bind(i64::from(limit))
        .fetch_all(&mut *conn)
        .await?;

        hydrate_products(&mut conn, rows).await
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_product(&self, input: &NewProduct) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO products (name, description, price, category)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(&input.category)
        .fetch_one(&mut *tx)
        .await?;

        for variant in &input.variants {
            sqlx::query(
                r"
                INSERT INTO product_variants (product_id, color, size, stock)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(id)
            .bind(variant.color.as_deref())
            .bind(variant.size.as_deref())
            .bind(variant.stock)
            .execute(&mut *tx)
            .await?;
        }

        let product = fetch_locked_product(&mut tx, ProductId::new(id)).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                category = COALESCE($5, category)
            WHERE id = $1
            RETURNING id
            ",
        )
        .bind(id.as_i32())
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .bind(update.price)
        .bind(update.category.as_deref())
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Ok(None);
        }
        let product = fetch_product(&mut tx, id).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_reviews(&self, product: ProductId) -> Result<Option<Vec<Review>>, RepositoryError> {
        Ok(self.get_product(product).await?.map(|p| p.reviews))
    }

    #[instrument(skip(self, draft), fields(user = %draft.user, order = %draft.order))]
    async fn upsert_review(
        &self,
        product: ProductId,
        draft: ReviewDraft,
    ) -> Result<(Product, ReviewChange), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_product(&mut tx, product).await?;

        // xmax is zero only for a freshly inserted row.
        let upserted = sqlx::query_as::<_, UpsertedReview>(
            r"
            INSERT INTO product_reviews (product_id, user_id, order_id, variant_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (product_id, user_id, order_id, variant_id)
            DO UPDATE SET rating = EXCLUDED.rating, comment = EXCLUDED.comment
            RETURNING id, (xmax = 0) AS inserted
            ",
        )
        .bind(product.as_i32())
        .bind(draft.user.as_i32())
        .bind(draft.order.as_i32())
        .bind(draft.variant.as_i32())
        .bind(i16::from(draft.rating.value()))
        .bind(&draft.comment)
        .fetch_one(&mut *tx)
        .await?;

        refresh_rating(&mut tx, product).await?;
        let updated = fetch_locked_product(&mut tx, product).await?;
        tx.commit().await?;

        let review = ReviewId::new(upserted.id);
        let change = if upserted.inserted {
            ReviewChange::Created(review)
        } else {
            ReviewChange::Updated(review)
        };
        Ok((updated, change))
    }

    #[instrument(skip(self))]
    async fn delete_review(&self, product: ProductId, review: ReviewId) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_product(&mut tx, product).await?;

        let deleted = sqlx::query("DELETE FROM product_reviews WHERE id = $1 AND product_id = $2")
            .bind(review.as_i32())
            .bind(product.as_i32())
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("review {review}")));
        }

        refresh_rating(&mut tx, product).await?;
        let updated = fetch_locked_product(&mut tx, product).await?;
        tx.commit().await?;
        Ok(updated)
    }
}
