//! Order and payment transaction queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use tracing::instrument;

use fakeshion_core::{
    NewOrder, Order, OrderId, OrderStatus, PaymentStatus, PaymentTransaction, ProductId, UserId,
};

use super::{ORDER_COLUMNS, OrderRow, PgStore, orders_from_rows};
use crate::db::{
    OrderRepository, RepositoryError, SaleRecord, TransactionOutcome, TransitionCommit,
};

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    created_at: DateTime<Utc>,
    total_amount: Decimal,
}

/// Insert an order row on any executor (pool or open transaction).
async fn insert_order<'e, E>(
    executor: E,
    user: UserId,
    input: &NewOrder,
    transaction_id: Option<&str>,
) -> Result<Order, RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        INSERT INTO orders (
            user_id, items, shipping_info, items_price, shipping_amount,
            total_amount, payment_method, payment_info, status, transaction_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(user.as_i32())
    .bind(Json(&input.items))
    .bind(Json(&input.shipping_info))
    .bind(input.items_price)
    .bind(input.shipping_amount)
    .bind(input.total_amount)
    .bind(input.payment_method.as_str())
    .bind(Json(&input.payment_info))
    .bind(OrderStatus::Processing.as_str())
    .bind(transaction_id)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict("transaction already has an order".to_owned());
        }
        RepositoryError::Database(e)
    })?;

    row.try_into()
}

impl OrderRepository for PgStore {
    #[instrument(skip(self, input), fields(user = %user))]
    async fn create_order(&self, user: UserId, input: &NewOrder) -> Result<Order, RepositoryError> {
        insert_order(&self.pool, user, input, None).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user.as_i32())
        .fetch_all(&self.pool)
        .await?;

        orders_from_rows(rows)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        orders_from_rows(rows)
    }

    async fn delete_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "DELETE FROM orders WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self, commit), fields(order = %commit.order, to = %commit.to))]
    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // The status guard doubles as the row lock for the rest of the unit.
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders
            SET status = $1,
                delivered_at = COALESCE($2, delivered_at),
                payment_info = CASE
                    WHEN $3 THEN jsonb_set(payment_info, '{{status}}', $4)
                    ELSE payment_info
                END
            WHERE id = $5 AND status = $6
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(commit.to.as_str())
        .bind(commit.delivered_at)
        .bind(commit.settle_payment)
        .bind(Json(PaymentStatus::Paid))
        .bind(commit.order.as_i32())
        .bind(commit.from.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let exists: Option<String> =
                sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                    .bind(commit.order.as_i32())
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match exists {
                None => RepositoryError::NotFound(format!("order {}", commit.order)),
                Some(status) => RepositoryError::Conflict(format!(
                    "order {} is {status}, expected {}",
                    commit.order, commit.from
                )),
            });
        };

        for adj in &commit.adjustments {
            let quantity = i32::try_from(adj.quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!("quantity {} overflows", adj.quantity))
            })?;

            let updated = sqlx::query(
                r"
                UPDATE product_variants
                SET stock = stock - $1, sold_qty = sold_qty + $1
                WHERE id = $2 AND product_id = $3
                ",
            )
            .bind(quantity)
            .bind(adj.variant.as_i32())
            .bind(adj.product.as_i32())
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                return Err(RepositoryError::NotFound(format!(
                    "variant {} of product {}",
                    adj.variant, adj.product
                )));
            }

            sqlx::query("UPDATE products SET sold_qty = sold_qty + $1 WHERE id = $2")
                .bind(quantity)
                .bind(adj.product.as_i32())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        row.try_into()
    }

    #[instrument(skip(self, transaction, input), fields(transaction_id = %transaction.transaction_id))]
    async fn record_transaction(
        &self,
        transaction: &PaymentTransaction,
        user: UserId,
        input: &NewOrder,
    ) -> Result<TransactionOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Concurrent claims for the same id block on the unique index here
        // until the first commits, then fall through as already recorded.
        let claimed = sqlx::query(
            r"
            INSERT INTO payment_transactions (transaction_id, payload, signature)
            VALUES ($1, $2, $3)
            ON CONFLICT (transaction_id) DO NOTHING
            ",
        )
        .bind(&transaction.transaction_id)
        .bind(&transaction.payload)
        .bind(&transaction.signature)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if !claimed {
            tx.rollback().await?;
            let existing = sqlx::query_as::<_, OrderRow>(&format!(
                r"
                SELECT {ORDER_COLUMNS} FROM orders
                WHERE id = (SELECT order_id FROM payment_transactions WHERE transaction_id = $1)
                "
            ))
            .bind(&transaction.transaction_id)
            .fetch_optional(&self.pool)
            .await?;
            return Ok(TransactionOutcome::Existing(
                existing.map(TryInto::try_into).transpose()?,
            ));
        }

        let order = insert_order(&mut *tx, user, input, Some(&transaction.transaction_id)).await?;

        sqlx::query("UPDATE payment_transactions SET order_id = $1 WHERE transaction_id = $2")
            .bind(order.id.as_i32())
            .bind(&transaction.transaction_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(TransactionOutcome::Created(order))
    }

    async fn sales_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SaleRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, SaleRow>(
            r"
            SELECT created_at, total_amount
            FROM orders
            WHERE created_at >= $1 AND created_at <= $2
            ",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SaleRecord {
                created_at: r.created_at,
                total_amount: r.total_amount,
            })
            .collect())
    }

    async fn has_ordered_product(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let containment = serde_json::json!([{ "product": product }]);
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM orders WHERE user_id = $1 AND items @> $2)",
        )
        .bind(user.as_i32())
        .bind(Json(containment))
        .fetch_one(&self.pool)
        .await?;

        Ok(found)
    }
}
