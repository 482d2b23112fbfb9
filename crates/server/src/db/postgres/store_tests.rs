//! Store tests against a live `PostgreSQL`.
//!
//! Skipped unless `DATABASE_URL` is set. Each test creates its own product
//! and transaction ids, so runs can share one database.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;

use fakeshion_core::{
    NewOrder, NewProduct, NewVariant, OrderId, OrderItem, OrderStatus, PaymentInfo, PaymentMethod,
    PaymentStatus, PaymentTransaction, Product, SelectedVariant, ShippingInfo,
    StockAdjustment, UserId, VariantId,
};

use super::PgStore;
use crate::db::{
    OrderRepository, ProductRepository, RepositoryError, TransactionOutcome, TransitionCommit,
};

async fn connect() -> Option<PgStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let pool = PgPool::connect(&url).await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Some(PgStore::new(pool))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn seeded(store: &PgStore) -> Product {
    store
        .create_product(&NewProduct {
            name: unique("Linen shirt"),
            description: String::new(),
            price: Decimal::new(150_000, 0),
            category: "Shirts".to_string(),
            variants: vec![NewVariant {
                color: None,
                size: Some("M".to_string()),
                stock: 10,
            }],
        })
        .await
        .unwrap()
}

fn new_order(product: &Product, quantity: u32) -> NewOrder {
    NewOrder {
        items: vec![OrderItem {
            product: product.id,
            name: product.name.clone(),
            selected_variant: SelectedVariant {
                variant_id: product.variants[0].id,
                color: None,
                size: Some("M".to_string()),
            },
            quantity,
            price: product.price,
            image: None,
        }],
        shipping_info: ShippingInfo::default(),
        items_price: product.price,
        shipping_amount: Decimal::ZERO,
        total_amount: product.price,
        payment_method: PaymentMethod::CashOnDelivery,
        payment_info: PaymentInfo::default(),
    }
}

#[tokio::test]
async fn test_commit_transition_rejects_stale_status() {
    let Some(store) = connect().await else { return };
    let product = seeded(&store).await;
    let order = store
        .create_order(UserId::new(1), &new_order(&product, 2))
        .await
        .unwrap();

    let commit = TransitionCommit {
        order: order.id,
        from: OrderStatus::Shipped,
        to: OrderStatus::Delivered,
        adjustments: order.stock_adjustments().unwrap(),
        settle_payment: true,
        delivered_at: Some(Utc::now()),
    };
    let err = store.commit_transition(&commit).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));

    let untouched = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(untouched.variants[0].stock, 10);
    assert_eq!(untouched.variants[0].sold_qty, 0);
    let order = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
}

#[tokio::test]
async fn test_commit_transition_applies_stock_and_settlement() {
    let Some(store) = connect().await else { return };
    let product = seeded(&store).await;
    let order = store
        .create_order(UserId::new(1), &new_order(&product, 3))
        .await
        .unwrap();

    let commit = TransitionCommit {
        order: order.id,
        from: OrderStatus::Processing,
        to: OrderStatus::Delivered,
        adjustments: order.stock_adjustments().unwrap(),
        settle_payment: true,
        delivered_at: Some(Utc::now()),
    };
    let delivered = store.commit_transition(&commit).await.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.payment_info.status, PaymentStatus::Paid);
    assert!(delivered.delivered_at.is_some());

    let product = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.variants[0].stock, 7);
    assert_eq!(product.variants[0].sold_qty, 3);
    assert_eq!(product.sold_qty, 3);
}

#[tokio::test]
async fn test_commit_transition_rolls_back_on_missing_variant() {
    let Some(store) = connect().await else { return };
    let product = seeded(&store).await;
    let order = store
        .create_order(UserId::new(1), &new_order(&product, 2))
        .await
        .unwrap();

    // The real line is applied first, then the unknown variant aborts the unit.
    let mut adjustments = order.stock_adjustments().unwrap();
    adjustments.push(StockAdjustment {
        product: product.id,
        variant: VariantId::new(i32::MAX),
        quantity: 1,
    });
    let commit = TransitionCommit {
        order: order.id,
        from: OrderStatus::Processing,
        to: OrderStatus::Delivered,
        adjustments,
        settle_payment: true,
        delivered_at: Some(Utc::now()),
    };
    let err = store.commit_transition(&commit).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));

    let untouched = store.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(untouched.variants[0].stock, 10);
    assert_eq!(untouched.sold_qty, 0);
    let order = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.payment_info.status, PaymentStatus::Pending);
    assert!(order.delivered_at.is_none());
}

#[tokio::test]
async fn test_commit_transition_unknown_order_is_not_found() {
    let Some(store) = connect().await else { return };
    let commit = TransitionCommit {
        order: OrderId::new(i32::MAX),
        from: OrderStatus::Processing,
        to: OrderStatus::Shipped,
        adjustments: vec![],
        settle_payment: false,
        delivered_at: None,
    };
    let err = store.commit_transition(&commit).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}

#[tokio::test]
async fn test_record_transaction_claims_once() {
    let Some(store) = connect().await else { return };
    let product = seeded(&store).await;
    let mut input = new_order(&product, 1);
    input.payment_method = PaymentMethod::ZaloPay;
    let tx = PaymentTransaction::new(unique("ZP"), "{}".to_string(), "mac".to_string());

    let first = store
        .record_transaction(&tx, UserId::new(1), &input)
        .await
        .unwrap();
    let TransactionOutcome::Created(created) = first else {
        panic!("expected Created");
    };
    assert_eq!(created.transaction_id.as_deref(), Some(tx.transaction_id.as_str()));

    let second = store
        .record_transaction(&tx, UserId::new(1), &input)
        .await
        .unwrap();
    assert_eq!(second, TransactionOutcome::Existing(Some(created.clone())));

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE transaction_id = $1")
        .bind(&tx.transaction_id)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(orders, 1);
    let linked: Option<i32> =
        sqlx::query_scalar("SELECT order_id FROM payment_transactions WHERE transaction_id = $1")
            .bind(&tx.transaction_id)
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(linked, Some(created.id.as_i32()));
}

#[tokio::test]
async fn test_concurrent_record_transaction_creates_one_order() {
    let Some(store) = connect().await else { return };
    let product = seeded(&store).await;
    let input = new_order(&product, 1);
    let tx = PaymentTransaction::new(unique("ZP"), "{}".to_string(), "mac".to_string());

    let (a, b) = tokio::join!(
        store.record_transaction(&tx, UserId::new(1), &input),
        store.record_transaction(&tx, UserId::new(1), &input),
    );
    let created = [a.unwrap(), b.unwrap()]
        .into_iter()
        .filter(|o| matches!(o, TransactionOutcome::Created(_)))
        .count();
    assert_eq!(created, 1);

    let has_order = store
        .has_ordered_product(UserId::new(1), product.id)
        .await
        .unwrap();
    assert!(has_order);
}
