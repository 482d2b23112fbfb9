//! Payment initiation and gateway callback reconciliation.
//!
//! A verified callback materializes exactly one order per gateway
//! transaction id, no matter how many times the gateway delivers it. The
//! claim on the transaction id and the order insert commit together, so
//! concurrent duplicate deliveries cannot both create an order.

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use fakeshion_core::{
    InvalidOrder, NewOrder, Order, PaymentInfo, PaymentMethod, PaymentTransaction, UserId,
};

use super::orders::new_order_invalidation;
use crate::cache::ReadThrough;
use crate::db::{Store, TransactionOutcome};
use crate::gateway::{
    CallbackData, CallbackRequest, CallbackResponse, CreateOrderResponse, GatewayError, PROVIDER,
    SignatureError, ZaloPayClient, return_code,
};

/// Errors starting a payment.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Invalid(#[from] InvalidOrder),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Why a callback was not accepted.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Permanent: the callback is not from the gateway. Nothing was created.
    #[error("invalid callback signature: {0}")]
    Signature(#[from] SignatureError),

    /// Parsing or persistence failed; the gateway should retry.
    #[error("transient reconciliation failure: {0}")]
    Transient(String),
}

impl ReconcileError {
    /// Gateway return code for this failure.
    #[must_use]
    pub const fn return_code(&self) -> i32 {
        match self {
            Self::Signature(_) => return_code::REJECTED,
            Self::Transient(_) => return_code::RETRY,
        }
    }
}

/// A successfully handled callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// This delivery created the order.
    Created(Order),
    /// The transaction was already reconciled by an earlier delivery.
    Duplicate(Option<Order>),
}

/// Payment operations over a store, the shared cache and the gateway.
#[derive(Clone)]
pub struct PaymentService<S> {
    store: S,
    cache: ReadThrough,
    gateway: ZaloPayClient,
}

impl<S: Store> PaymentService<S> {
    #[must_use]
    pub const fn new(store: S, cache: ReadThrough, gateway: ZaloPayClient) -> Self {
        Self {
            store,
            cache,
            gateway,
        }
    }

    /// Open a gateway payment for an order that does not exist yet.
    ///
    /// The order is created only once the gateway calls back.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for malformed input, `Gateway` if the gateway
    /// request fails or is refused.
    #[instrument(skip(self, input), fields(user = %user))]
    pub async fn initiate(&self, user: UserId, mut input: NewOrder) -> Result<CreateOrderResponse, PaymentError> {
        input.validate()?;
        input.payment_method = PaymentMethod::ZaloPay;
        input.payment_info = PaymentInfo::default();
        let request = self.gateway.build_order(&input, user, Utc::now())?;
        let response = self.gateway.create_order(&request).await?;

        info!(app_trans_id = %request.app_trans_id, "Payment initiated");
        Ok(response)
    }

    /// Verify a callback and materialize its order at most once.
    ///
    /// # Errors
    ///
    /// - `Signature` if the `mac` does not match (permanent)
    /// - `Transient` if the payload cannot be decoded or stored (retryable)
    pub async fn reconcile(&self, callback: &CallbackRequest) -> Result<Reconciled, ReconcileError> {
        let verified = self.gateway.verify_callback(callback)?;

        let data: CallbackData = verified
            .parse()
            .map_err(|e| ReconcileError::Transient(format!("malformed callback data: {e}")))?;
        let payload = data
            .order_payload()
            .map_err(|e| ReconcileError::Transient(format!("malformed order item: {e}")))?;

        let mut order = payload.order;
        order.payment_info = PaymentInfo::settled_by(PROVIDER, &data.app_trans_id);
        order
            .validate()
            .map_err(|e| ReconcileError::Transient(format!("invalid order: {e}")))?;

        let transaction = PaymentTransaction::new(
            data.app_trans_id,
            verified.into_inner(),
            callback.mac.clone(),
        );
        let outcome = self
            .store
            .record_transaction(&transaction, payload.user, &order)
            .await
            .map_err(|e| ReconcileError::Transient(e.to_string()))?;

        match outcome {
            TransactionOutcome::Created(order) => {
                self.cache.invalidate(&new_order_invalidation(order.user)).await;
                info!(
                    transaction_id = %transaction.transaction_id,
                    order = %order.id,
                    "Payment reconciled; order created"
                );
                Ok(Reconciled::Created(order))
            }
            TransactionOutcome::Existing(order) => {
                info!(
                    transaction_id = %transaction.transaction_id,
                    "Duplicate payment callback; order already exists"
                );
                Ok(Reconciled::Duplicate(order))
            }
        }
    }

    /// Handle a callback and produce the gateway's response.
    #[instrument(skip(self, callback))]
    pub async fn handle_callback(&self, callback: &CallbackRequest) -> CallbackResponse {
        match self.reconcile(callback).await {
            Ok(_) => CallbackResponse::accepted(),
            Err(ReconcileError::Signature(e)) => {
                warn!(error = %e, "Rejected payment callback");
                CallbackResponse::rejected("mac not equal")
            }
            Err(ReconcileError::Transient(message)) => {
                error!(error = %message, "Payment callback failed; gateway will retry");
                CallbackResponse::retry(message)
            }
        }
    }
}
