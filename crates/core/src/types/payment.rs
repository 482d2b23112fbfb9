//! Payment gateway transaction records.

use serde::{Deserialize, Serialize};

use super::OrderId;

/// A verified gateway callback, keyed by the external transaction id.
///
/// At most one order is ever created per `transaction_id`; `order` stays
/// `None` until that order has been materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub transaction_id: String,
    /// Raw signed callback payload as received.
    pub payload: String,
    /// Signature received with the payload.
    pub signature: String,
    pub order: Option<OrderId>,
}

impl PaymentTransaction {
    #[must_use]
    pub fn new(transaction_id: String, payload: String, signature: String) -> Self {
        Self {
            transaction_id,
            payload,
            signature,
            order: None,
        }
    }
}
