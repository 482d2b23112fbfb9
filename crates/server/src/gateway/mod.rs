//! ZaloPay payment gateway integration.
//!
//! Two directions, two keys:
//!
//! - **Outbound**: [`ZaloPayClient::build_order`] assembles a create-order
//!   request and signs it with `key1`; [`ZaloPayClient::create_order`] posts it.
//! - **Inbound**: the gateway calls back with `{data, mac}` where
//!   `mac = HMAC-SHA256(data, key2)`; [`ZaloPayClient::verify_callback`]
//!   checks it and yields a [`VerifiedPayload`].
//!
//! The order itself travels through the gateway inside the `item` field as a
//! one-element JSON array of [`OrderPayload`].

mod client;
mod signature;

use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fakeshion_core::{NewOrder, UserId};

pub use client::ZaloPayClient;
pub use signature::{SignatureError, VerifiedPayload, sign, verify};

/// Provider name recorded in settled payment info.
pub const PROVIDER: &str = "ZaloPay";

/// Gateway return codes for callback responses.
pub mod return_code {
    /// Accepted: order created or already present.
    pub const ACCEPTED: i32 = 1;
    /// Transient failure; the gateway retries delivery.
    pub const RETRY: i32 = 0;
    /// Permanent rejection.
    pub const REJECTED: i32 = -1;
}

/// Errors talking to the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Payload could not be (de)serialized.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("signing failed: {0}")]
    Signature(#[from] SignatureError),

    /// Order total cannot be expressed as a whole-currency amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// The gateway answered but refused the request.
    #[error("gateway rejected request: {code} - {message}")]
    Rejected { code: i32, message: String },
}

/// The order as carried inside the gateway's `item` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    #[serde(flatten)]
    pub order: NewOrder,
    pub user: UserId,
}

/// A signed create-order request, posted form-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayOrder {
    pub app_id: String,
    pub app_trans_id: String,
    pub app_user: String,
    /// Milliseconds since the Unix epoch.
    pub app_time: i64,
    pub amount: i64,
    pub item: String,
    pub embed_data: String,
    pub description: String,
    pub bank_code: String,
    pub callback_url: String,
    pub mac: String,
}

impl GatewayOrder {
    /// `app_id|app_trans_id|app_user|amount|app_time|embed_data|item`
    #[must_use]
    pub fn signing_input(&self) -> String {
        [
            self.app_id.as_str(),
            self.app_trans_id.as_str(),
            self.app_user.as_str(),
            &self.amount.to_string(),
            &self.app_time.to_string(),
            self.embed_data.as_str(),
            self.item.as_str(),
        ]
        .join("|")
    }
}

/// Response body of the create-order endpoint, passed through to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub return_code: i32,
    #[serde(default)]
    pub return_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_return_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_return_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zp_trans_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

/// Inbound callback envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub data: String,
    pub mac: String,
}

/// What we answer the gateway. Always sent with HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub return_code: i32,
    pub return_message: String,
}

impl CallbackResponse {
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            return_code: return_code::ACCEPTED,
            return_message: "success".to_owned(),
        }
    }

    #[must_use]
    pub fn retry(message: impl Into<String>) -> Self {
        Self {
            return_code: return_code::RETRY,
            return_message: message.into(),
        }
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            return_code: return_code::REJECTED,
            return_message: message.into(),
        }
    }
}

/// The verified `data` field of a callback.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallbackData {
    pub app_trans_id: String,
    /// JSON array holding one [`OrderPayload`].
    pub item: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub zp_trans_id: Option<i64>,
}

impl CallbackData {
    /// Decode the order carried in `item`.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if `item` is not a non-empty array of
    /// order payloads.
    pub fn order_payload(&self) -> Result<OrderPayload, serde_json::Error> {
        let items: Vec<OrderPayload> = serde_json::from_str(&self.item)?;
        items
            .into_iter()
            .next()
            .ok_or_else(|| serde_json::Error::custom("item carries no order"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_input_field_order() {
        let order = GatewayOrder {
            app_id: "2553".to_string(),
            app_trans_id: "240101120000113114115ZP".to_string(),
            app_user: "113114115 - FakeshionShop".to_string(),
            app_time: 1_704_110_400_000,
            amount: 50_000,
            item: "[]".to_string(),
            embed_data: "{}".to_string(),
            description: String::new(),
            bank_code: String::new(),
            callback_url: String::new(),
            mac: String::new(),
        };
        assert_eq!(
            order.signing_input(),
            "2553|240101120000113114115ZP|113114115 - FakeshionShop|50000|1704110400000|{}|[]"
        );
    }

    #[test]
    fn test_callback_data_decodes_item() {
        let item = serde_json::json!([{
            "orderItems": [{
                "product": 1,
                "name": "Linen shirt",
                "selectedVariant": { "variantID": 11 },
                "quantity": 1,
                "price": "50000"
            }],
            "shippingInfo": { "address": "1 Le Loi", "phoneNo": "0900000000" },
            "itemsPrice": "50000",
            "shippingAmount": "0",
            "totalAmount": "50000",
            "paymentMethod": "ZaloPay",
            "user": 7
        }])
        .to_string();
        let data = serde_json::json!({
            "app_id": 2553,
            "app_trans_id": "240101120000113114115ZP",
            "item": item,
            "amount": 50000,
            "zp_trans_id": 240_101_000_000_001_i64
        })
        .to_string();

        let parsed: CallbackData = serde_json::from_str(&data).unwrap();
        let payload = parsed.order_payload().unwrap();
        assert_eq!(payload.user, UserId::new(7));
        assert_eq!(payload.order.items.len(), 1);
    }

    #[test]
    fn test_empty_item_is_an_error() {
        let data = CallbackData {
            app_trans_id: "x".to_string(),
            item: "[]".to_string(),
            amount: None,
            zp_trans_id: None,
        };
        assert!(data.order_payload().is_err());
    }
}
