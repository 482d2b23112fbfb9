//! ZaloPay HTTP client.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::prelude::ToPrimitive;
use tracing::{instrument, warn};

use fakeshion_core::{NewOrder, UserId};

use super::signature::{self, SignatureError, VerifiedPayload};
use super::{CallbackRequest, CreateOrderResponse, GatewayError, GatewayOrder, OrderPayload, return_code};
use crate::config::ZaloPayConfig;

const SHOP_NAME: &str = "FakeshionShop";

/// The gateway dates transaction ids in Vietnam time (UTC+7).
const GATEWAY_UTC_OFFSET: TimeDelta = TimeDelta::hours(7);

/// ZaloPay client for creating orders and verifying callbacks.
#[derive(Clone)]
pub struct ZaloPayClient {
    http: reqwest::Client,
    config: Arc<ZaloPayConfig>,
}

impl ZaloPayClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: ZaloPayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Transaction id for a payment started at `now` by `user`:
    /// `yyMMddHHmmss` + milliseconds + user id + `ZP`.
    ///
    /// The millisecond field keeps two payments a user starts within the
    /// same second apart.
    #[must_use]
    pub fn transaction_id(user: UserId, now: DateTime<Utc>) -> String {
        let local = now + GATEWAY_UTC_OFFSET;
        format!("{}{user}ZP", local.format("%y%m%d%H%M%S%3f"))
    }

    /// Assemble and sign a create-order request with the outbound key.
    ///
    /// # Errors
    ///
    /// Returns error if the total is not a whole amount, the payload cannot
    /// be serialized, or signing fails.
    pub fn build_order(
        &self,
        order: &NewOrder,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<GatewayOrder, GatewayError> {
        let app_trans_id = Self::transaction_id(user, now);

        let mut carried = order.clone();
        carried.shipping_info.order_ref = Some(app_trans_id.clone());
        let item = serde_json::to_string(&[OrderPayload {
            order: carried,
            user,
        }])?;
        let embed_data = serde_json::json!({
            "redirecturl": self.config.redirect_url.as_str(),
        })
        .to_string();

        let amount = order
            .total_amount
            .round()
            .to_i64()
            .filter(|a| *a >= 0)
            .ok_or(GatewayError::InvalidAmount(order.total_amount))?;

        let mut request = GatewayOrder {
            app_id: self.config.app_id.clone(),
            app_user: format!("{user} - {SHOP_NAME}"),
            app_time: now.timestamp_millis(),
            amount,
            item,
            embed_data,
            description: format!("{SHOP_NAME} - Payment for order #{app_trans_id}"),
            bank_code: String::new(),
            callback_url: self.config.callback_url.to_string(),
            mac: String::new(),
            app_trans_id,
        };
        request.mac = signature::sign(&request.signing_input(), &self.config.key1)?;
        Ok(request)
    }

    /// Submit a signed order to the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway refuses the order.
    #[instrument(skip(self, order), fields(app_trans_id = %order.app_trans_id))]
    pub async fn create_order(&self, order: &GatewayOrder) -> Result<CreateOrderResponse, GatewayError> {
        let response = self
            .http
            .post(self.config.endpoint.clone())
            .form(order)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                code: i32::from(status.as_u16()),
                message,
            });
        }

        let body: CreateOrderResponse = serde_json::from_slice(&response.bytes().await?)?;
        if body.return_code != return_code::ACCEPTED {
            warn!(
                return_code = body.return_code,
                message = %body.return_message,
                "Gateway refused order"
            );
            return Err(GatewayError::Rejected {
                code: body.return_code,
                message: body.return_message,
            });
        }
        Ok(body)
    }

    /// Verify an inbound callback with the inbound key.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] if the `mac` does not match `data`.
    pub fn verify_callback(&self, callback: &CallbackRequest) -> Result<VerifiedPayload, SignatureError> {
        signature::verify(&callback.data, &callback.mac, &self.config.key2)
    }
}
