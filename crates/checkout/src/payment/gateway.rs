//! Payment gateway REST client.

use std::sync::Arc;

use async_trait::async_trait;
use madrona_core::{CurrencyCode, ExternalOrderId};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::GatewayConfig;
use crate::http::{ApiError, read_json};

/// A gateway order awaiting buyer approval.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    /// The gateway's order id.
    pub external_order_id: ExternalOrderId,
    /// Provider-hosted approval page to redirect the buyer to.
    pub approval_url: String,
}

/// Result of a capture attempt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayCapture {
    /// Capture outcome.
    pub status: GatewayCaptureStatus,
    /// Provider transaction id, present on completed captures.
    pub transaction_id: Option<String>,
}

/// Gateway capture outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayCaptureStatus {
    /// Funds captured.
    Completed,
    /// Provider declined the capture.
    Declined,
    /// Capture still settling on the provider side.
    Pending,
}

/// Current state of a gateway order, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayOrderDetails {
    /// The gateway's order id.
    pub external_order_id: ExternalOrderId,
    /// Provider-side status string (provider vocabularies vary).
    pub status: String,
    /// Order amount as known to the provider.
    pub amount: Decimal,
    /// Order currency as known to the provider.
    pub currency: CurrencyCode,
}

/// The payment provider operations the bridge depends on.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a gateway order for the given amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the order or the request
    /// fails.
    async fn create_order(
        &self,
        amount: Decimal,
        currency: CurrencyCode,
        description: &str,
    ) -> Result<GatewayOrder, ApiError>;

    /// Attempt capture. Idempotent on the provider side.
    ///
    /// # Errors
    ///
    /// Returns an error for network and server failures; a declined capture
    /// is a successful response with [`GatewayCaptureStatus::Declined`].
    async fn capture_order(&self, id: &ExternalOrderId) -> Result<GatewayCapture, ApiError>;

    /// Fetch the provider's view of a gateway order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is unknown or the request fails.
    async fn order_details(&self, id: &ExternalOrderId) -> Result<GatewayOrderDetails, ApiError>;
}

/// Payload for the gateway's `create-order` endpoint.
#[derive(Debug, Serialize)]
struct CreateGatewayOrderRequest<'a> {
    amount: Decimal,
    currency: CurrencyCode,
    description: &'a str,
}

/// HTTP client for the payment gateway.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<GatewayClientInner>,
}

struct GatewayClientInner {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl GatewayClient {
    /// Create a new gateway client.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            inner: Arc::new(GatewayClientInner {
                client: reqwest::Client::new(),
                base_url: config.api_url.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.expose_secret().to_string(),
            }),
        }
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    #[instrument(skip(self, description))]
    async fn create_order(
        &self,
        amount: Decimal,
        currency: CurrencyCode,
        description: &str,
    ) -> Result<GatewayOrder, ApiError> {
        let response = self
            .inner
            .client
            .post(format!("{}/create-order", self.inner.base_url))
            .basic_auth(&self.inner.client_id, Some(&self.inner.client_secret))
            .json(&CreateGatewayOrderRequest {
                amount,
                currency,
                description,
            })
            .send()
            .await?;
        read_json(response, "gateway order").await
    }

    #[instrument(skip(self), fields(external_order_id = %id))]
    async fn capture_order(&self, id: &ExternalOrderId) -> Result<GatewayCapture, ApiError> {
        let response = self
            .inner
            .client
            .post(format!("{}/capture-order/{}", self.inner.base_url, id))
            .basic_auth(&self.inner.client_id, Some(&self.inner.client_secret))
            .send()
            .await?;
        read_json(response, &format!("gateway order {id}")).await
    }

    #[instrument(skip(self), fields(external_order_id = %id))]
    async fn order_details(&self, id: &ExternalOrderId) -> Result<GatewayOrderDetails, ApiError> {
        let response = self
            .inner
            .client
            .get(format!("{}/order-details/{}", self.inner.base_url, id))
            .basic_auth(&self.inner.client_id, Some(&self.inner.client_secret))
            .send()
            .await?;
        read_json(response, &format!("gateway order {id}")).await
    }
}
