//! Commerce backend order client.
//!
//! Orders are server-owned: this module creates them and reads them back,
//! but status transitions happen only on the backend. The snapshot returned
//! by creation is immutable receipt data; the backend recomputes the
//! authoritative summary from the submitted lines.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use madrona_core::{AddressId, OrderId, OrderStatus, Price, ProductId};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::cart::types::Cart;
use crate::cart::variant::VariantKey;
use crate::config::CheckoutConfig;
use crate::http::{ApiError, read_json};

/// How the buyer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// External payment provider with a hosted approval page.
    #[default]
    OnlineGateway,
    /// Settled on delivery; no gateway involvement.
    CashOnDelivery,
}

/// One line of an order, snapshotted at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The ordered product.
    pub product_id: ProductId,
    /// Variant selection, absent for variantless products.
    pub variant: Option<VariantKey>,
    /// Ordered quantity.
    pub quantity: u32,
    /// Unit price at order time.
    pub unit_price: Decimal,
    /// `unit_price * quantity` at order time.
    pub subtotal: Decimal,
}

/// Monetary summary of an order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct OrderSummary {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// A server-owned order. The client holds a read-only snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Canonical order id.
    pub id: OrderId,
    /// Human-facing order number.
    pub order_number: String,
    /// Lifecycle status; written only by the backend.
    pub status: OrderStatus,
    /// Payment method chosen at creation.
    pub payment_method: PaymentMethod,
    /// The payment provider's order id, once one exists.
    pub external_payment_order_id: Option<madrona_core::ExternalOrderId>,
    /// The provider's capture transaction id, once payment completed.
    pub external_transaction_id: Option<String>,
    /// Captured amount, once payment completed.
    pub paid_amount: Option<Price>,
    /// Capture timestamp, once payment completed.
    pub paid_at: Option<DateTime<Utc>>,
    /// Items snapshot taken at creation time.
    pub items: Vec<OrderItem>,
    /// Authoritative summary computed by the backend.
    pub summary: OrderSummary,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// References to saved addresses used for the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRefs {
    /// Shipping address.
    pub shipping_address_id: AddressId,
    /// Billing address; defaults to shipping when absent.
    pub billing_address_id: Option<AddressId>,
}

/// Payload for `POST /orders`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItem>,
    /// Client-computed summary; the backend recomputes and is authoritative.
    pub summary: OrderSummary,
    pub shipping_address_id: AddressId,
    pub billing_address_id: Option<AddressId>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    /// Build a creation request from a *validated* cart snapshot.
    #[must_use]
    pub fn from_validated_cart(
        cart: &Cart,
        address: AddressRefs,
        payment_method: PaymentMethod,
        notes: Option<String>,
    ) -> Self {
        Self {
            items: cart
                .items
                .iter()
                .map(|line| OrderItem {
                    product_id: line.product_id.clone(),
                    variant: line.variant.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    subtotal: line.subtotal,
                })
                .collect(),
            summary: OrderSummary {
                subtotal: cart.subtotal,
                discount: cart.discount,
                shipping: cart.shipping,
                total: cart.total,
            },
            shipping_address_id: address.shipping_address_id,
            billing_address_id: address.billing_address_id,
            payment_method,
            notes,
        }
    }
}

/// Backend order operations the checkout flow depends on.
///
/// The reconciler and flow tests are generic over this trait. Order reads
/// must hit the backend every time: a terminal payment status has to be
/// observed by an up-to-date fetch, so implementations must not cache.
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Create an order from a validated cart snapshot.
    ///
    /// # Errors
    ///
    /// Any failure is fatal to the checkout attempt; no partial order state
    /// is left behind on the client.
    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ApiError>;

    /// Fetch the canonical order, uncached.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist or the request fails.
    async fn order(&self, id: &OrderId) -> Result<Order, ApiError>;
}

/// HTTP client for the commerce backend's order endpoints.
#[derive(Clone)]
pub struct OrdersClient {
    inner: Arc<OrdersClientInner>,
}

struct OrdersClientInner {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl OrdersClient {
    /// Create a new orders client.
    #[must_use]
    pub fn new(config: &CheckoutConfig) -> Self {
        Self {
            inner: Arc::new(OrdersClientInner {
                client: reqwest::Client::new(),
                base_url: config.commerce_api_url.clone(),
                api_token: config.commerce_api_token.expose_secret().to_string(),
            }),
        }
    }

    /// Submit a validated cart as a new order.
    ///
    /// A fresh idempotency key accompanies every submission so an ambiguous
    /// network failure retried by the caller cannot create two backend
    /// orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the order or the request
    /// fails; failure leaves no client-side state behind.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn submit_order(&self, request: &CreateOrderRequest) -> Result<Order, ApiError> {
        let idempotency_key = Uuid::new_v4().to_string();
        let response = self
            .inner
            .client
            .post(format!("{}/orders", self.inner.base_url))
            .bearer_auth(&self.inner.api_token)
            .header("Idempotency-Key", &idempotency_key)
            .json(request)
            .send()
            .await?;
        read_json(response, "order").await
    }

    /// Fetch an order by id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not exist, or an error
    /// for network and server failures.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: &OrderId) -> Result<Order, ApiError> {
        let response = self
            .inner
            .client
            .get(format!("{}/orders/{}", self.inner.base_url, id))
            .bearer_auth(&self.inner.api_token)
            .send()
            .await?;
        read_json(response, &format!("order {id}")).await
    }

    /// Fetch an order by its human-facing number.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not exist, or an error
    /// for network and server failures.
    #[instrument(skip(self))]
    pub async fn get_order_by_number(&self, order_number: &str) -> Result<Order, ApiError> {
        let response = self
            .inner
            .client
            .get(format!(
                "{}/orders/number/{order_number}",
                self.inner.base_url
            ))
            .bearer_auth(&self.inner.api_token)
            .send()
            .await?;
        read_json(response, &format!("order number {order_number}")).await
    }

    /// List the authenticated buyer's orders.
    ///
    /// # Errors
    ///
    /// Returns an error for network and server failures.
    #[instrument(skip(self))]
    pub async fn my_orders(&self) -> Result<Vec<Order>, ApiError> {
        let response = self
            .inner
            .client
            .get(format!("{}/orders/my-orders", self.inner.base_url))
            .bearer_auth(&self.inner.api_token)
            .send()
            .await?;
        read_json(response, "orders").await
    }

    /// Request cancellation of an order (owner-initiated).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the cancellation or the
    /// request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn cancel_order(&self, id: &OrderId) -> Result<Order, ApiError> {
        let response = self
            .inner
            .client
            .patch(format!("{}/orders/{}/cancel", self.inner.base_url, id))
            .bearer_auth(&self.inner.api_token)
            .send()
            .await?;
        read_json(response, &format!("order {id}")).await
    }
}

#[async_trait]
impl OrderApi for OrdersClient {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ApiError> {
        self.submit_order(&request).await
    }

    async fn order(&self, id: &OrderId) -> Result<Order, ApiError> {
        self.get_order(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use madrona_core::CartLineId;

    use crate::cart::types::CartItem;

    #[test]
    fn test_request_built_from_validated_cart() {
        let mut cart = Cart::default();
        cart.items.push(CartItem {
            id: CartLineId::new("l1"),
            product_id: ProductId::new("P1"),
            variant: None,
            quantity: 2,
            unit_price: Decimal::from(10),
            available_stock: 5,
            subtotal: Decimal::ZERO,
        });
        cart.shipping = Decimal::from(4);
        cart.recompute_totals();

        let request = CreateOrderRequest::from_validated_cart(
            &cart,
            AddressRefs {
                shipping_address_id: AddressId::new("addr-1"),
                billing_address_id: None,
            },
            PaymentMethod::OnlineGateway,
            Some("leave at the door".to_string()),
        );

        assert_eq!(request.items.len(), 1);
        assert_eq!(request.items[0].subtotal, Decimal::from(20));
        assert_eq!(request.summary.subtotal, Decimal::from(20));
        assert_eq!(request.summary.total, Decimal::from(24));
        assert_eq!(request.payment_method, PaymentMethod::OnlineGateway);
    }

    #[test]
    fn test_order_deserializes_backend_shape() {
        let json = serde_json::json!({
            "id": "ord_1",
            "order_number": "M-1001",
            "status": "PENDING_PAYMENT",
            "payment_method": "online_gateway",
            "external_payment_order_id": null,
            "external_transaction_id": null,
            "paid_amount": null,
            "paid_at": null,
            "items": [],
            "summary": {"subtotal": "0", "discount": "0", "shipping": "0", "total": "0"},
            "created_at": "2026-08-24T12:00:00Z"
        });

        let order: Order = serde_json::from_value(json).expect("deserialize");
        assert_eq!(order.id, OrderId::new("ord_1"));
        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert!(order.paid_amount.is_none());
    }
}
