//! Handoff to the payment provider's hosted approval page.

use std::sync::Arc;

use madrona_core::{CurrencyCode, OrderId};
use rust_decimal::Decimal;
use tracing::instrument;

use crate::error::CheckoutError;
use crate::storage::{KeyValueStore, keys};

use super::PendingPaymentCorrelation;
use super::gateway::{GatewayOrder, PaymentGateway};

/// Creates the gateway-side order and persists the correlation record.
pub struct PaymentGatewayBridge<G> {
    gateway: G,
    store: Arc<dyn KeyValueStore>,
}

impl<G: PaymentGateway> PaymentGatewayBridge<G> {
    /// Create a bridge over a gateway and the durable store.
    #[must_use]
    pub fn new(gateway: G, store: Arc<dyn KeyValueStore>) -> Self {
        Self { gateway, store }
    }

    /// Create a gateway order for an already-created local order and return
    /// the approval redirect target.
    ///
    /// The correlation record is persisted *before* this returns: the next
    /// step is a full-page redirect outside the application's control, so
    /// any in-memory mapping would be lost. Callers must not navigate until
    /// this method has succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if gateway order creation or the correlation write
    /// fails; failure is fatal to the attempt and leaves no correlation
    /// behind.
    #[instrument(skip(self, description), fields(local_order_id = %local_order_id))]
    pub async fn begin_payment(
        &self,
        local_order_id: &OrderId,
        amount: Decimal,
        currency: CurrencyCode,
        description: &str,
    ) -> Result<GatewayOrder, CheckoutError> {
        let gateway_order = self
            .gateway
            .create_order(amount, currency, description)
            .await?;

        keys::PENDING_PAYMENT.set(
            &*self.store,
            &PendingPaymentCorrelation {
                local_order_id: local_order_id.clone(),
                external_order_id: gateway_order.external_order_id.clone(),
            },
        )?;

        tracing::info!(
            external_order_id = %gateway_order.external_order_id,
            "gateway order created, correlation persisted"
        );
        Ok(gateway_order)
    }
}
