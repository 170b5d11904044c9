//! Payment gateway bridge and post-redirect reconciliation.
//!
//! Payment runs through an external provider with a hosted approval page:
//! the application creates a gateway order, persists the correlation between
//! the local order and the gateway order, and then loses control to a
//! full-page redirect. On return, the reconciler resolves the correlation
//! and polls the canonical order until a terminal payment outcome.

pub mod bridge;
pub mod gateway;
pub mod reconciler;

pub use bridge::PaymentGatewayBridge;
pub use gateway::{
    GatewayCapture, GatewayCaptureStatus, GatewayClient, GatewayOrder, GatewayOrderDetails,
    PaymentGateway,
};
pub use reconciler::{PaymentOutcome, PaymentReconciler, PollHandle};

use madrona_core::{ExternalOrderId, OrderId};
use serde::{Deserialize, Serialize};

/// Durable mapping between a local order and the gateway's order.
///
/// Written once per checkout attempt immediately before the off-site
/// redirect, read on every return, and deleted exactly once when a terminal
/// payment outcome is observed. A timeout leaves it in place so the buyer
/// can resume later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPaymentCorrelation {
    /// The backend order awaiting payment.
    pub local_order_id: OrderId,
    /// The gateway's order for the same purchase.
    pub external_order_id: ExternalOrderId,
}
