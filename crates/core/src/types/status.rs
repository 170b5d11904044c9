//! Order lifecycle status.
//!
//! The status machine is owned by the commerce backend: all writes happen
//! server-side and clients only observe. The client-side methods here encode
//! the shared interpretation of the lifecycle so that order creation, the
//! payment bridge, and the payment reconciler all read it identically.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order lifecycle status.
///
/// Initial state is [`OrderStatus::PendingPayment`]. Payment polling stops
/// on the narrower payment-terminal subset (`Paid`, `Failed`, `Cancelled`),
/// which is distinct from the lifecycle's true terminals (`Delivered`,
/// `Refunded`, `Cancelled`, `Failed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order created, payment not yet confirmed.
    #[default]
    PendingPayment,
    /// Payment captured.
    Paid,
    /// Being prepared for shipment.
    Processing,
    /// Packed and awaiting handoff.
    Packed,
    /// Ready for carrier pickup.
    ReadyToGo,
    /// At the carrier's origin facility.
    AtCarrierFacility,
    /// In transit between facilities.
    InTransit,
    /// Arrived in the destination country.
    ArrivedInCountry,
    /// At the local distribution facility.
    AtLocalFacility,
    /// Out for final delivery.
    OutForDelivery,
    /// Delivered to the customer.
    Delivered,
    /// Cancelled before payment completed (or by the owner).
    Cancelled,
    /// Payment failed.
    Failed,
    /// Refunded after payment.
    Refunded,
}

impl OrderStatus {
    /// Whether this status ends payment polling.
    ///
    /// This is intentionally narrower than [`Self::is_terminal`]: the
    /// reconciler only cares about the payment boundary, not fulfillment.
    #[must_use]
    pub const fn is_payment_terminal(self) -> bool {
        matches!(self, Self::Paid | Self::Failed | Self::Cancelled)
    }

    /// Whether this status ends the full order lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::Refunded | Self::Cancelled | Self::Failed
        )
    }

    /// Whether the order has been paid for (any post-payment state).
    #[must_use]
    pub const fn is_post_payment(self) -> bool {
        !matches!(
            self,
            Self::PendingPayment | Self::Cancelled | Self::Failed
        )
    }

    /// Whether the server-side machine allows moving from `self` to `next`.
    ///
    /// Clients never write status; this exists so UIs and reconciliation
    /// logic can detect an impossible observation (e.g., a stale read).
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::PendingPayment => {
                matches!(next, Self::Paid | Self::Failed | Self::Cancelled)
            }
            Self::Paid => matches!(next, Self::Processing | Self::Refunded),
            Self::Processing => matches!(next, Self::Packed | Self::Refunded),
            Self::Packed => matches!(next, Self::ReadyToGo | Self::Refunded),
            Self::ReadyToGo => matches!(next, Self::AtCarrierFacility | Self::Refunded),
            Self::AtCarrierFacility => matches!(next, Self::InTransit | Self::Refunded),
            Self::InTransit => matches!(next, Self::ArrivedInCountry | Self::Refunded),
            Self::ArrivedInCountry => matches!(next, Self::AtLocalFacility | Self::Refunded),
            Self::AtLocalFacility => matches!(next, Self::OutForDelivery | Self::Refunded),
            Self::OutForDelivery => matches!(next, Self::Delivered | Self::Refunded),
            Self::Delivered => matches!(next, Self::Refunded),
            Self::Cancelled | Self::Failed | Self::Refunded => false,
        }
    }

    /// The wire representation used by the commerce backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::Paid => "PAID",
            Self::Processing => "PROCESSING",
            Self::Packed => "PACKED",
            Self::ReadyToGo => "READY_TO_GO",
            Self::AtCarrierFacility => "AT_CARRIER_FACILITY",
            Self::InTransit => "IN_TRANSIT",
            Self::ArrivedInCountry => "ARRIVED_IN_COUNTRY",
            Self::AtLocalFacility => "AT_LOCAL_FACILITY",
            Self::OutForDelivery => "OUT_FOR_DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown order status string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid order status: {0}")]
pub struct ParseOrderStatusError(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = ParseOrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_PAYMENT" => Ok(Self::PendingPayment),
            "PAID" => Ok(Self::Paid),
            "PROCESSING" => Ok(Self::Processing),
            "PACKED" => Ok(Self::Packed),
            "READY_TO_GO" => Ok(Self::ReadyToGo),
            "AT_CARRIER_FACILITY" => Ok(Self::AtCarrierFacility),
            "IN_TRANSIT" => Ok(Self::InTransit),
            "ARRIVED_IN_COUNTRY" => Ok(Self::ArrivedInCountry),
            "AT_LOCAL_FACILITY" => Ok(Self::AtLocalFacility),
            "OUT_FOR_DELIVERY" => Ok(Self::OutForDelivery),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            "FAILED" => Ok(Self::Failed),
            "REFUNDED" => Ok(Self::Refunded),
            other => Err(ParseOrderStatusError(other.to_string())),
        }
    }
}
