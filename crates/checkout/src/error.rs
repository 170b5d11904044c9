//! Top-level checkout error type.

use crate::cart::CartError;
use crate::config::ConfigError;
use crate::http::ApiError;
use crate::storage::StorageError;

/// Errors surfaced by the checkout flow.
///
/// Layer-specific errors (`ApiError`, `CartError`, `StorageError`) convert
/// into this type at the flow boundary via `?`.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// A backend or gateway request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A cart operation was rejected.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Durable state could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Nothing is awaiting payment: no explicit order id was supplied and
    /// no correlation record exists.
    #[error("no pending payment found")]
    NoPendingPayment,

    /// The payment poll task was cancelled before reaching an outcome.
    #[error("payment polling was cancelled")]
    PollCancelled,
}
