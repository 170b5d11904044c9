//! Madrona Checkout - cart, order creation, and payment reconciliation.
//!
//! This crate keeps a buyer's cart, a server-recorded order, and an external
//! payment provider's asynchronous approval lifecycle consistent across
//! reloads, off-site redirects, network failures, and concurrent quantity
//! edits.
//!
//! # Architecture
//!
//! - [`cart::CartStore`] owns the durable, client-local cart: line identity,
//!   merge rules, quantity mutation, persistence across reloads.
//! - [`cart::validator::CartValidator`] reconciles cart contents against the
//!   live catalog immediately before checkout (stock, price drift, variant
//!   existence).
//! - [`orders::OrdersClient`] submits a validated cart to the commerce
//!   backend and reads canonical orders back.
//! - [`payment::PaymentGatewayBridge`] creates the corresponding order with
//!   the payment provider and persists the correlation record before the
//!   off-site redirect.
//! - [`payment::PaymentReconciler`] resolves the correlation on return and
//!   polls with bounded retries until a terminal payment outcome.
//!
//! The backend is the source of truth for orders; this crate only observes
//! order status. The only durable state this crate owns is the serialized
//! cart and the pending payment correlation, both held in an injected
//! [`storage::KeyValueStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use madrona_checkout::config::CheckoutConfig;
//! use madrona_checkout::storage::FileStore;
//!
//! let config = CheckoutConfig::from_env()?;
//! let store = Arc::new(FileStore::open(&config.state_path())?);
//! let cart = CartStore::new(Arc::clone(&store));
//!
//! cart.add_item(AddItemRequest { /* ... */ })?;
//! let report = validator.validate(&cart.get()?).await?;
//! let order = orders.create_order(&report.updated_items, /* ... */).await?;
//! let redirect = bridge.begin_payment(&order.id, order.summary.total, ...).await?;
//! // -> send the buyer to redirect.approval_url
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod orders;
pub mod payment;
pub mod storage;
pub mod telemetry;

pub use error::CheckoutError;
