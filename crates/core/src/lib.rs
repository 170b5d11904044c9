//! Madrona Core - Shared domain types.
//!
//! This crate provides the common vocabulary used across Madrona components:
//! - `checkout` - Cart, order creation, and payment reconciliation
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, and order status

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
