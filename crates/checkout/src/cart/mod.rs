//! Durable cart with identity-aware merge and stock clamping.
//!
//! # Concurrency model
//!
//! Cart mutations execute on a single logical writer (the active session).
//! Every operation is read-modify-write against the injected store and
//! commits the whole cart in one atomic replacement. There is no cross-tab
//! locking; concurrent edits from two sessions are last-write-wins.

pub mod types;
pub mod validator;
pub mod variant;

use std::sync::Arc;

use madrona_core::{CartLineId, OrderId};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::storage::{KeyValueStore, StorageError, keys};

pub use types::{AddItemRequest, Cart, CartItem, CartNotice, CheckoutStep};
pub use validator::{CartValidator, IssueKind, ValidationIssue, ValidationReport};
pub use variant::VariantKey;

/// Errors from cart mutations.
///
/// These are fatal to the requested mutation: the persisted cart is left
/// untouched. Clamping is not an error; it surfaces as a [`CartNotice`].
#[derive(Debug, Error)]
pub enum CartError {
    /// Requested quantity was zero.
    #[error("Requested quantity must be at least 1")]
    InvalidQuantity,

    /// The product has no available stock.
    #[error("Product {0} is out of stock")]
    OutOfStock(madrona_core::ProductId),

    /// No cart line with the given id.
    #[error("Cart line not found: {0}")]
    LineNotFound(CartLineId),

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result of a successful cart mutation.
#[derive(Debug, Clone)]
pub struct CartUpdate {
    /// The cart as persisted after the mutation.
    pub cart: Cart,
    /// Non-fatal notice, e.g. a quantity clamped to available stock.
    pub notice: Option<CartNotice>,
}

/// Owner of the durable, client-local cart.
#[derive(Clone)]
pub struct CartStore {
    store: Arc<dyn KeyValueStore>,
}

impl CartStore {
    /// Create a cart store over an injected key-value store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the persisted cart, or an empty cart on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get(&self) -> Result<Cart, CartError> {
        Ok(keys::CART.get(&*self.store)?.unwrap_or_default())
    }

    /// Persist the cart as a single atomic replacement.
    fn commit(&self, cart: &Cart) -> Result<(), CartError> {
        keys::CART.set(&*self.store, cart)?;
        Ok(())
    }

    /// Add an item, merging with an existing line of the same identity.
    ///
    /// Merge precedence for `(product_id, variant)` is documented on
    /// [`CartItem::same_identity`]. Quantities are clamped to
    /// `available_stock`; clamping surfaces a [`CartNotice::MaxQuantity`]
    /// rather than rejecting the add.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` if the requested quantity is zero and
    /// `OutOfStock` if the product has no stock; neither mutates the cart.
    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub fn add_item(&self, request: AddItemRequest) -> Result<CartUpdate, CartError> {
        if request.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if request.available_stock == 0 {
            return Err(CartError::OutOfStock(request.product_id));
        }

        let mut cart = self.get()?;
        let mut notice = None;

        let existing = cart
            .items
            .iter_mut()
            .find(|line| line.same_identity(&request.product_id, request.variant.as_ref()));

        if let Some(line) = existing {
            // Refresh stock from the caller's catalog snapshot, then clamp.
            line.available_stock = request.available_stock;
            let wanted = line.quantity.saturating_add(request.quantity);
            if wanted > line.available_stock {
                line.quantity = line.available_stock;
                notice = Some(CartNotice::MaxQuantity {
                    product_id: request.product_id,
                    available_stock: line.available_stock,
                });
            } else {
                line.quantity = wanted;
            }
        } else {
            let quantity = if request.quantity > request.available_stock {
                notice = Some(CartNotice::MaxQuantity {
                    product_id: request.product_id.clone(),
                    available_stock: request.available_stock,
                });
                request.available_stock
            } else {
                request.quantity
            };
            cart.items.push(CartItem {
                id: CartLineId::new(Uuid::new_v4().to_string()),
                product_id: request.product_id,
                variant: request.variant,
                quantity,
                unit_price: request.unit_price,
                available_stock: request.available_stock,
                subtotal: rust_decimal::Decimal::ZERO,
            });
        }

        cart.recompute_totals();
        self.commit(&cart)?;
        Ok(CartUpdate { cart, notice })
    }

    /// Increase a line's quantity by one, clamped to its available stock.
    ///
    /// Increasing at the ceiling is a no-op with a notice, not an error.
    ///
    /// # Errors
    ///
    /// Returns `LineNotFound` if no line has the given id.
    #[instrument(skip(self))]
    pub fn increase_quantity(&self, id: &CartLineId) -> Result<CartUpdate, CartError> {
        let mut cart = self.get()?;
        let line = cart
            .items
            .iter_mut()
            .find(|line| line.id == *id)
            .ok_or_else(|| CartError::LineNotFound(id.clone()))?;

        if line.quantity >= line.available_stock {
            let notice = CartNotice::MaxQuantity {
                product_id: line.product_id.clone(),
                available_stock: line.available_stock,
            };
            return Ok(CartUpdate {
                cart,
                notice: Some(notice),
            });
        }

        line.quantity += 1;
        cart.recompute_totals();
        self.commit(&cart)?;
        Ok(CartUpdate { cart, notice: None })
    }

    /// Decrease a line's quantity by one, clamped to a minimum of one.
    ///
    /// Decreasing at one is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `LineNotFound` if no line has the given id.
    #[instrument(skip(self))]
    pub fn decrease_quantity(&self, id: &CartLineId) -> Result<CartUpdate, CartError> {
        let mut cart = self.get()?;
        let line = cart
            .items
            .iter_mut()
            .find(|line| line.id == *id)
            .ok_or_else(|| CartError::LineNotFound(id.clone()))?;

        if line.quantity <= 1 {
            return Ok(CartUpdate { cart, notice: None });
        }

        line.quantity -= 1;
        cart.recompute_totals();
        self.commit(&cart)?;
        Ok(CartUpdate { cart, notice: None })
    }

    /// Remove a line unconditionally. Removing an absent id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    #[instrument(skip(self))]
    pub fn remove_item(&self, id: &CartLineId) -> Result<Cart, CartError> {
        let mut cart = self.get()?;
        cart.items.retain(|line| line.id != *id);
        cart.recompute_totals();
        self.commit(&cart)?;
        Ok(cart)
    }

    /// Replace all lines in one atomic commit, preserving the wizard state.
    ///
    /// Used by the validator to apply per-line reconciliation outcomes as a
    /// single write, so partial validation failures never leave the cart
    /// half-updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn replace_items(&self, items: Vec<CartItem>) -> Result<Cart, CartError> {
        let mut cart = self.get()?;
        cart.items = items;
        cart.recompute_totals();
        self.commit(&cart)?;
        Ok(cart)
    }

    /// Move the checkout wizard to a new step.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn set_active_step(&self, step: CheckoutStep) -> Result<Cart, CartError> {
        let mut cart = self.get()?;
        cart.active_step = step;
        self.commit(&cart)?;
        Ok(cart)
    }

    /// Record (or clear) the order awaiting payment confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn set_pending_order(&self, order_id: Option<OrderId>) -> Result<Cart, CartError> {
        let mut cart = self.get()?;
        cart.pending_order_id = order_id;
        self.commit(&cart)?;
        Ok(cart)
    }

    /// Reset the cart to empty. Called on checkout completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    #[instrument(skip(self))]
    pub fn clear(&self) -> Result<Cart, CartError> {
        let cart = Cart::default();
        self.commit(&cart)?;
        Ok(cart)
    }
}
