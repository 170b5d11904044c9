//! Cart data model.
//!
//! The cart is an ordered collection of lines plus derived aggregates. It is
//! persisted as a single JSON value; every mutation replaces the whole value
//! so a reload can never observe torn state.

use madrona_core::{CartLineId, OrderId, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::variant::VariantKey;

/// One entry in the cart, identified by its `(product, variant)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Local cart-line identity (stable across quantity edits).
    pub id: CartLineId,
    /// The product this line refers to.
    pub product_id: ProductId,
    /// Variant selection, absent for variantless products.
    pub variant: Option<VariantKey>,
    /// Requested quantity, always >= 1.
    pub quantity: u32,
    /// Unit price as last reconciled against the catalog.
    pub unit_price: Decimal,
    /// Available stock as last reconciled against the catalog.
    pub available_stock: u32,
    /// `unit_price * quantity`, maintained by [`CartItem::recompute_subtotal`].
    pub subtotal: Decimal,
}

impl CartItem {
    /// Recompute the line subtotal from quantity and unit price.
    pub fn recompute_subtotal(&mut self) {
        self.subtotal = self.unit_price * Decimal::from(self.quantity);
    }

    /// Whether this line has the same identity as `(product_id, variant)`.
    ///
    /// Precedence rules:
    /// - both sides have a variant: match iff the keys are equal
    /// - exactly one side has a variant: never a match (distinct lines)
    /// - neither side has a variant: match on product alone (legacy carts)
    #[must_use]
    pub fn same_identity(&self, product_id: &ProductId, variant: Option<&VariantKey>) -> bool {
        match (&self.variant, variant) {
            (Some(mine), Some(theirs)) => mine == theirs,
            (None, None) => self.product_id == *product_id,
            _ => false,
        }
    }
}

/// Position in the checkout wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Reviewing cart contents.
    #[default]
    Cart,
    /// Entering shipping details.
    Shipping,
    /// Selecting and approving payment.
    Payment,
    /// Order placed, payment confirmed.
    Confirmation,
}

/// The durable, client-local cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Cart {
    /// Cart lines, in insertion order.
    pub items: Vec<CartItem>,
    /// Sum of all line quantities.
    pub total_items: u32,
    /// Sum of all line subtotals.
    pub subtotal: Decimal,
    /// Applied discount. Zeroed when the cart empties.
    pub discount: Decimal,
    /// Shipping cost. Zeroed when the cart empties.
    pub shipping: Decimal,
    /// `subtotal - discount + shipping`.
    pub total: Decimal,
    /// Checkout wizard position.
    pub active_step: CheckoutStep,
    /// Set once an order has been created but payment is not yet confirmed.
    pub pending_order_id: Option<OrderId>,
}

impl Cart {
    /// Re-derive all aggregates from the current lines.
    ///
    /// Discount and shipping are zeroed when the cart becomes empty.
    pub fn recompute_totals(&mut self) {
        for item in &mut self.items {
            item.recompute_subtotal();
        }
        self.total_items = self.items.iter().map(|i| i.quantity).sum();
        self.subtotal = self.items.iter().map(|i| i.subtotal).sum();
        if self.items.is_empty() {
            self.discount = Decimal::ZERO;
            self.shipping = Decimal::ZERO;
        }
        self.total = self.subtotal - self.discount + self.shipping;
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A non-fatal notice surfaced by a cart mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartNotice {
    /// A requested quantity was clamped to the available stock.
    MaxQuantity {
        product_id: ProductId,
        available_stock: u32,
    },
}

impl std::fmt::Display for CartNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MaxQuantity {
                product_id,
                available_stock,
            } => write!(
                f,
                "only {available_stock} of product {product_id} available"
            ),
        }
    }
}

/// Input for [`super::CartStore::add_item`].
#[derive(Debug, Clone)]
pub struct AddItemRequest {
    /// Product to add.
    pub product_id: ProductId,
    /// Variant selection, absent for variantless products.
    pub variant: Option<VariantKey>,
    /// Requested quantity.
    pub quantity: u32,
    /// Unit price from the catalog at add time.
    pub unit_price: Decimal,
    /// Available stock from the catalog at add time.
    pub available_stock: u32,
}
