//! Pre-checkout reconciliation of the cart against the live catalog.
//!
//! Each line is checked independently and concurrently; a failure on one
//! line never aborts the others. The merged outcome is applied to the cart
//! as a single atomic commit.

use futures::future::join_all;
use madrona_core::{CartLineId, ProductId};
use tracing::{instrument, warn};

use crate::catalog::{CatalogSource, Product};

use super::types::{Cart, CartItem};
use super::{CartError, CartStore};

/// Why a line was dropped or adjusted during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// The product no longer exists in the catalog.
    ProductMissing,
    /// The product exists but is not for sale.
    NotForSale,
    /// The product sells through variants but the line has no usable key.
    InvalidVariant,
    /// The selected variant no longer exists.
    VariantMissing,
    /// No stock remains; the line was dropped.
    OutOfStock,
    /// Requested quantity exceeded stock; the line was clamped and kept.
    QuantityClamped {
        /// Stock the quantity was clamped to.
        available_stock: u32,
    },
    /// An unexpected failure while checking this line.
    LineCheckFailed,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProductMissing => write!(f, "product no longer exists"),
            Self::NotForSale => write!(f, "not for sale"),
            Self::InvalidVariant => write!(f, "invalid variant"),
            Self::VariantMissing => write!(f, "variant no longer exists"),
            Self::OutOfStock => write!(f, "out of stock"),
            Self::QuantityClamped { available_stock } => {
                write!(f, "quantity exceeds stock (only {available_stock} left)")
            }
            Self::LineCheckFailed => write!(f, "could not validate item"),
        }
    }
}

/// A per-line validation finding.
///
/// Issues are itemized data for the UI, not errors: checkout may proceed
/// with the remaining valid lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The affected cart line.
    pub line_id: CartLineId,
    /// The product on that line.
    pub product_id: ProductId,
    /// What happened.
    pub kind: IssueKind,
}

/// Outcome of validating a whole cart.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// True when no issues were recorded.
    pub is_valid: bool,
    /// Per-line findings, in line order.
    pub issues: Vec<ValidationIssue>,
    /// The reconciled lines (dropped lines removed, clamps and price drift
    /// applied).
    pub updated_items: Vec<CartItem>,
    /// Whether `updated_items` differs from the input cart.
    pub changed: bool,
}

/// Reconciles cart contents against the live catalog before checkout.
pub struct CartValidator<C> {
    catalog: C,
}

/// What became of a single line.
struct LineOutcome {
    kept: Option<CartItem>,
    issue: Option<ValidationIssue>,
}

impl<C: CatalogSource> CartValidator<C> {
    /// Create a validator over a catalog source.
    #[must_use]
    pub const fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// Validate every line of the cart against the live catalog.
    ///
    /// Per-line failures are recorded as issues; this method itself never
    /// fails.
    #[instrument(skip(self, cart), fields(lines = cart.items.len()))]
    pub async fn validate(&self, cart: &Cart) -> ValidationReport {
        let outcomes = join_all(cart.items.iter().map(|line| self.check_line(line))).await;

        let mut issues = Vec::new();
        let mut updated_items = Vec::new();
        for outcome in outcomes {
            if let Some(item) = outcome.kept {
                updated_items.push(item);
            }
            if let Some(issue) = outcome.issue {
                issues.push(issue);
            }
        }

        let changed = updated_items != cart.items;
        ValidationReport {
            is_valid: issues.is_empty(),
            issues,
            updated_items,
            changed,
        }
    }

    /// Validate and, if anything changed or any issue was recorded, replace
    /// the persisted cart with the reconciled lines in one atomic write.
    ///
    /// # Errors
    ///
    /// Returns an error only if the atomic commit itself fails; validation
    /// findings are reported in the returned report, never as `Err`.
    pub async fn validate_and_commit(
        &self,
        store: &CartStore,
    ) -> Result<ValidationReport, CartError> {
        let cart = store.get()?;
        let report = self.validate(&cart).await;
        if report.changed || !report.is_valid {
            store.replace_items(report.updated_items.clone())?;
        }
        Ok(report)
    }

    /// Check one line. Any unexpected failure is fatal for this line only.
    async fn check_line(&self, line: &CartItem) -> LineOutcome {
        let product = match self.catalog.product(&line.product_id).await {
            Ok(Some(product)) => product,
            Ok(None) => return LineOutcome::dropped(line, IssueKind::ProductMissing),
            Err(e) => {
                warn!(
                    product_id = %line.product_id,
                    error = %e,
                    "catalog fetch failed while validating cart line"
                );
                return LineOutcome::dropped(line, IssueKind::LineCheckFailed);
            }
        };

        if !product.publish_status.is_for_sale() {
            return LineOutcome::dropped(line, IssueKind::NotForSale);
        }

        if product.has_variants() {
            Self::check_variant_line(line, &product)
        } else {
            Self::reconcile_stock_and_price(line, product.stock, product.price)
        }
    }

    fn check_variant_line(line: &CartItem, product: &Product) -> LineOutcome {
        let Some(key) = &line.variant else {
            return LineOutcome::dropped(line, IssueKind::InvalidVariant);
        };
        let Some(variant) = product.find_variant(key.color_id.as_ref(), key.size_id.as_ref())
        else {
            return LineOutcome::dropped(line, IssueKind::VariantMissing);
        };
        Self::reconcile_stock_and_price(line, variant.stock, variant.price)
    }

    /// Shared stock/price logic for variant and variantless lines.
    ///
    /// Price drift is reconciled silently; stock is always refreshed.
    fn reconcile_stock_and_price(
        line: &CartItem,
        stock: u32,
        price: rust_decimal::Decimal,
    ) -> LineOutcome {
        if stock == 0 {
            return LineOutcome::dropped(line, IssueKind::OutOfStock);
        }

        let mut updated = line.clone();
        updated.available_stock = stock;
        updated.unit_price = price;

        let issue = if updated.quantity > stock {
            updated.quantity = stock;
            Some(ValidationIssue {
                line_id: line.id.clone(),
                product_id: line.product_id.clone(),
                kind: IssueKind::QuantityClamped {
                    available_stock: stock,
                },
            })
        } else {
            None
        };

        updated.recompute_subtotal();
        LineOutcome {
            kept: Some(updated),
            issue,
        }
    }
}

impl LineOutcome {
    fn dropped(line: &CartItem, kind: IssueKind) -> Self {
        Self {
            kept: None,
            issue: Some(ValidationIssue {
                line_id: line.id.clone(),
                product_id: line.product_id.clone(),
                kind,
            }),
        }
    }
}
