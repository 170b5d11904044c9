//! Structured variant identity.
//!
//! A cart line is identified by its product plus an optional variant key.
//! The key is structured (`product_id` + optional color + optional size)
//! rather than the legacy composite string, so product IDs containing the
//! separator character cannot corrupt the identity.

use madrona_core::{ColorId, ProductId, SizeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel token for a variant with no color dimension.
const NO_COLOR: &str = "nocolor";
/// Sentinel token for a variant with no size dimension.
const NO_SIZE: &str = "nosize";
/// Sentinel token for the product's default variant.
const DEFAULT: &str = "default";

/// Structured identity of a product variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    /// The owning product.
    pub product_id: ProductId,
    /// Color selector, if the variant has a color dimension.
    pub color_id: Option<ColorId>,
    /// Size selector, if the variant has a size dimension.
    pub size_id: Option<SizeId>,
}

impl VariantKey {
    /// Create a variant key.
    #[must_use]
    pub const fn new(
        product_id: ProductId,
        color_id: Option<ColorId>,
        size_id: Option<SizeId>,
    ) -> Self {
        Self {
            product_id,
            color_id,
            size_id,
        }
    }

    /// The legacy composite string (`productId-colorSel-sizeSel`).
    ///
    /// Kept for interoperability with carts persisted by older clients.
    #[must_use]
    pub fn legacy_string(&self) -> String {
        if self.color_id.is_none() && self.size_id.is_none() {
            return format!("{}-{DEFAULT}", self.product_id);
        }
        let color = self
            .color_id
            .as_ref()
            .map_or(NO_COLOR, madrona_core::ColorId::as_str);
        let size = self
            .size_id
            .as_ref()
            .map_or(NO_SIZE, madrona_core::SizeId::as_str);
        format!("{}-{color}-{size}", self.product_id)
    }

    /// Parse a legacy composite string for a known product.
    ///
    /// The product ID must be supplied so the prefix can be stripped exactly;
    /// splitting on the separator alone would misparse any product ID that
    /// itself contains `-`. Selectors containing the separator are still
    /// ambiguous in the legacy format and are rejected.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` does not start with `{product_id}-` or the
    /// remainder is not `default` or exactly `color-size`.
    pub fn parse_legacy(raw: &str, product_id: &ProductId) -> Result<Self, VariantKeyError> {
        let rest = raw
            .strip_prefix(product_id.as_str())
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(|| VariantKeyError::WrongProduct {
                raw: raw.to_string(),
                product_id: product_id.clone(),
            })?;

        if rest == DEFAULT {
            return Ok(Self::new(product_id.clone(), None, None));
        }

        let Some((color, size)) = rest.split_once('-') else {
            return Err(VariantKeyError::Malformed(raw.to_string()));
        };
        if color.is_empty() || size.is_empty() || size.contains('-') {
            return Err(VariantKeyError::Malformed(raw.to_string()));
        }

        let color_id = (color != NO_COLOR).then(|| ColorId::new(color));
        let size_id = (size != NO_SIZE).then(|| SizeId::new(size));
        Ok(Self::new(product_id.clone(), color_id, size_id))
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.legacy_string())
    }
}

/// Errors parsing a legacy variant string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VariantKeyError {
    /// The string does not belong to the given product.
    #[error("variant string '{raw}' does not match product '{product_id}'")]
    WrongProduct { raw: String, product_id: ProductId },

    /// The string is not `{product}-default` or `{product}-{color}-{size}`.
    #[error("malformed variant string: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color_and_size() {
        let key = VariantKey::parse_legacy("P1-red-M", &ProductId::new("P1")).expect("parse");
        assert_eq!(key.product_id, ProductId::new("P1"));
        assert_eq!(key.color_id, Some(ColorId::new("red")));
        assert_eq!(key.size_id, Some(SizeId::new("M")));
    }

    #[test]
    fn test_parse_sentinels() {
        let key =
            VariantKey::parse_legacy("P1-nocolor-XL", &ProductId::new("P1")).expect("parse");
        assert_eq!(key.color_id, None);
        assert_eq!(key.size_id, Some(SizeId::new("XL")));

        let key =
            VariantKey::parse_legacy("P1-blue-nosize", &ProductId::new("P1")).expect("parse");
        assert_eq!(key.color_id, Some(ColorId::new("blue")));
        assert_eq!(key.size_id, None);

        let key = VariantKey::parse_legacy("P1-default", &ProductId::new("P1")).expect("parse");
        assert_eq!(key.color_id, None);
        assert_eq!(key.size_id, None);
    }

    #[test]
    fn test_parse_product_id_containing_separator() {
        // Supplying the product ID disambiguates the prefix.
        let product_id = ProductId::new("P-100");
        let key = VariantKey::parse_legacy("P-100-red-M", &product_id).expect("parse");
        assert_eq!(key.color_id, Some(ColorId::new("red")));
        assert_eq!(key.size_id, Some(SizeId::new("M")));
    }

    #[test]
    fn test_parse_rejects_wrong_product() {
        let err = VariantKey::parse_legacy("P2-red-M", &ProductId::new("P1"))
            .expect_err("should reject");
        assert!(matches!(err, VariantKeyError::WrongProduct { .. }));
    }

    #[test]
    fn test_parse_rejects_malformed_remainder() {
        let product_id = ProductId::new("P1");
        assert!(matches!(
            VariantKey::parse_legacy("P1-red", &product_id),
            Err(VariantKeyError::Malformed(_))
        ));
        // Extra separators in the selector section are ambiguous.
        assert!(matches!(
            VariantKey::parse_legacy("P1-red-M-extra", &product_id),
            Err(VariantKeyError::Malformed(_))
        ));
    }

    #[test]
    fn test_legacy_roundtrip() {
        let keys = [
            VariantKey::new(
                ProductId::new("P1"),
                Some(ColorId::new("red")),
                Some(SizeId::new("M")),
            ),
            VariantKey::new(ProductId::new("P1"), None, Some(SizeId::new("M"))),
            VariantKey::new(ProductId::new("P1"), Some(ColorId::new("red")), None),
            VariantKey::new(ProductId::new("P1"), None, None),
        ];
        for key in keys {
            let raw = key.legacy_string();
            let parsed = VariantKey::parse_legacy(&raw, &key.product_id).expect("roundtrip");
            assert_eq!(parsed, key, "roundtrip of {raw}");
        }
    }
}
