//! Commerce backend catalog client.
//!
//! The validator reconciles cart lines against *live* catalog records, so
//! catalog reads are never cached here.

use std::sync::Arc;

use async_trait::async_trait;
use madrona_core::{ColorId, ProductId, SizeId};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::CheckoutConfig;
use crate::http::{ApiError, read_json};

/// Catalog publish state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    /// Visible and purchasable.
    Published,
    /// Not yet published.
    Draft,
    /// Withdrawn from sale.
    Archived,
}

impl PublishStatus {
    /// Whether the product can currently be sold.
    #[must_use]
    pub const fn is_for_sale(self) -> bool {
        matches!(self, Self::Published)
    }
}

/// A sellable variant of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    /// Color selector, absent for color-less variants.
    pub color_id: Option<ColorId>,
    /// Size selector, absent for size-less variants.
    pub size_id: Option<SizeId>,
    /// Current unit price.
    pub price: Decimal,
    /// Current available stock.
    pub stock: u32,
}

/// A catalog product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product identity.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Publish state.
    pub publish_status: PublishStatus,
    /// Product-level price, authoritative for variantless products.
    pub price: Decimal,
    /// Product-level stock, authoritative for variantless products.
    pub stock: u32,
    /// Variants; empty for variantless products.
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
}

impl Product {
    /// Whether this product sells through variants.
    #[must_use]
    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Find the variant matching a color/size selector pair.
    #[must_use]
    pub fn find_variant(
        &self,
        color_id: Option<&ColorId>,
        size_id: Option<&SizeId>,
    ) -> Option<&ProductVariant> {
        self.variants
            .iter()
            .find(|v| v.color_id.as_ref() == color_id && v.size_id.as_ref() == size_id)
    }
}

/// Source of live catalog records.
///
/// The validator is generic over this trait so tests can substitute an
/// in-memory catalog for the HTTP client.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the current record for a product.
    ///
    /// Returns `Ok(None)` when the product no longer exists, which is a
    /// validation outcome rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error for network or server failures.
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, ApiError>;
}

/// HTTP client for the commerce backend's catalog endpoints.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl CatalogClient {
    /// Create a new catalog client.
    #[must_use]
    pub fn new(config: &CheckoutConfig) -> Self {
        Self {
            inner: Arc::new(CatalogClientInner {
                client: reqwest::Client::new(),
                base_url: config.commerce_api_url.clone(),
                api_token: config.commerce_api_token.expose_secret().to_string(),
            }),
        }
    }

    /// Fetch a product by id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the product does not exist, or an
    /// error for network and server failures.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let url = format!("{}/products/{}", self.inner.base_url, id);
        let response = self
            .inner
            .client
            .get(&url)
            .bearer_auth(&self.inner.api_token)
            .send()
            .await?;
        read_json(response, &format!("product {id}")).await
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>, ApiError> {
        match self.get_product(id).await {
            Ok(product) => Ok(Some(product)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
