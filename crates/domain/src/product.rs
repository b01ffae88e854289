//! Catalog product and variant types.
//!
//! The storefront core only reads product data and mutates per-variant
//! stock through the inventory ledger; everything else about the catalog
//! belongs to its own service.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::Money;

/// A product image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

/// A (product, size) combination with its own stock counter and SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub size: String,
    pub stock: u32,
    /// Globally unique stock-keeping unit.
    pub sku: String,
}

/// A catalog product as seen by the order core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub is_active: bool,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    pub variants: Vec<Variant>,
}

impl Product {
    /// Looks up the variant for a size, if it exists.
    pub fn variant(&self, size: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.size == size)
    }

    /// Returns the primary image URL, falling back to the first image.
    pub fn primary_image(&self) -> Option<&str> {
        self.images
            .iter()
            .find(|img| img.is_primary)
            .or_else(|| self.images.first())
            .map(|img| img.url.as_str())
    }

    /// Total stock across all variants.
    pub fn total_stock(&self) -> u32 {
        self.variants.iter().map(|v| v.stock).sum()
    }

    /// Returns true if the given size has at least one unit in stock.
    pub fn in_stock(&self, size: &str) -> bool {
        self.variant(size).is_some_and(|v| v.stock > 0)
    }
}
