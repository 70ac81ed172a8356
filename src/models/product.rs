//! Catalog product and price observation models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product listing as extracted from one rendered container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProduct {
    pub name: String,
    pub price: f64,
    /// Absolute product URL, empty when the container carries no link.
    pub url: String,
    pub image_url: Option<String>,
    pub brand: Option<String>,
    pub rating: Option<f64>,
    pub stock: Option<i32>,
    pub description: Option<String>,
    pub sku: Option<String>,
}

impl ExtractedProduct {
    /// Create a record with only the required fields set.
    pub fn new(name: impl Into<String>, price: f64, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price,
            url: url.into(),
            image_url: None,
            brand: None,
            rating: None,
            stock: None,
            description: None,
            sku: None,
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }
}

/// Catalog identity of a product, keyed by `(name, brand)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One price observation for a product at a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub id: i32,
    pub product_id: i32,
    pub source_id: i32,
    pub price: f64,
    pub stock: Option<i32>,
    pub rating: Option<f64>,
    pub url: String,
    pub observed_at: DateTime<Utc>,
}

/// Result of a product upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Canonical product id.
    pub id: i32,
    /// True when this call created the row.
    pub created: bool,
}

/// Result of appending a price observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceInsert {
    /// A new snapshot row was written.
    Inserted,
    /// The product already has a snapshot for this source today.
    Duplicate,
}
