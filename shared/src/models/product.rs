//! Product catalog models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{Lifecycle, SoftDelete};

/// A product family; sellable configurations are its variations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Stock keeping unit, unique among non-deleted products
    pub sku: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub lifecycle: Lifecycle,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SoftDelete for Product {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// A specific sellable configuration of a product (color/size/capacity)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariation {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub capacity: Option<String>,
    /// Unique among non-deleted variations when present
    pub barcode: Option<String>,
    pub price: Decimal,
    /// Units contained in one sellable unit of this variation
    pub quantity: i64,
    pub min_stock_level: i64,
    pub max_stock_level: Option<i64>,
    pub is_active: bool,
    pub lifecycle: Lifecycle,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SoftDelete for ProductVariation {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VariationInput {
    pub product_id: i64,
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(length(max = 50))]
    pub color: Option<String>,
    #[validate(length(max = 50))]
    pub size: Option<String>,
    #[validate(length(max = 50))]
    pub capacity: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub barcode: Option<String>,
    pub price: Decimal,
    pub quantity: Option<i64>,
    pub min_stock_level: Option<i64>,
    pub max_stock_level: Option<i64>,
    pub is_active: Option<bool>,
}
