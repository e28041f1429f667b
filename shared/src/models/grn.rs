//! Goods received note models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A goods received note header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grn {
    pub id: i64,
    /// Human readable number, unique across all GRNs
    pub grn_number: String,
    pub supplier_id: i64,
    pub received_by: i64,
    pub received_date: NaiveDate,
    pub total_amount: Decimal,
    pub remarks: Option<String>,
    pub stock_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One received product line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrnDetail {
    pub id: i64,
    pub grn_id: i64,
    pub product_id: i64,
    pub quantity_received: i64,
    pub unit_cost: Decimal,
    /// Always `quantity_received * unit_cost`
    pub subtotal: Decimal,
    pub location: Option<String>,
}

/// Request to create a GRN. Every field is optional so that missing
/// input is reported as a validation failure rather than a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrnInput {
    pub grn_number: Option<String>,
    pub supplier_id: Option<i64>,
    pub received_date: Option<NaiveDate>,
    /// Defaults to the acting employee
    pub received_by: Option<i64>,
    pub total_amount: Option<Decimal>,
    pub remarks: Option<String>,
    pub stock_id: Option<i64>,
    #[serde(default)]
    pub details: Vec<GrnDetailInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrnDetailInput {
    pub product_id: Option<i64>,
    pub quantity_received: Option<i64>,
    pub unit_cost: Option<Decimal>,
    pub location: Option<String>,
}

/// Validated header values handed to the store
#[derive(Debug, Clone)]
pub struct NewGrn {
    pub grn_number: String,
    pub supplier_id: i64,
    pub received_by: i64,
    pub received_date: NaiveDate,
    pub total_amount: Decimal,
    pub remarks: Option<String>,
    pub stock_id: Option<i64>,
}

/// Validated detail values with the subtotal already computed
#[derive(Debug, Clone)]
pub struct NewGrnDetail {
    pub product_id: i64,
    pub quantity_received: i64,
    pub unit_cost: Decimal,
    pub subtotal: Decimal,
    pub location: Option<String>,
}

/// Mutable header fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrnUpdate {
    pub remarks: Option<String>,
    pub total_amount: Option<Decimal>,
}

/// Result of creating a GRN
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrnCreated {
    pub grn: Grn,
    pub details: Vec<GrnDetail>,
    pub calculated_total: Decimal,
    /// Non-fatal input problems, such as a stock reference that did not resolve
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrnWithDetails {
    pub grn: Grn,
    pub details: Vec<GrnDetail>,
}
