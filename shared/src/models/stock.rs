//! Stock and stock transaction models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BinCardEntry, BinCardType};

/// Location used when a transaction line does not name one
pub const DEFAULT_LOCATION: &str = "MAIN";

/// Quantity on hand for one (product, variation, location)
///
/// Mutated in place by every stock transaction; never historical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stock {
    pub id: i64,
    pub product_id: i64,
    pub variation_id: Option<i64>,
    pub quantity_available: i64,
    pub reorder_level: i64,
    pub location: String,
    pub last_updated: DateTime<Utc>,
}

impl Stock {
    pub fn key(&self) -> StockKey {
        StockKey {
            variation_id: self.variation_id,
            product_id: self.product_id,
            location: self.location.clone(),
        }
    }

    pub fn is_low(&self) -> bool {
        self.quantity_available <= self.reorder_level
    }
}

/// Identity of a stock row. Ordered variation first, which is also the
/// order in which a transaction acquires its row locks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub variation_id: Option<i64>,
    pub product_id: i64,
    pub location: String,
}

/// Direction of a stock transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StockDirection {
    In,
    Out,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::In => "IN",
            StockDirection::Out => "OUT",
        }
    }

    /// Bin card transaction type recorded for this direction
    pub fn ledger_type(&self) -> BinCardType {
        match self {
            StockDirection::In => BinCardType::Grn,
            StockDirection::Out => BinCardType::Gin,
        }
    }
}

/// Header of a stock-in or stock-out request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockTransactionInput {
    pub supplier_id: Option<i64>,
    /// Originating GRN (stock-in) or GIN (stock-out) id
    pub reference_id: Option<i64>,
    pub transaction_date: Option<NaiveDate>,
    pub remarks: Option<String>,
    #[serde(default)]
    pub lines: Vec<StockLineInput>,
}

/// One line of a stock transaction
#[derive(Debug, Clone, Deserialize)]
pub struct StockLineInput {
    pub product_id: i64,
    pub variation_id: Option<i64>,
    pub location: Option<String>,
    pub quantity: i64,
    /// Informational only; stock carries quantity, not cost
    pub unit_cost: Option<Decimal>,
    pub remarks: Option<String>,
}

impl StockLineInput {
    pub fn key(&self) -> StockKey {
        StockKey {
            variation_id: self.variation_id,
            product_id: self.product_id,
            location: self
                .location
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .unwrap_or(DEFAULT_LOCATION)
                .to_string(),
        }
    }
}

/// Values for a stock row created by a transaction
#[derive(Debug, Clone)]
pub struct NewStock {
    pub key: StockKey,
    pub reorder_level: i64,
}

/// Result of a committed stock transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockPosting {
    pub direction: StockDirection,
    pub stock: Vec<Stock>,
    pub ledger_entries: Vec<BinCardEntry>,
}
