//! Bin card (per-variation stock ledger) models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Kind of movement recorded on the bin card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BinCardType {
    /// Goods received
    Grn,
    /// Goods issued
    Gin,
}

impl BinCardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinCardType::Grn => "GRN",
            BinCardType::Gin => "GIN",
        }
    }
}

impl std::str::FromStr for BinCardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GRN" => Ok(BinCardType::Grn),
            "GIN" => Ok(BinCardType::Gin),
            other => Err(format!("Unknown bin card type: {}", other)),
        }
    }
}

/// An immutable ledger row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinCardEntry {
    pub id: i64,
    pub variation_id: i64,
    pub transaction_date: NaiveDate,
    pub transaction_type: BinCardType,
    pub reference_id: Option<i64>,
    pub quantity_in: i64,
    pub quantity_out: i64,
    /// Balance after this entry
    pub balance: i64,
    pub stock_keeper_id: i64,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A ledger row ready to be appended; the balance is already resolved
#[derive(Debug, Clone)]
pub struct NewBinCardEntry {
    pub variation_id: i64,
    pub transaction_date: NaiveDate,
    pub transaction_type: BinCardType,
    pub reference_id: Option<i64>,
    pub quantity_in: i64,
    pub quantity_out: i64,
    pub balance: i64,
    pub stock_keeper_id: i64,
    pub remarks: Option<String>,
}

/// Reconciliation of a variation's ledger against its stock rows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerCheck {
    pub variation_id: i64,
    pub ledger_balance: i64,
    pub stock_quantity: i64,
    pub consistent: bool,
}
