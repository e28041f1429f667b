//! Supplier return models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Why goods are going back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnType {
    #[default]
    SupplierReturn,
    DamagedReturn,
    DefectiveReturn,
    Other,
}

impl ReturnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnType::SupplierReturn => "SUPPLIER_RETURN",
            ReturnType::DamagedReturn => "DAMAGED_RETURN",
            ReturnType::DefectiveReturn => "DEFECTIVE_RETURN",
            ReturnType::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for ReturnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUPPLIER_RETURN" => Ok(ReturnType::SupplierReturn),
            "DAMAGED_RETURN" => Ok(ReturnType::DamagedReturn),
            "DEFECTIVE_RETURN" => Ok(ReturnType::DefectiveReturn),
            "OTHER" => Ok(ReturnType::Other),
            other => Err(format!("Unknown return type: {}", other)),
        }
    }
}

/// Administrative status of a return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "PENDING",
            ReturnStatus::Approved => "APPROVED",
            ReturnStatus::Rejected => "REJECTED",
            ReturnStatus::Completed => "COMPLETED",
            ReturnStatus::Cancelled => "CANCELLED",
        }
    }

    /// No further status changes are allowed once terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReturnStatus::Rejected | ReturnStatus::Completed | ReturnStatus::Cancelled
        )
    }
}

impl std::str::FromStr for ReturnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ReturnStatus::Pending),
            "APPROVED" => Ok(ReturnStatus::Approved),
            "REJECTED" => Ok(ReturnStatus::Rejected),
            "COMPLETED" => Ok(ReturnStatus::Completed),
            "CANCELLED" => Ok(ReturnStatus::Cancelled),
            other => Err(format!("Unknown return status: {}", other)),
        }
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A return header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Return {
    pub id: i64,
    pub return_number: String,
    pub supplier_id: i64,
    pub returned_by: i64,
    pub return_date: NaiveDate,
    pub return_type: ReturnType,
    pub status: ReturnStatus,
    pub approved: bool,
    pub reason: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReturnDetail {
    pub id: i64,
    pub return_id: i64,
    pub variation_id: i64,
    pub quantity_returned: i64,
    pub remarks: Option<String>,
}

/// Request to create a return
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnInput {
    pub return_number: Option<String>,
    pub supplier_id: Option<i64>,
    /// Defaults to the acting employee
    pub returned_by: Option<i64>,
    pub return_date: Option<NaiveDate>,
    pub return_type: Option<ReturnType>,
    pub reason: Option<String>,
    pub remarks: Option<String>,
    #[serde(default)]
    pub details: Vec<ReturnDetailInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnDetailInput {
    pub variation_id: Option<i64>,
    pub quantity: Option<i64>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReturn {
    pub return_number: String,
    pub supplier_id: i64,
    pub returned_by: i64,
    pub return_date: NaiveDate,
    pub return_type: ReturnType,
    pub reason: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReturnDetail {
    pub variation_id: i64,
    pub quantity_returned: i64,
    pub remarks: Option<String>,
}

/// Administrative status change
#[derive(Debug, Clone, Deserialize)]
pub struct ReturnStatusUpdate {
    pub status: ReturnStatus,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnWithDetails {
    #[serde(rename = "return")]
    pub header: Return,
    pub details: Vec<ReturnDetail>,
}
