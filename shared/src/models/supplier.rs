//! Supplier models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{Lifecycle, SoftDelete};

/// A supplier goods are received from and returned to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub lifecycle: Lifecycle,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SoftDelete for Supplier {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Input for creating or replacing a supplier
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SupplierInput {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(length(max = 150))]
    pub contact_person: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}
