//! Employee and role models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{Lifecycle, SoftDelete};

/// An employee who can act on the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub role: EmployeeRole,
    pub is_active: bool,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SoftDelete for Employee {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Roles that gate what an employee may do
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmployeeRole {
    StockKeeper,
    Manager,
    Admin,
    Viewer,
}

impl EmployeeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeRole::StockKeeper => "STOCK_KEEPER",
            EmployeeRole::Manager => "MANAGER",
            EmployeeRole::Admin => "ADMIN",
            EmployeeRole::Viewer => "VIEWER",
        }
    }

    /// Post GRNs, stock movements and returns
    pub fn can_post_inventory(&self) -> bool {
        matches!(
            self,
            EmployeeRole::StockKeeper | EmployeeRole::Manager | EmployeeRole::Admin
        )
    }

    /// Create, edit and delete suppliers, products and variations
    pub fn can_manage_catalog(&self) -> bool {
        matches!(self, EmployeeRole::Manager | EmployeeRole::Admin)
    }

    /// Move returns through their administrative statuses
    pub fn can_administer_returns(&self) -> bool {
        matches!(self, EmployeeRole::Manager | EmployeeRole::Admin)
    }
}

impl std::str::FromStr for EmployeeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STOCK_KEEPER" => Ok(EmployeeRole::StockKeeper),
            "MANAGER" => Ok(EmployeeRole::Manager),
            "ADMIN" => Ok(EmployeeRole::Admin),
            "VIEWER" => Ok(EmployeeRole::Viewer),
            other => Err(format!("Unknown employee role: {}", other)),
        }
    }
}

impl std::fmt::Display for EmployeeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for registering an employee
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmployeeInput {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub role: EmployeeRole,
}
