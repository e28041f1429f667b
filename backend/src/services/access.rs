//! Resolution of the acting employee for every workflow call

use shared::{Employee, EmployeeRole, Visibility};

use crate::error::{AppError, AppResult};
use crate::store::UnitOfWork;

/// What a workflow call is about to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    PostInventory,
    ManageCatalog,
    AdministerReturns,
}

impl Access {
    pub fn permits(&self, role: EmployeeRole) -> bool {
        match self {
            Access::Read => true,
            Access::PostInventory => role.can_post_inventory(),
            Access::ManageCatalog => role.can_manage_catalog(),
            Access::AdministerReturns => role.can_administer_returns(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Access::Read => "read inventory data",
            Access::PostInventory => "post inventory transactions",
            Access::ManageCatalog => "manage the catalog",
            Access::AdministerReturns => "administer returns",
        }
    }
}

/// Resolve the acting employee before any other entity is touched.
///
/// An unknown, inactive or deleted employee is `Unauthorized`; a role that
/// may not perform `access` is `Forbidden`.
pub async fn require_actor(
    uow: &mut dyn UnitOfWork,
    employee_id: i64,
    access: Access,
) -> AppResult<Employee> {
    let employee = uow
        .employee(employee_id, Visibility::Active)
        .await?
        .ok_or_else(|| AppError::Unauthorized("No valid session for this employee".to_string()))?;

    if !access.permits(employee.role) {
        return Err(AppError::Forbidden(format!(
            "Role {} may not {}",
            employee.role,
            access.describe()
        )));
    }

    Ok(employee)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_matrix() {
        assert!(Access::Read.permits(EmployeeRole::Viewer));
        assert!(!Access::PostInventory.permits(EmployeeRole::Viewer));
        assert!(Access::PostInventory.permits(EmployeeRole::StockKeeper));
        assert!(!Access::ManageCatalog.permits(EmployeeRole::StockKeeper));
        assert!(Access::ManageCatalog.permits(EmployeeRole::Manager));
        assert!(Access::AdministerReturns.permits(EmployeeRole::Admin));
        assert!(!Access::AdministerReturns.permits(EmployeeRole::StockKeeper));
    }
}
