//! Supplier return workflow
//!
//! Returns record goods going back to a supplier. Status changes are
//! administrative and never move stock.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    normalize_text, validate_return_input, NewReturn, NewReturnDetail, Return, ReturnInput,
    ReturnStatus, ReturnStatusUpdate, ReturnWithDetails, Visibility,
};

use crate::error::{AppError, AppResult};
use crate::services::access::{require_actor, Access};
use crate::store::Store;

#[derive(Clone)]
pub struct ReturnService {
    store: Arc<dyn Store>,
}

impl ReturnService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a return header and its detail lines; status starts at PENDING
    pub async fn create_return(
        &self,
        acting_employee_id: i64,
        input: ReturnInput,
    ) -> AppResult<ReturnWithDetails> {
        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::PostInventory).await?;

        validate_return_input(&input).map_err(|v| AppError::from_rule("return", v))?;

        let return_number = normalize_text(input.return_number.as_deref())
            .ok_or_else(|| AppError::validation("return_number", "Return number is required"))?;
        let supplier_id = input
            .supplier_id
            .ok_or_else(|| AppError::validation("supplier_id", "Supplier ID is required"))?;
        let return_date = input
            .return_date
            .ok_or_else(|| AppError::validation("return_date", "Return date is required"))?;

        if uow.return_by_number(&return_number).await?.is_some() {
            return Err(AppError::conflict("Return", "Return number already exists"));
        }

        uow.supplier(supplier_id, Visibility::Active)
            .await?
            .ok_or_else(|| AppError::validation("supplier_id", "Invalid supplier ID"))?;

        let returned_by = match input.returned_by {
            Some(id) if id != actor.id => {
                uow.employee(id, Visibility::Active)
                    .await?
                    .ok_or_else(|| AppError::validation("returned_by", "Invalid employee ID"))?;
                id
            }
            _ => actor.id,
        };

        let header = uow
            .insert_return(&NewReturn {
                return_number,
                supplier_id,
                returned_by,
                return_date,
                return_type: input.return_type.unwrap_or_default(),
                reason: normalize_text(input.reason.as_deref()),
                remarks: normalize_text(input.remarks.as_deref()),
            })
            .await?;

        let mut details = Vec::with_capacity(input.details.len());
        for detail in &input.details {
            let (Some(variation_id), Some(quantity)) = (detail.variation_id, detail.quantity) else {
                return Err(AppError::validation(
                    "details",
                    "Every return detail needs a variation and a quantity",
                ));
            };

            uow.variation(variation_id, Visibility::Active)
                .await?
                .ok_or_else(|| {
                    AppError::validation(
                        "details.variation_id",
                        format!("Invalid variation ID: {}", variation_id),
                    )
                })?;

            let row = uow
                .insert_return_detail(
                    header.id,
                    &NewReturnDetail {
                        variation_id,
                        quantity_returned: quantity,
                        remarks: normalize_text(detail.remarks.as_deref()),
                    },
                )
                .await?;
            details.push(row);
        }

        uow.commit().await?;

        tracing::info!(
            "Created return {} (id {}) with {} lines",
            header.return_number,
            header.id,
            details.len()
        );

        Ok(ReturnWithDetails { header, details })
    }

    pub async fn get_return(
        &self,
        acting_employee_id: i64,
        return_id: i64,
    ) -> AppResult<ReturnWithDetails> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;

        let header = uow
            .goods_return(return_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Return {}", return_id)))?;
        let details = uow.return_details(return_id).await?;

        Ok(ReturnWithDetails { header, details })
    }

    /// Move a return to another status.
    ///
    /// Terminal statuses are final, and an approved return cannot go back to
    /// pending. Approval sets the approved flag.
    pub async fn update_return_status(
        &self,
        acting_employee_id: i64,
        return_id: i64,
        update: ReturnStatusUpdate,
    ) -> AppResult<Return> {
        let mut uow = self.store.begin().await?;
        let actor =
            require_actor(uow.as_mut(), acting_employee_id, Access::AdministerReturns).await?;

        let mut goods_return = uow
            .goods_return(return_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Return {}", return_id)))?;

        let current = goods_return.status;
        if current.is_terminal()
            || (update.status == ReturnStatus::Pending && current != ReturnStatus::Pending)
        {
            return Err(AppError::InvalidStateTransition(format!(
                "Return {} cannot move from {} to {}",
                goods_return.return_number, current, update.status
            )));
        }

        goods_return.status = update.status;
        if update.status == ReturnStatus::Approved {
            goods_return.approved = true;
        }
        if update.remarks.is_some() {
            goods_return.remarks = normalize_text(update.remarks.as_deref());
        }
        goods_return.updated_at = Utc::now();

        let goods_return = uow.update_return(&goods_return).await?;
        uow.commit().await?;

        tracing::info!(
            "Return {} moved from {} to {} by employee {}",
            goods_return.return_number,
            current,
            goods_return.status,
            actor.id
        );

        Ok(goods_return)
    }
}
