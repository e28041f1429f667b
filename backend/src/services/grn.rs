//! Goods received note workflow

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    aggregate_total, line_subtotal, normalize_text, validate_grn_details, validate_grn_header,
    Grn, GrnCreated, GrnInput, GrnUpdate, GrnWithDetails, NewGrn, NewGrnDetail, Visibility,
};

use crate::error::{AppError, AppResult};
use crate::services::access::{require_actor, Access};
use crate::store::Store;

/// Service for GRN intake and maintenance
#[derive(Clone)]
pub struct GrnService {
    store: Arc<dyn Store>,
}

fn required<T>(value: Option<T>, field: &str, message: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::validation(field, message))
}

impl GrnService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a GRN header and its detail lines.
    ///
    /// Checks run in a fixed order: header presence, detail completeness,
    /// number uniqueness, supplier, then each detail's product. Subtotals
    /// are always computed here. When no total is supplied the header's
    /// total becomes the sum of the subtotals.
    pub async fn create_grn(
        &self,
        acting_employee_id: i64,
        input: GrnInput,
    ) -> AppResult<GrnCreated> {
        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::PostInventory).await?;

        validate_grn_header(&input).map_err(|v| AppError::from_rule("GRN", v))?;
        validate_grn_details(&input.details).map_err(|v| AppError::from_rule("GRN", v))?;

        let grn_number = required(
            normalize_text(input.grn_number.as_deref()),
            "grn_number",
            "GRN number is required",
        )?;
        let supplier_id = required(input.supplier_id, "supplier_id", "Supplier ID is required")?;
        let received_date = required(
            input.received_date,
            "received_date",
            "Received date is required",
        )?;

        if uow.grn_by_number(&grn_number, None).await?.is_some() {
            return Err(AppError::conflict("GRN", "GRN number already exists"));
        }

        uow.supplier(supplier_id, Visibility::Active)
            .await?
            .ok_or_else(|| AppError::validation("supplier_id", "Invalid supplier ID"))?;

        let received_by = match input.received_by {
            Some(id) if id != actor.id => {
                uow.employee(id, Visibility::Active)
                    .await?
                    .ok_or_else(|| AppError::validation("received_by", "Invalid employee ID"))?;
                id
            }
            _ => actor.id,
        };

        let mut warnings = Vec::new();
        let stock_id = match input.stock_id {
            Some(id) if uow.stock(id).await?.is_none() => {
                tracing::warn!(
                    "GRN {} references unknown stock {}; saving without a stock reference",
                    grn_number,
                    id
                );
                warnings.push(format!(
                    "Stock {} does not exist; the GRN was saved without a stock reference",
                    id
                ));
                None
            }
            other => other,
        };

        if matches!(input.total_amount, Some(total) if total < Decimal::ZERO) {
            return Err(AppError::validation(
                "total_amount",
                "Total amount cannot be negative",
            ));
        }

        let mut grn = uow
            .insert_grn(&NewGrn {
                grn_number,
                supplier_id,
                received_by,
                received_date,
                total_amount: input.total_amount.unwrap_or(Decimal::ZERO),
                remarks: normalize_text(input.remarks.as_deref()),
                stock_id,
            })
            .await?;

        let mut details = Vec::with_capacity(input.details.len());
        for detail in &input.details {
            let product_id = required(
                detail.product_id,
                "details.product_id",
                "Product ID is required",
            )?;
            let quantity_received = required(
                detail.quantity_received,
                "details.quantity_received",
                "Quantity received is required",
            )?;
            let unit_cost = required(
                detail.unit_cost,
                "details.unit_cost",
                "Unit cost is required",
            )?;

            uow.product(product_id, Visibility::Active)
                .await?
                .ok_or_else(|| {
                    AppError::validation(
                        "details.product_id",
                        format!("Invalid product ID: {}", product_id),
                    )
                })?;
            let subtotal = line_subtotal(quantity_received, unit_cost)
                .map_err(|v| AppError::from_rule("GRN", v))?;

            let row = uow
                .insert_grn_detail(
                    grn.id,
                    &NewGrnDetail {
                        product_id,
                        quantity_received,
                        unit_cost,
                        subtotal,
                        location: normalize_text(detail.location.as_deref()),
                    },
                )
                .await?;
            details.push(row);
        }

        let calculated_total = aggregate_total(details.iter().map(|d| d.subtotal))
            .map_err(|v| AppError::from_rule("GRN", v))?;

        if input.total_amount.is_none() {
            grn.total_amount = calculated_total;
            grn = uow.update_grn(&grn).await?;
        }

        uow.commit().await?;

        tracing::info!(
            "Created GRN {} (id {}) with {} lines, total {}",
            grn.grn_number,
            grn.id,
            details.len(),
            grn.total_amount
        );

        Ok(GrnCreated {
            grn,
            details,
            calculated_total,
            warnings,
        })
    }

    pub async fn get_grn(&self, acting_employee_id: i64, grn_id: i64) -> AppResult<GrnWithDetails> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;

        let grn = uow
            .grn(grn_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("GRN {}", grn_id)))?;
        let details = uow.grn_details(grn_id).await?;

        Ok(GrnWithDetails { grn, details })
    }

    /// Update the header's remarks and total. Details are never recalculated.
    pub async fn update_grn(
        &self,
        acting_employee_id: i64,
        grn_id: i64,
        update: GrnUpdate,
    ) -> AppResult<Grn> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::PostInventory).await?;

        let mut grn = uow
            .grn(grn_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("GRN {}", grn_id)))?;

        if let Some(total) = update.total_amount {
            if total < Decimal::ZERO {
                return Err(AppError::validation(
                    "total_amount",
                    "Total amount cannot be negative",
                ));
            }
            grn.total_amount = total;
        }
        if update.remarks.is_some() {
            grn.remarks = normalize_text(update.remarks.as_deref());
        }
        grn.updated_at = Utc::now();

        let grn = uow.update_grn(&grn).await?;
        uow.commit().await?;

        tracing::info!("Updated GRN {} (id {})", grn.grn_number, grn.id);

        Ok(grn)
    }
}
