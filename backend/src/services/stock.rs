//! Stock transaction workflow (stock-in and stock-out)
//!
//! A transaction moves quantity on one or more stock rows and appends one
//! bin card entry per line that names a variation. All lines commit
//! together or not at all.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    apply_movement, normalize_text, validate_stock_lines, NewStock, RuleViolation, Stock,
    StockDirection, StockKey, StockLineInput, StockPosting, StockTransactionInput, Visibility,
};

use crate::error::{AppError, AppResult};
use crate::services::access::{require_actor, Access};
use crate::services::bin_card::{append_entry, LedgerPosting};
use crate::store::{Store, UnitOfWork};

/// Service for posting stock movements
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn Store>,
}

impl StockService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn stock_in(
        &self,
        acting_employee_id: i64,
        input: StockTransactionInput,
    ) -> AppResult<StockPosting> {
        self.post_stock_transaction(StockDirection::In, acting_employee_id, input)
            .await
    }

    pub async fn stock_out(
        &self,
        acting_employee_id: i64,
        input: StockTransactionInput,
    ) -> AppResult<StockPosting> {
        self.post_stock_transaction(StockDirection::Out, acting_employee_id, input)
            .await
    }

    /// Post a stock transaction.
    ///
    /// Lines are applied in ascending [`StockKey`] order. For each line the
    /// variation row is locked before the stock row, so concurrent
    /// transactions over overlapping keys always wait on each other in the
    /// same order. Any failing line aborts the whole transaction.
    pub async fn post_stock_transaction(
        &self,
        direction: StockDirection,
        acting_employee_id: i64,
        input: StockTransactionInput,
    ) -> AppResult<StockPosting> {
        let mut uow = self.store.begin().await?;
        let actor = require_actor(uow.as_mut(), acting_employee_id, Access::PostInventory).await?;

        validate_stock_lines(&input.lines)
            .map_err(|violation| AppError::from_rule("stock transaction", violation))?;

        if let Some(supplier_id) = input.supplier_id {
            uow.supplier(supplier_id, Visibility::Active)
                .await?
                .ok_or_else(|| AppError::validation("supplier_id", "Invalid supplier ID"))?;
        }

        if let (StockDirection::In, Some(grn_id)) = (direction, input.reference_id) {
            uow.grn(grn_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("GRN {}", grn_id)))?;
        }

        let transaction_date = input
            .transaction_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let header_remarks = normalize_text(input.remarks.as_deref());

        let mut lines: Vec<(StockKey, &StockLineInput)> =
            input.lines.iter().map(|line| (line.key(), line)).collect();
        lines.sort_by(|a, b| a.0.cmp(&b.0));

        let mut stock = Vec::with_capacity(lines.len());
        let mut ledger_entries = Vec::new();

        for (key, line) in lines {
            let reorder_level = check_references(uow.as_mut(), &key).await?;

            if let Some(variation_id) = key.variation_id {
                uow.lock_variation(variation_id).await?;
            }

            let current = match (uow.lock_stock(&key).await?, direction) {
                (Some(row), _) => row,
                (None, StockDirection::Out) => {
                    return Err(insufficient(&key, 0, line.quantity));
                }
                (None, StockDirection::In) => {
                    uow.insert_stock(&NewStock {
                        key: key.clone(),
                        reorder_level,
                    })
                    .await?
                }
            };

            let quantity = apply_movement(current.quantity_available, direction, line.quantity)
                .map_err(|violation| match violation {
                    RuleViolation::InsufficientStock {
                        available,
                        requested,
                    } => insufficient(&key, available, requested),
                    other => AppError::from_rule(describe(&key), other),
                })?;
            let updated = uow.set_stock_quantity(current.id, quantity).await?;

            match key.variation_id {
                Some(variation_id) => {
                    let (quantity_in, quantity_out) = match direction {
                        StockDirection::In => (line.quantity, 0),
                        StockDirection::Out => (0, line.quantity),
                    };
                    let entry = append_entry(
                        uow.as_mut(),
                        LedgerPosting {
                            variation_id,
                            transaction_date,
                            transaction_type: direction.ledger_type(),
                            quantity_in,
                            quantity_out,
                            reference_id: input.reference_id,
                            stock_keeper_id: actor.id,
                            remarks: normalize_text(line.remarks.as_deref())
                                .or_else(|| header_remarks.clone()),
                        },
                    )
                    .await?;
                    ledger_entries.push(entry);
                }
                None => {
                    tracing::debug!(
                        "Stock line for product {} has no variation; bin card not written",
                        key.product_id
                    );
                }
            }

            stock.push(updated);
        }

        uow.commit().await?;

        tracing::info!(
            "Posted stock {} by employee {}: {} lines, {} bin card entries",
            direction.as_str(),
            actor.id,
            stock.len(),
            ledger_entries.len()
        );

        Ok(StockPosting {
            direction,
            stock,
            ledger_entries,
        })
    }

    /// Fetch one stock row
    pub async fn get_stock(&self, acting_employee_id: i64, stock_id: i64) -> AppResult<Stock> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;

        uow.stock(stock_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Stock {}", stock_id)))
    }
}

/// Check the product and variation of a line are active and belong
/// together; returns the reorder level for a newly created stock row
async fn check_references(uow: &mut dyn UnitOfWork, key: &StockKey) -> AppResult<i64> {
    uow.product(key.product_id, Visibility::Active)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {}", key.product_id)))?;

    let Some(variation_id) = key.variation_id else {
        return Ok(0);
    };

    let variation = uow
        .variation(variation_id, Visibility::Active)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product variation {}", variation_id)))?;

    if variation.product_id != key.product_id {
        return Err(AppError::validation(
            "variation_id",
            format!(
                "Variation {} does not belong to product {}",
                variation_id, key.product_id
            ),
        ));
    }

    Ok(variation.min_stock_level)
}

fn describe(key: &StockKey) -> String {
    match key.variation_id {
        Some(variation_id) => format!("variation {} at {}", variation_id, key.location),
        None => format!("product {} at {}", key.product_id, key.location),
    }
}

fn insufficient(key: &StockKey, available: i64, requested: i64) -> AppError {
    AppError::InsufficientStock {
        resource: describe(key),
        available,
        requested,
    }
}
