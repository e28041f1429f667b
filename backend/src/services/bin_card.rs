//! Bin card ledger engine
//!
//! Entries are appended inside the unit of work of the workflow that moves
//! stock. Each entry's balance is the previous entry's balance for the same
//! variation plus its quantity in minus its quantity out; earlier entries
//! are never recomputed.

use std::sync::Arc;

use chrono::NaiveDate;
use shared::{
    next_balance, BinCardEntry, BinCardType, LedgerCheck, NewBinCardEntry, PageRequest,
    Paginated, Visibility,
};

use crate::error::{AppError, AppResult};
use crate::services::access::{require_actor, Access};
use crate::store::{Store, UnitOfWork};

/// One movement to record on a variation's bin card
#[derive(Debug, Clone)]
pub struct LedgerPosting {
    pub variation_id: i64,
    pub transaction_date: NaiveDate,
    pub transaction_type: BinCardType,
    pub quantity_in: i64,
    pub quantity_out: i64,
    pub reference_id: Option<i64>,
    pub stock_keeper_id: i64,
    pub remarks: Option<String>,
}

/// Append an entry after the latest one for the same variation
pub async fn append_entry(
    uow: &mut dyn UnitOfWork,
    posting: LedgerPosting,
) -> AppResult<BinCardEntry> {
    let previous = uow
        .latest_bin_card(posting.variation_id)
        .await?
        .map_or(0, |entry| entry.balance);

    let balance = next_balance(previous, posting.quantity_in, posting.quantity_out).map_err(
        |violation| AppError::from_rule(format!("variation {}", posting.variation_id), violation),
    )?;

    uow.append_bin_card(&NewBinCardEntry {
        variation_id: posting.variation_id,
        transaction_date: posting.transaction_date,
        transaction_type: posting.transaction_type,
        reference_id: posting.reference_id,
        quantity_in: posting.quantity_in,
        quantity_out: posting.quantity_out,
        balance,
        stock_keeper_id: posting.stock_keeper_id,
        remarks: posting.remarks,
    })
    .await
}

async fn require_variation(uow: &mut dyn UnitOfWork, variation_id: i64) -> AppResult<()> {
    uow.variation(variation_id, Visibility::Any)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product variation {}", variation_id)))?;
    Ok(())
}

/// Read side of the bin card
#[derive(Clone)]
pub struct BinCardService {
    store: Arc<dyn Store>,
}

impl BinCardService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Balance after the most recent entry, 0 when the card is empty
    pub async fn latest_balance(&self, acting_employee_id: i64, variation_id: i64) -> AppResult<i64> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;
        require_variation(uow.as_mut(), variation_id).await?;

        Ok(uow
            .latest_bin_card(variation_id)
            .await?
            .map_or(0, |entry| entry.balance))
    }

    /// Entries oldest first
    pub async fn bin_card(
        &self,
        acting_employee_id: i64,
        variation_id: i64,
        page: &PageRequest,
    ) -> AppResult<Paginated<BinCardEntry>> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;
        require_variation(uow.as_mut(), variation_id).await?;

        uow.bin_card_page(variation_id, page).await
    }

    /// Compare the ledger balance with the stock held for the variation
    pub async fn verify_variation(
        &self,
        acting_employee_id: i64,
        variation_id: i64,
    ) -> AppResult<LedgerCheck> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;
        require_variation(uow.as_mut(), variation_id).await?;

        let ledger_balance = uow
            .latest_bin_card(variation_id)
            .await?
            .map_or(0, |entry| entry.balance);
        let stock_quantity = uow.variation_stock_total(variation_id).await?;

        if ledger_balance != stock_quantity {
            tracing::warn!(
                "Bin card of variation {} shows {} but stock holds {}",
                variation_id,
                ledger_balance,
                stock_quantity
            );
        }

        Ok(LedgerCheck {
            variation_id,
            ledger_balance,
            stock_quantity,
            consistent: ledger_balance == stock_quantity,
        })
    }
}
