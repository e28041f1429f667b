//! CSV import and export of stock and bin cards

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    BinCardEntry, Stock, StockDirection, StockLineInput, StockPosting, StockTransactionInput,
    Visibility,
};

use crate::error::{AppError, AppResult};
use crate::services::access::{require_actor, Access};
use crate::services::stock::StockService;
use crate::store::Store;

const STOCK_HEADER: [&str; 7] = [
    "id",
    "product_id",
    "variation_id",
    "location",
    "quantity_available",
    "reorder_level",
    "last_updated",
];

const BIN_CARD_HEADER: [&str; 9] = [
    "id",
    "transaction_date",
    "transaction_type",
    "reference_id",
    "quantity_in",
    "quantity_out",
    "balance",
    "stock_keeper_id",
    "remarks",
];

#[derive(Serialize)]
struct StockRecord<'a> {
    id: i64,
    product_id: i64,
    variation_id: Option<i64>,
    location: &'a str,
    quantity_available: i64,
    reorder_level: i64,
    last_updated: String,
}

impl<'a> From<&'a Stock> for StockRecord<'a> {
    fn from(stock: &'a Stock) -> Self {
        Self {
            id: stock.id,
            product_id: stock.product_id,
            variation_id: stock.variation_id,
            location: &stock.location,
            quantity_available: stock.quantity_available,
            reorder_level: stock.reorder_level,
            last_updated: stock.last_updated.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
struct BinCardRecord<'a> {
    id: i64,
    transaction_date: String,
    transaction_type: &'static str,
    reference_id: Option<i64>,
    quantity_in: i64,
    quantity_out: i64,
    balance: i64,
    stock_keeper_id: i64,
    remarks: Option<&'a str>,
}

impl<'a> From<&'a BinCardEntry> for BinCardRecord<'a> {
    fn from(entry: &'a BinCardEntry) -> Self {
        Self {
            id: entry.id,
            transaction_date: entry.transaction_date.to_string(),
            transaction_type: entry.transaction_type.as_str(),
            reference_id: entry.reference_id,
            quantity_in: entry.quantity_in,
            quantity_out: entry.quantity_out,
            balance: entry.balance,
            stock_keeper_id: entry.stock_keeper_id,
            remarks: entry.remarks.as_deref(),
        }
    }
}

/// One data row of a stock import file
#[derive(Debug, Deserialize)]
struct ImportRow {
    product_id: i64,
    variation_id: Option<i64>,
    location: Option<String>,
    quantity: i64,
    unit_cost: Option<String>,
}

/// Write a header row followed by one row per record
fn write_csv<T: Serialize>(header: &[&str], records: impl IntoIterator<Item = T>) -> AppResult<String> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    wtr.write_record(header)?;
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
}

/// Parse an import file into stock-in lines; row numbers count data rows from 1
fn parse_import(data: &str) -> AppResult<Vec<StockLineInput>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let mut lines = Vec::new();
    for (index, result) in reader.deserialize::<ImportRow>().enumerate() {
        let row = result.map_err(|e| {
            AppError::validation("file", format!("Row {}: {}", index + 1, describe_csv_error(&e)))
        })?;
        let unit_cost = row
            .unit_cost
            .as_deref()
            .map(Decimal::from_str)
            .transpose()
            .map_err(|_| {
                AppError::validation(
                    "file",
                    format!("Row {}: unit cost is not a number", index + 1),
                )
            })?;
        lines.push(StockLineInput {
            product_id: row.product_id,
            variation_id: row.variation_id,
            location: row.location,
            quantity: row.quantity,
            unit_cost,
            remarks: None,
        });
    }

    if lines.is_empty() {
        return Err(AppError::validation(
            "file",
            "The file contains no stock rows",
        ));
    }
    Ok(lines)
}

fn describe_csv_error(err: &csv::Error) -> String {
    match err.kind() {
        csv::ErrorKind::Deserialize { err, .. } => match err.field() {
            Some(field) => format!("column {}: {}", field + 1, err.kind()),
            None => err.kind().to_string(),
        },
        csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
            format!("expected {} columns, found {}", expected_len, len)
        }
        _ => err.to_string(),
    }
}

/// Bulk movement of stock data in and out as CSV
#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn Store>,
    stock: StockService,
}

impl TransferService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            stock: StockService::new(store.clone()),
            store,
        }
    }

    /// Every stock row, header included
    pub async fn export_stock(&self, acting_employee_id: i64) -> AppResult<String> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;

        let rows = uow.all_stock().await?;
        write_csv(&STOCK_HEADER, rows.iter().map(StockRecord::from))
    }

    /// The full bin card of a variation, oldest entry first
    pub async fn export_bin_card(&self, acting_employee_id: i64, variation_id: i64) -> AppResult<String> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;

        uow.variation(variation_id, Visibility::Any)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product variation {}", variation_id)))?;

        let entries = uow.bin_card_entries(variation_id).await?;
        write_csv(&BIN_CARD_HEADER, entries.iter().map(BinCardRecord::from))
    }

    /// Post every row of the file as one stock-in transaction.
    ///
    /// Columns: `product_id,variation_id,location,quantity,unit_cost`.
    pub async fn import_stock(
        &self,
        acting_employee_id: i64,
        data: &str,
        remarks: Option<String>,
    ) -> AppResult<StockPosting> {
        let lines = parse_import(data)?;
        let count = lines.len();

        let posting = self
            .stock
            .post_stock_transaction(
                StockDirection::In,
                acting_employee_id,
                StockTransactionInput {
                    remarks,
                    lines,
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!("Imported {} stock rows", count);
        Ok(posting)
    }
}
