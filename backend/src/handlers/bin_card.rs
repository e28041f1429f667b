//! HTTP handlers for bin card reads

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use shared::{BinCardEntry, LedgerCheck, PageRequest, Paginated};

use super::{ok, ApiResponse};
use crate::error::AppResult;
use crate::middleware::CurrentEmployee;
use crate::services::{BinCardService, TransferService};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub variation_id: i64,
    pub balance: i64,
}

/// Ledger entries of a variation, oldest first
pub async fn get_bin_card(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(variation_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> ApiResponse<Paginated<BinCardEntry>> {
    let listing = &state.config.listing;
    let page = PageRequest::new(
        query.page,
        query.limit,
        listing.default_limit,
        listing.max_limit,
    );
    let service = BinCardService::new(state.store);
    let entries = service.bin_card(current.id(), variation_id, &page).await?;
    ok("Bin card retrieved", entries)
}

/// Current ledger balance of a variation
pub async fn get_balance(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(variation_id): Path<i64>,
) -> ApiResponse<BalanceResponse> {
    let service = BinCardService::new(state.store);
    let balance = service.latest_balance(current.id(), variation_id).await?;
    ok(
        "Balance retrieved",
        BalanceResponse {
            variation_id,
            balance,
        },
    )
}

/// Reconcile the ledger against stock
pub async fn verify_bin_card(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(variation_id): Path<i64>,
) -> ApiResponse<LedgerCheck> {
    let service = BinCardService::new(state.store);
    let check = service.verify_variation(current.id(), variation_id).await?;
    ok("Ledger checked", check)
}

/// Download a variation's bin card as CSV
pub async fn export_bin_card(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(variation_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let service = TransferService::new(state.store);
    let csv = service.export_bin_card(current.id(), variation_id).await?;
    let disposition = format!(
        "attachment; filename=\"bin_card_{}.csv\"",
        variation_id
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
