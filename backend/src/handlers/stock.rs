//! HTTP handlers for stock transactions, stock reads and CSV transfer

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::{Paginated, Stock, StockPosting, StockTransactionInput};

use super::{created, ok, ApiResponse};
use crate::error::AppResult;
use crate::middleware::CurrentEmployee;
use crate::services::listing::{ListParams, Listing, StockFilter, StockQuery};
use crate::services::{ListingService, StockService, TransferService};
use crate::AppState;

/// Query string of `GET /stock`
#[derive(Debug, Default, Deserialize)]
pub struct StockListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(alias = "sortOrder")]
    pub sort_order: Option<String>,
    pub search: Option<String>,
    pub product_id: Option<i64>,
    pub variation_id: Option<i64>,
    pub location: Option<String>,
    pub low_stock: Option<bool>,
}

impl StockListQuery {
    fn into_parts(self) -> (ListParams, StockFilter) {
        (
            ListParams {
                page: self.page,
                limit: self.limit,
                sort_by: self.sort_by,
                sort_order: self.sort_order,
                search: self.search,
            },
            StockFilter {
                product_id: self.product_id,
                variation_id: self.variation_id,
                location: self.location,
                low_stock: self.low_stock,
            },
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    pub remarks: Option<String>,
}

/// Post a stock-in transaction
pub async fn stock_in(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Json(input): Json<StockTransactionInput>,
) -> ApiResponse<StockPosting> {
    let service = StockService::new(state.store);
    let posting = service.stock_in(current.id(), input).await?;
    created("Stock in recorded", posting)
}

/// Post a stock-out transaction
pub async fn stock_out(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Json(input): Json<StockTransactionInput>,
) -> ApiResponse<StockPosting> {
    let service = StockService::new(state.store);
    let posting = service.stock_out(current.id(), input).await?;
    created("Stock out recorded", posting)
}

/// List stock rows
pub async fn list_stock(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Query(query): Query<StockListQuery>,
) -> ApiResponse<Paginated<Stock>> {
    let (params, filter) = query.into_parts();
    let query: StockQuery = Listing::new(&params, filter, &state.config.listing);
    let service = ListingService::new(state.store);
    let page = service.stock(current.id(), &query).await?;
    ok("Stock retrieved", page)
}

/// Get one stock row
pub async fn get_stock(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(stock_id): Path<i64>,
) -> ApiResponse<Stock> {
    let service = StockService::new(state.store);
    let stock = service.get_stock(current.id(), stock_id).await?;
    ok("Stock retrieved", stock)
}

/// Download all stock rows as CSV
pub async fn export_stock(
    State(state): State<AppState>,
    current: CurrentEmployee,
) -> AppResult<impl IntoResponse> {
    let service = TransferService::new(state.store);
    let csv = service.export_stock(current.id()).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"stock.csv\"",
            ),
        ],
        csv,
    ))
}

/// Import a CSV body as one stock-in transaction
pub async fn import_stock(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Query(query): Query<ImportQuery>,
    body: String,
) -> ApiResponse<StockPosting> {
    let service = TransferService::new(state.store);
    let posting = service
        .import_stock(current.id(), &body, query.remarks)
        .await?;
    created("Stock imported", posting)
}
