//! HTTP handlers for goods received notes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{Grn, GrnCreated, GrnInput, GrnUpdate, GrnWithDetails, Paginated};

use super::{created, ok, ApiResponse};
use crate::middleware::CurrentEmployee;
use crate::services::listing::{GrnFilter, GrnQuery, ListParams, Listing};
use crate::services::{GrnService, ListingService};
use crate::AppState;

/// Query string of `GET /grns`
#[derive(Debug, Default, Deserialize)]
pub struct GrnListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(alias = "sortOrder")]
    pub sort_order: Option<String>,
    pub search: Option<String>,
    pub supplier_id: Option<i64>,
    pub received_from: Option<NaiveDate>,
    pub received_to: Option<NaiveDate>,
    pub min_total: Option<Decimal>,
    pub max_total: Option<Decimal>,
}

impl GrnListQuery {
    fn into_parts(self) -> (ListParams, GrnFilter) {
        (
            ListParams {
                page: self.page,
                limit: self.limit,
                sort_by: self.sort_by,
                sort_order: self.sort_order,
                search: self.search,
            },
            GrnFilter {
                supplier_id: self.supplier_id,
                received_from: self.received_from,
                received_to: self.received_to,
                min_total: self.min_total,
                max_total: self.max_total,
            },
        )
    }
}

/// Create a GRN with its detail lines
pub async fn create_grn(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Json(input): Json<GrnInput>,
) -> ApiResponse<GrnCreated> {
    let service = GrnService::new(state.store);
    let result = service.create_grn(current.id(), input).await?;
    created("GRN created", result)
}

/// List GRNs
pub async fn list_grns(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Query(query): Query<GrnListQuery>,
) -> ApiResponse<Paginated<Grn>> {
    let (params, filter) = query.into_parts();
    let query: GrnQuery = Listing::new(&params, filter, &state.config.listing);
    let service = ListingService::new(state.store);
    let page = service.grns(current.id(), &query).await?;
    ok("GRNs retrieved", page)
}

/// Get a GRN with its details
pub async fn get_grn(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(grn_id): Path<i64>,
) -> ApiResponse<GrnWithDetails> {
    let service = GrnService::new(state.store);
    let grn = service.get_grn(current.id(), grn_id).await?;
    ok("GRN retrieved", grn)
}

/// Update a GRN's remarks or total
pub async fn update_grn(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(grn_id): Path<i64>,
    Json(update): Json<GrnUpdate>,
) -> ApiResponse<Grn> {
    let service = GrnService::new(state.store);
    let grn = service.update_grn(current.id(), grn_id, update).await?;
    ok("GRN updated", grn)
}
