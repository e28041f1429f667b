//! HTTP handlers for supplier returns

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::{
    Paginated, Return, ReturnInput, ReturnStatus, ReturnStatusUpdate, ReturnType,
    ReturnWithDetails,
};

use super::{created, ok, ApiResponse};
use crate::middleware::CurrentEmployee;
use crate::services::listing::{ListParams, Listing, ReturnFilter, ReturnQuery};
use crate::services::{ListingService, ReturnService};
use crate::AppState;

/// Query string of `GET /returns`
#[derive(Debug, Default, Deserialize)]
pub struct ReturnListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(alias = "sortOrder")]
    pub sort_order: Option<String>,
    pub search: Option<String>,
    pub supplier_id: Option<i64>,
    pub status: Option<ReturnStatus>,
    pub return_type: Option<ReturnType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReturnListQuery {
    fn into_parts(self) -> (ListParams, ReturnFilter) {
        (
            ListParams {
                page: self.page,
                limit: self.limit,
                sort_by: self.sort_by,
                sort_order: self.sort_order,
                search: self.search,
            },
            ReturnFilter {
                supplier_id: self.supplier_id,
                status: self.status,
                return_type: self.return_type,
                from: self.from,
                to: self.to,
            },
        )
    }
}

pub async fn create_return(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Json(input): Json<ReturnInput>,
) -> ApiResponse<ReturnWithDetails> {
    let service = ReturnService::new(state.store);
    let result = service.create_return(current.id(), input).await?;
    created("Return created", result)
}

pub async fn list_returns(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Query(query): Query<ReturnListQuery>,
) -> ApiResponse<Paginated<Return>> {
    let (params, filter) = query.into_parts();
    let query: ReturnQuery = Listing::new(&params, filter, &state.config.listing);
    let service = ListingService::new(state.store);
    let page = service.returns(current.id(), &query).await?;
    ok("Returns retrieved", page)
}

pub async fn get_return(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(return_id): Path<i64>,
) -> ApiResponse<ReturnWithDetails> {
    let service = ReturnService::new(state.store);
    let result = service.get_return(current.id(), return_id).await?;
    ok("Return retrieved", result)
}

/// Administrative status change (manager or admin)
pub async fn update_return_status(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(return_id): Path<i64>,
    Json(update): Json<ReturnStatusUpdate>,
) -> ApiResponse<Return> {
    let service = ReturnService::new(state.store);
    let result = service
        .update_return_status(current.id(), return_id, update)
        .await?;
    ok("Return status updated", result)
}
