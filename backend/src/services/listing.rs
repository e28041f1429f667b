//! Listing queries shared by the GRN, variation, stock and return endpoints
//!
//! Every listing is paginated, sorted by an allow-listed column (unknown
//! names fall back to the entity default), optionally searched
//! case-insensitively over its text columns and narrowed by filters.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    Grn, PageRequest, Paginated, ProductVariation, Return, ReturnStatus, ReturnType, SortOrder,
    Stock,
};

use crate::config::ListingConfig;
use crate::error::AppResult;
use crate::services::access::{require_actor, Access};
use crate::store::Store;

/// Column a listing may be ordered by
pub trait SortColumn: Copy + Default {
    /// Accepts snake_case and camelCase names
    fn from_name(name: &str) -> Option<Self>;

    /// SQL column expression
    fn column(&self) -> &'static str;

    fn resolve(value: Option<&str>) -> Self {
        value
            .and_then(|v| Self::from_name(v.trim()))
            .unwrap_or_default()
    }
}

/// Raw pagination, sorting and search parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
}

/// A resolved listing query
#[derive(Debug, Clone)]
pub struct Listing<S, F> {
    pub page: PageRequest,
    pub sort: S,
    pub order: SortOrder,
    /// Lowercased, trimmed search term
    pub search: Option<String>,
    pub filter: F,
}

impl<S: SortColumn, F> Listing<S, F> {
    pub fn new(params: &ListParams, filter: F, config: &ListingConfig) -> Self {
        Self {
            page: PageRequest::new(
                params.page,
                params.limit,
                config.default_limit,
                config.max_limit,
            ),
            sort: S::resolve(params.sort_by.as_deref()),
            order: SortOrder::parse(params.sort_order.as_deref()),
            search: params
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            filter,
        }
    }
}

/// Case-insensitive substring match used by the in-memory store
pub fn matches_search(term: &Option<String>, fields: &[Option<&str>]) -> bool {
    match term {
        None => true,
        Some(term) => fields
            .iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(term.as_str())),
    }
}

// ============================================================================
// GRN
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GrnSort {
    Id,
    GrnNumber,
    #[default]
    ReceivedDate,
    TotalAmount,
}

impl SortColumn for GrnSort {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "id" => Some(GrnSort::Id),
            "grn_number" | "grnNumber" => Some(GrnSort::GrnNumber),
            "received_date" | "receivedDate" => Some(GrnSort::ReceivedDate),
            "total_amount" | "totalAmount" => Some(GrnSort::TotalAmount),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            GrnSort::Id => "id",
            GrnSort::GrnNumber => "grn_number",
            GrnSort::ReceivedDate => "received_date",
            GrnSort::TotalAmount => "total_amount",
        }
    }
}

/// GRN filters; search covers grn_number and remarks
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrnFilter {
    pub supplier_id: Option<i64>,
    pub received_from: Option<NaiveDate>,
    pub received_to: Option<NaiveDate>,
    pub min_total: Option<Decimal>,
    pub max_total: Option<Decimal>,
}

pub type GrnQuery = Listing<GrnSort, GrnFilter>;

// ============================================================================
// Product variations
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VariationSort {
    Id,
    Name,
    Price,
    Quantity,
    #[default]
    CreatedAt,
}

impl SortColumn for VariationSort {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "id" => Some(VariationSort::Id),
            "name" => Some(VariationSort::Name),
            "price" => Some(VariationSort::Price),
            "quantity" => Some(VariationSort::Quantity),
            "created_at" | "createdAt" => Some(VariationSort::CreatedAt),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            VariationSort::Id => "id",
            VariationSort::Name => "name",
            VariationSort::Price => "price",
            VariationSort::Quantity => "quantity",
            VariationSort::CreatedAt => "created_at",
        }
    }
}

/// Variation filters; search covers name, color, size, capacity and barcode.
/// Soft-deleted variations are never listed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariationFilter {
    pub product_id: Option<i64>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub active: Option<bool>,
}

pub type VariationQuery = Listing<VariationSort, VariationFilter>;

// ============================================================================
// Stock
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StockSort {
    Id,
    QuantityAvailable,
    #[default]
    LastUpdated,
}

impl SortColumn for StockSort {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "id" => Some(StockSort::Id),
            "quantity_available" | "quantityAvailable" => Some(StockSort::QuantityAvailable),
            "last_updated" | "lastUpdated" => Some(StockSort::LastUpdated),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            StockSort::Id => "id",
            StockSort::QuantityAvailable => "quantity_available",
            StockSort::LastUpdated => "last_updated",
        }
    }
}

/// Stock filters; search covers the location label
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockFilter {
    pub product_id: Option<i64>,
    pub variation_id: Option<i64>,
    pub location: Option<String>,
    /// Only rows at or below their reorder level
    pub low_stock: Option<bool>,
}

pub type StockQuery = Listing<StockSort, StockFilter>;

// ============================================================================
// Returns
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnSort {
    Id,
    ReturnNumber,
    #[default]
    ReturnDate,
}

impl SortColumn for ReturnSort {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "id" => Some(ReturnSort::Id),
            "return_number" | "returnNumber" => Some(ReturnSort::ReturnNumber),
            "return_date" | "returnDate" => Some(ReturnSort::ReturnDate),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            ReturnSort::Id => "id",
            ReturnSort::ReturnNumber => "return_number",
            ReturnSort::ReturnDate => "return_date",
        }
    }
}

/// Return filters; search covers return_number, reason and remarks
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnFilter {
    pub supplier_id: Option<i64>,
    pub status: Option<ReturnStatus>,
    pub return_type: Option<ReturnType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

pub type ReturnQuery = Listing<ReturnSort, ReturnFilter>;

// ============================================================================
// Service
// ============================================================================

/// Read-only listings for any active employee
#[derive(Clone)]
pub struct ListingService {
    store: Arc<dyn Store>,
}

impl ListingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn grns(&self, acting_employee_id: i64, query: &GrnQuery) -> AppResult<Paginated<Grn>> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;
        uow.list_grns(query).await
    }

    pub async fn variations(
        &self,
        acting_employee_id: i64,
        query: &VariationQuery,
    ) -> AppResult<Paginated<ProductVariation>> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;
        uow.list_variations(query).await
    }

    pub async fn stock(
        &self,
        acting_employee_id: i64,
        query: &StockQuery,
    ) -> AppResult<Paginated<Stock>> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;
        uow.list_stock(query).await
    }

    pub async fn returns(
        &self,
        acting_employee_id: i64,
        query: &ReturnQuery,
    ) -> AppResult<Paginated<Return>> {
        let mut uow = self.store.begin().await?;
        require_actor(uow.as_mut(), acting_employee_id, Access::Read).await?;
        uow.list_returns(query).await
    }
}
