//! HTTP handlers for suppliers, products, variations and employees

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    Employee, Paginated, Product, ProductInput, ProductVariation, Supplier, SupplierInput,
    VariationInput,
};

use super::{created, ok, ApiResponse};
use crate::middleware::CurrentEmployee;
use crate::services::listing::{ListParams, Listing, VariationFilter, VariationQuery};
use crate::services::{CatalogService, ListingService};
use crate::AppState;

/// Query string of `GET /variations`
#[derive(Debug, Default, Deserialize)]
pub struct VariationListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(alias = "sortOrder")]
    pub sort_order: Option<String>,
    pub search: Option<String>,
    pub product_id: Option<i64>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub active: Option<bool>,
}

impl VariationListQuery {
    fn into_parts(self) -> (ListParams, VariationFilter) {
        (
            ListParams {
                page: self.page,
                limit: self.limit,
                sort_by: self.sort_by,
                sort_order: self.sort_order,
                search: self.search,
            },
            VariationFilter {
                product_id: self.product_id,
                min_price: self.min_price,
                max_price: self.max_price,
                active: self.active,
            },
        )
    }
}

// Employees

pub async fn get_employee(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(employee_id): Path<i64>,
) -> ApiResponse<Employee> {
    let service = CatalogService::new(state.store);
    let employee = service.get_employee(current.id(), employee_id).await?;
    ok("Employee retrieved", employee)
}

// Suppliers

pub async fn create_supplier(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Json(input): Json<SupplierInput>,
) -> ApiResponse<Supplier> {
    let service = CatalogService::new(state.store);
    let supplier = service.create_supplier(current.id(), input).await?;
    created("Supplier created", supplier)
}

pub async fn get_supplier(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(supplier_id): Path<i64>,
) -> ApiResponse<Supplier> {
    let service = CatalogService::new(state.store);
    let supplier = service.get_supplier(current.id(), supplier_id).await?;
    ok("Supplier retrieved", supplier)
}

pub async fn update_supplier(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(supplier_id): Path<i64>,
    Json(input): Json<SupplierInput>,
) -> ApiResponse<Supplier> {
    let service = CatalogService::new(state.store);
    let supplier = service
        .update_supplier(current.id(), supplier_id, input)
        .await?;
    ok("Supplier updated", supplier)
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(supplier_id): Path<i64>,
) -> ApiResponse<()> {
    let service = CatalogService::new(state.store);
    service.delete_supplier(current.id(), supplier_id).await?;
    ok("Supplier deleted", ())
}

// Products

pub async fn create_product(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Json(input): Json<ProductInput>,
) -> ApiResponse<Product> {
    let service = CatalogService::new(state.store);
    let product = service.create_product(current.id(), input).await?;
    created("Product created", product)
}

pub async fn get_product(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(product_id): Path<i64>,
) -> ApiResponse<Product> {
    let service = CatalogService::new(state.store);
    let product = service.get_product(current.id(), product_id).await?;
    ok("Product retrieved", product)
}

pub async fn update_product(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(product_id): Path<i64>,
    Json(input): Json<ProductInput>,
) -> ApiResponse<Product> {
    let service = CatalogService::new(state.store);
    let product = service
        .update_product(current.id(), product_id, input)
        .await?;
    ok("Product updated", product)
}

pub async fn delete_product(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(product_id): Path<i64>,
) -> ApiResponse<()> {
    let service = CatalogService::new(state.store);
    service.delete_product(current.id(), product_id).await?;
    ok("Product deleted", ())
}

// Product variations

pub async fn create_variation(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Json(input): Json<VariationInput>,
) -> ApiResponse<ProductVariation> {
    let service = CatalogService::new(state.store);
    let variation = service.create_variation(current.id(), input).await?;
    created("Variation created", variation)
}

pub async fn list_variations(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Query(query): Query<VariationListQuery>,
) -> ApiResponse<Paginated<ProductVariation>> {
    let (params, filter) = query.into_parts();
    let query: VariationQuery = Listing::new(&params, filter, &state.config.listing);
    let service = ListingService::new(state.store);
    let page = service.variations(current.id(), &query).await?;
    ok("Variations retrieved", page)
}

pub async fn get_variation(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(variation_id): Path<i64>,
) -> ApiResponse<ProductVariation> {
    let service = CatalogService::new(state.store);
    let variation = service.get_variation(current.id(), variation_id).await?;
    ok("Variation retrieved", variation)
}

pub async fn update_variation(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(variation_id): Path<i64>,
    Json(input): Json<VariationInput>,
) -> ApiResponse<ProductVariation> {
    let service = CatalogService::new(state.store);
    let variation = service
        .update_variation(current.id(), variation_id, input)
        .await?;
    ok("Variation updated", variation)
}

pub async fn delete_variation(
    State(state): State<AppState>,
    current: CurrentEmployee,
    Path(variation_id): Path<i64>,
) -> ApiResponse<()> {
    let service = CatalogService::new(state.store);
    service.delete_variation(current.id(), variation_id).await?;
    ok("Variation deleted", ())
}
