//! Route definitions for the Stockroom inventory platform

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - goods received notes
        .nest("/grns", grn_routes(state.clone()))
        // Protected routes - stock transactions and transfer
        .nest("/stock", stock_routes(state.clone()))
        // Protected routes - bin card ledger
        .nest("/bin-cards", bin_card_routes(state.clone()))
        // Protected routes - supplier returns
        .nest("/returns", return_routes(state.clone()))
        // Protected routes - catalog
        .nest("/suppliers", supplier_routes(state.clone()))
        .nest("/products", product_routes(state.clone()))
        .nest("/variations", variation_routes(state.clone()))
        .nest("/employees", employee_routes(state))
}

/// GRN routes (protected)
fn grn_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_grns).post(handlers::create_grn))
        .route(
            "/:grn_id",
            get(handlers::get_grn).patch(handlers::update_grn),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock routes (protected)
fn stock_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_stock))
        .route("/in", post(handlers::stock_in))
        .route("/out", post(handlers::stock_out))
        .route("/export", get(handlers::export_stock))
        .route("/import", post(handlers::import_stock))
        .route("/:stock_id", get(handlers::get_stock))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Bin card routes (protected)
fn bin_card_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:variation_id", get(handlers::get_bin_card))
        .route("/:variation_id/balance", get(handlers::get_balance))
        .route("/:variation_id/verify", get(handlers::verify_bin_card))
        .route("/:variation_id/export", get(handlers::export_bin_card))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Supplier return routes (protected)
fn return_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_returns).post(handlers::create_return))
        .route("/:return_id", get(handlers::get_return))
        .route("/:return_id/status", patch(handlers::update_return_status))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Supplier routes (protected)
fn supplier_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_supplier))
        .route(
            "/:supplier_id",
            get(handlers::get_supplier)
                .put(handlers::update_supplier)
                .delete(handlers::delete_supplier),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Product routes (protected)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_product))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Product variation routes (protected)
fn variation_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_variations).post(handlers::create_variation),
        )
        .route(
            "/:variation_id",
            get(handlers::get_variation)
                .put(handlers::update_variation)
                .delete(handlers::delete_variation),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Employee routes (protected, read only)
fn employee_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:employee_id", get(handlers::get_employee))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
