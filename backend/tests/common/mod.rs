//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{
    EmployeeInput, EmployeeRole, GrnDetailInput, GrnInput, ProductInput, StockLineInput,
    StockTransactionInput, SupplierInput, VariationInput,
};
use stockroom_backend::services::CatalogService;
use stockroom_backend::{MemoryStore, Store};

/// A memory store with one employee per role and a small catalog
pub struct Fixture {
    pub store: Arc<dyn Store>,
    pub admin: i64,
    pub keeper: i64,
    pub viewer: i64,
    pub supplier: i64,
    pub product: i64,
    pub variation: i64,
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(value: i64, scale: u32) -> Decimal {
    Decimal::new(value, scale)
}

pub async fn employee(catalog: &CatalogService, name: &str, role: EmployeeRole) -> i64 {
    catalog
        .create_employee(EmployeeInput {
            name: name.to_string(),
            email: None,
            role,
        })
        .await
        .unwrap()
        .id
}

pub async fn fixture() -> Fixture {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let catalog = CatalogService::new(store.clone());

    let admin = employee(&catalog, "Ana Admin", EmployeeRole::Admin).await;
    let keeper = employee(&catalog, "Sam Keeper", EmployeeRole::StockKeeper).await;
    let viewer = employee(&catalog, "Vic Viewer", EmployeeRole::Viewer).await;

    let supplier = catalog
        .create_supplier(admin, supplier_input("Acme Supplies"))
        .await
        .unwrap()
        .id;
    let product = catalog
        .create_product(admin, product_input("Mug", "MUG-01"))
        .await
        .unwrap()
        .id;
    let variation = catalog
        .create_variation(admin, variation_input(product, "Red Mug", Some("RED-350")))
        .await
        .unwrap()
        .id;

    Fixture {
        store,
        admin,
        keeper,
        viewer,
        supplier,
        product,
        variation,
    }
}

pub fn supplier_input(name: &str) -> SupplierInput {
    SupplierInput {
        name: name.to_string(),
        contact_person: None,
        phone: None,
        email: None,
        address: None,
        is_active: None,
    }
}

pub fn product_input(name: &str, sku: &str) -> ProductInput {
    ProductInput {
        name: name.to_string(),
        sku: sku.to_string(),
        description: None,
        is_active: None,
    }
}

pub fn variation_input(product_id: i64, name: &str, barcode: Option<&str>) -> VariationInput {
    VariationInput {
        product_id,
        name: name.to_string(),
        color: None,
        size: None,
        capacity: None,
        barcode: barcode.map(str::to_string),
        price: dec(1250, 2),
        quantity: None,
        min_stock_level: Some(2),
        max_stock_level: None,
        is_active: None,
    }
}

pub fn grn_input(number: &str, supplier_id: i64, details: Vec<GrnDetailInput>) -> GrnInput {
    GrnInput {
        grn_number: Some(number.to_string()),
        supplier_id: Some(supplier_id),
        received_date: Some(date(2024, 1, 15)),
        details,
        ..Default::default()
    }
}

pub fn grn_line(product_id: i64, quantity: i64, unit_cost: Decimal) -> GrnDetailInput {
    GrnDetailInput {
        product_id: Some(product_id),
        quantity_received: Some(quantity),
        unit_cost: Some(unit_cost),
        location: None,
    }
}

pub fn line(product_id: i64, variation_id: Option<i64>, quantity: i64) -> StockLineInput {
    StockLineInput {
        product_id,
        variation_id,
        location: None,
        quantity,
        unit_cost: None,
        remarks: None,
    }
}

pub fn movement(lines: Vec<StockLineInput>) -> StockTransactionInput {
    StockTransactionInput {
        lines,
        ..Default::default()
    }
}
