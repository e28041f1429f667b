//! PostgreSQL store tests
//!
//! Need a reachable database in `DATABASE_URL`; run with
//! `cargo test -- --ignored`.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    EmployeeInput, EmployeeRole, GrnDetailInput, GrnInput, ProductInput, StockLineInput,
    StockTransactionInput, SupplierInput, VariationInput,
};
use sqlx::postgres::PgPoolOptions;
use stockroom_backend::services::{BinCardService, CatalogService, GrnService, StockService};
use stockroom_backend::{AppError, PgStore, Store};

async fn connect() -> Arc<dyn Store> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("database connection");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    Arc::new(PgStore::new(pool))
}

#[tokio::test]
#[ignore]
async fn test_postgres_grn_and_stock_round_trip() {
    let store = connect().await;
    let suffix = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let catalog = CatalogService::new(store.clone());

    let admin = catalog
        .create_employee(EmployeeInput {
            name: "Pg Admin".to_string(),
            email: None,
            role: EmployeeRole::Admin,
        })
        .await
        .unwrap()
        .id;
    let supplier = catalog
        .create_supplier(
            admin,
            SupplierInput {
                name: format!("Supplier {}", suffix),
                contact_person: None,
                phone: None,
                email: None,
                address: None,
                is_active: None,
            },
        )
        .await
        .unwrap()
        .id;
    let product = catalog
        .create_product(
            admin,
            ProductInput {
                name: "Kettle".to_string(),
                sku: format!("KTL-{}", suffix),
                description: None,
                is_active: None,
            },
        )
        .await
        .unwrap()
        .id;
    let variation = catalog
        .create_variation(
            admin,
            VariationInput {
                product_id: product,
                name: "Steel Kettle".to_string(),
                color: None,
                size: None,
                capacity: Some("1.7L".to_string()),
                barcode: Some(format!("KTL{}", suffix)),
                price: Decimal::new(3999, 2),
                quantity: None,
                min_stock_level: None,
                max_stock_level: None,
                is_active: None,
            },
        )
        .await
        .unwrap()
        .id;

    let grn = GrnService::new(store.clone())
        .create_grn(
            admin,
            GrnInput {
                grn_number: Some(format!("GRN-{}", suffix)),
                supplier_id: Some(supplier),
                received_date: Some(Utc::now().date_naive()),
                details: vec![GrnDetailInput {
                    product_id: Some(product),
                    quantity_received: Some(6),
                    unit_cost: Some(Decimal::new(2000, 2)),
                    location: None,
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(grn.grn.total_amount, Decimal::from(120));

    let stock = StockService::new(store.clone());
    let line = |quantity| StockLineInput {
        product_id: product,
        variation_id: Some(variation),
        location: None,
        quantity,
        unit_cost: None,
        remarks: None,
    };
    stock
        .stock_in(
            admin,
            StockTransactionInput {
                reference_id: Some(grn.grn.id),
                lines: vec![line(6)],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = stock
        .stock_out(
            admin,
            StockTransactionInput {
                lines: vec![line(7)],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 6, .. }));

    let check = BinCardService::new(store)
        .verify_variation(admin, variation)
        .await
        .unwrap();
    assert!(check.consistent);
    assert_eq!(check.ledger_balance, 6);
}

#[tokio::test]
#[ignore]
async fn test_postgres_concurrent_duplicate_grn_number_conflicts() {
    let store = connect().await;
    let suffix = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let catalog = CatalogService::new(store.clone());

    let admin = catalog
        .create_employee(EmployeeInput {
            name: "Pg Racer".to_string(),
            email: None,
            role: EmployeeRole::Admin,
        })
        .await
        .unwrap()
        .id;
    let supplier = catalog
        .create_supplier(
            admin,
            SupplierInput {
                name: format!("Racing Supplier {}", suffix),
                contact_person: None,
                phone: None,
                email: None,
                address: None,
                is_active: None,
            },
        )
        .await
        .unwrap()
        .id;
    let product = catalog
        .create_product(
            admin,
            ProductInput {
                name: "Toaster".to_string(),
                sku: format!("TST-{}", suffix),
                description: None,
                is_active: None,
            },
        )
        .await
        .unwrap()
        .id;

    let input = GrnInput {
        grn_number: Some(format!("GRN-RACE-{}", suffix)),
        supplier_id: Some(supplier),
        received_date: Some(Utc::now().date_naive()),
        details: vec![GrnDetailInput {
            product_id: Some(product),
            quantity_received: Some(1),
            unit_cost: Some(Decimal::ONE),
            location: None,
        }],
        ..Default::default()
    };

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = GrnService::new(store.clone());
        let input = input.clone();
        handles.push(tokio::spawn(async move { service.create_grn(admin, input).await }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(err) => assert!(matches!(err, AppError::Conflict { .. }), "{:?}", err),
        }
    }
    assert_eq!(created, 1);
}
