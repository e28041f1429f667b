//! Catalog tests: suppliers, products and variations

mod common;

use common::*;
use rust_decimal::Decimal;
use stockroom_backend::services::listing::{
    ListParams, Listing, VariationFilter, VariationQuery,
};
use stockroom_backend::services::{CatalogService, GrnService, ListingService, StockService};
use stockroom_backend::AppError;

#[tokio::test]
async fn test_only_managers_edit_the_catalog() {
    let fx = fixture().await;
    let catalog = CatalogService::new(fx.store.clone());

    let err = catalog
        .create_supplier(fx.keeper, supplier_input("Other"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let supplier = catalog.get_supplier(fx.viewer, fx.supplier).await.unwrap();
    assert_eq!(supplier.name, "Acme Supplies");
}

#[tokio::test]
async fn test_supplier_input_is_validated() {
    let fx = fixture().await;
    let catalog = CatalogService::new(fx.store.clone());

    let mut input = supplier_input("Bad Mail");
    input.email = Some("not-an-email".to_string());
    let err = catalog.create_supplier(fx.admin, input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "email"));
}

#[tokio::test]
async fn test_update_and_delete_supplier() {
    let fx = fixture().await;
    let catalog = CatalogService::new(fx.store.clone());
    let supplier = catalog
        .create_supplier(fx.admin, supplier_input("Short Lived"))
        .await
        .unwrap();

    let mut input = supplier_input("Short Lived Ltd");
    input.phone = Some("555-0101".to_string());
    let updated = catalog
        .update_supplier(fx.admin, supplier.id, input)
        .await
        .unwrap();
    assert_eq!(updated.name, "Short Lived Ltd");
    assert_eq!(updated.updated_by, Some(fx.admin));

    catalog.delete_supplier(fx.admin, supplier.id).await.unwrap();
    let err = catalog.get_supplier(fx.admin, supplier.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_referenced_supplier_cannot_be_deleted() {
    let fx = fixture().await;
    GrnService::new(fx.store.clone())
        .create_grn(
            fx.keeper,
            grn_input("GRN-900", fx.supplier, vec![grn_line(fx.product, 1, Decimal::ONE)]),
        )
        .await
        .unwrap();

    let catalog = CatalogService::new(fx.store.clone());
    let err = catalog.delete_supplier(fx.admin, fx.supplier).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
}

#[tokio::test]
async fn test_sku_is_unique_among_live_products() {
    let fx = fixture().await;
    let catalog = CatalogService::new(fx.store.clone());

    let err = catalog
        .create_product(fx.admin, product_input("Mug again", "MUG-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let plate = catalog
        .create_product(fx.admin, product_input("Plate", "PLT-01"))
        .await
        .unwrap();
    catalog.delete_product(fx.admin, plate.id).await.unwrap();

    // A deleted product releases its sku
    catalog
        .create_product(fx.admin, product_input("Plate v2", "PLT-01"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_product_with_variations_cannot_be_deleted() {
    let fx = fixture().await;
    let catalog = CatalogService::new(fx.store.clone());

    let err = catalog.delete_product(fx.admin, fx.product).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
}

#[tokio::test]
async fn test_barcode_is_unique_among_live_variations() {
    let fx = fixture().await;
    let catalog = CatalogService::new(fx.store.clone());

    let err = catalog
        .create_variation(fx.admin, variation_input(fx.product, "Dup", Some("RED-350")))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    // Saving a variation with its own barcode is not a conflict
    let updated = catalog
        .update_variation(
            fx.admin,
            fx.variation,
            variation_input(fx.product, "Red Mug XL", Some("RED-350")),
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Red Mug XL");
}

#[tokio::test]
async fn test_variation_input_rules() {
    let fx = fixture().await;
    let catalog = CatalogService::new(fx.store.clone());

    let mut negative = variation_input(fx.product, "Cheap", None);
    negative.price = Decimal::from(-1);
    let err = catalog.create_variation(fx.admin, negative).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let mut levels = variation_input(fx.product, "Levels", None);
    levels.min_stock_level = Some(10);
    levels.max_stock_level = Some(5);
    let err = catalog.create_variation(fx.admin, levels).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = catalog
        .create_variation(fx.admin, variation_input(777, "Orphan", None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_) | AppError::Validation { .. }));
}

#[tokio::test]
async fn test_variation_with_movements_cannot_be_deleted() {
    let fx = fixture().await;
    StockService::new(fx.store.clone())
        .stock_in(fx.keeper, movement(vec![line(fx.product, Some(fx.variation), 1)]))
        .await
        .unwrap();

    let catalog = CatalogService::new(fx.store.clone());
    let err = catalog
        .delete_variation(fx.admin, fx.variation)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let spare = catalog
        .create_variation(fx.admin, variation_input(fx.product, "Spare", None))
        .await
        .unwrap();
    catalog.delete_variation(fx.admin, spare.id).await.unwrap();
    let err = catalog.get_variation(fx.admin, spare.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_list_variations_hides_deleted_and_pages() {
    let fx = fixture().await;
    let catalog = CatalogService::new(fx.store.clone());
    for name in ["Blue Mug", "Green Mug", "Blue Bowl"] {
        catalog
            .create_variation(fx.admin, variation_input(fx.product, name, None))
            .await
            .unwrap();
    }
    let gone = catalog
        .create_variation(fx.admin, variation_input(fx.product, "Blue Gone", None))
        .await
        .unwrap();
    catalog.delete_variation(fx.admin, gone.id).await.unwrap();

    let listing = ListingService::new(fx.store.clone());
    let params = ListParams {
        search: Some("BLUE".to_string()),
        sort_by: Some("name".to_string()),
        sort_order: Some("asc".to_string()),
        limit: Some(1),
        page: Some(2),
    };
    let query: VariationQuery =
        Listing::new(&params, VariationFilter::default(), &Default::default());
    let page = listing.variations(fx.viewer, &query).await.unwrap();

    assert_eq!(page.pagination.total_items, 2);
    assert_eq!(page.pagination.total_pages, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "Blue Mug");
}
