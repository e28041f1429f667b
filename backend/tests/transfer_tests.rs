//! CSV import/export and bin card read tests

mod common;

use common::*;
use shared::PageRequest;
use stockroom_backend::services::{BinCardService, StockService, TransferService};
use stockroom_backend::AppError;

#[tokio::test]
async fn test_import_posts_one_stock_in() {
    let fx = fixture().await;
    let transfer = TransferService::new(fx.store.clone());

    let data = format!(
        "product_id,variation_id,location,quantity,unit_cost\n\
         {p},{v},MAIN,12,3.20\n\
         {p},,BACK,4,\n",
        p = fx.product,
        v = fx.variation
    );
    let posting = transfer
        .import_stock(fx.keeper, &data, Some("Opening balance".to_string()))
        .await
        .unwrap();

    assert_eq!(posting.stock.len(), 2);
    assert_eq!(posting.ledger_entries.len(), 1);
    assert_eq!(posting.ledger_entries[0].balance, 12);
    assert_eq!(
        posting.ledger_entries[0].remarks.as_deref(),
        Some("Opening balance")
    );
}

#[tokio::test]
async fn test_import_with_bad_row_changes_nothing() {
    let fx = fixture().await;
    let transfer = TransferService::new(fx.store.clone());

    let data = format!(
        "product_id,variation_id,location,quantity,unit_cost\n\
         {p},{v},MAIN,12,\n\
         {p},{v},MAIN,lots,\n",
        p = fx.product,
        v = fx.variation
    );
    let err = transfer.import_stock(fx.keeper, &data, None).await.unwrap_err();
    match err {
        AppError::Validation { field, message } => {
            assert_eq!(field, "file");
            assert!(message.starts_with("Row 2"), "{}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let export = transfer.export_stock(fx.viewer).await.unwrap();
    assert_eq!(export.lines().count(), 1);
}

#[tokio::test]
async fn test_viewer_cannot_import() {
    let fx = fixture().await;
    let transfer = TransferService::new(fx.store.clone());

    let data = format!(
        "product_id,variation_id,location,quantity,unit_cost\n{},,MAIN,1,\n",
        fx.product
    );
    let err = transfer.import_stock(fx.viewer, &data, None).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_export_stock_and_bin_card() {
    let fx = fixture().await;
    let stock = StockService::new(fx.store.clone());
    stock
        .stock_in(fx.keeper, movement(vec![line(fx.product, Some(fx.variation), 9)]))
        .await
        .unwrap();
    stock
        .stock_out(fx.keeper, movement(vec![line(fx.product, Some(fx.variation), 4)]))
        .await
        .unwrap();

    let transfer = TransferService::new(fx.store.clone());
    let csv = transfer.export_stock(fx.viewer).await.unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("id,product_id,variation_id,location,quantity_available"));
    assert!(rows[1].contains(",MAIN,5,"));

    let card = transfer.export_bin_card(fx.viewer, fx.variation).await.unwrap();
    let rows: Vec<&str> = card.lines().collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[1].contains("GRN"));
    assert!(rows[2].contains("GIN"));

    let err = transfer.export_bin_card(fx.viewer, 5050).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_bin_card_reads() {
    let fx = fixture().await;
    let bin_cards = BinCardService::new(fx.store.clone());

    assert_eq!(
        bin_cards.latest_balance(fx.viewer, fx.variation).await.unwrap(),
        0
    );
    let err = bin_cards.latest_balance(fx.viewer, 5050).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let stock = StockService::new(fx.store.clone());
    for qty in [3, 4, 5] {
        stock
            .stock_in(fx.keeper, movement(vec![line(fx.product, Some(fx.variation), qty)]))
            .await
            .unwrap();
    }

    let page = bin_cards
        .bin_card(fx.viewer, fx.variation, &PageRequest { page: 2, limit: 2 })
        .await
        .unwrap();
    assert_eq!(page.pagination.total_items, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].balance, 12);

    let check = bin_cards.verify_variation(fx.viewer, fx.variation).await.unwrap();
    assert!(check.consistent);
    assert_eq!(check.stock_quantity, 12);
}
