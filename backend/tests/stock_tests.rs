//! Stock transaction tests
//!
//! Tests for stock movements including:
//! - Stock never goes negative
//! - Every variation line appends exactly one bin card entry
//! - The bin card balance tracks stock on hand
//! - Concurrent stock-outs cannot oversell

mod common;

use common::*;
use proptest::prelude::*;
use shared::{BinCardType, PageRequest, StockDirection, StockLineInput};
use stockroom_backend::services::listing::{ListParams, Listing, StockFilter, StockQuery};
use stockroom_backend::services::{BinCardService, ListingService, StockService};
use stockroom_backend::AppError;

// ============================================================================
// Unit Tests
// ============================================================================

#[tokio::test]
async fn test_stock_in_creates_row_and_ledger_entry() {
    let fx = fixture().await;
    let service = StockService::new(fx.store.clone());

    let posting = service
        .stock_in(fx.keeper, movement(vec![line(fx.product, Some(fx.variation), 10)]))
        .await
        .unwrap();

    assert_eq!(posting.direction, StockDirection::In);
    assert_eq!(posting.stock.len(), 1);
    assert_eq!(posting.stock[0].quantity_available, 10);
    assert_eq!(posting.stock[0].location, "MAIN");
    assert_eq!(posting.stock[0].reorder_level, 2);

    assert_eq!(posting.ledger_entries.len(), 1);
    let entry = &posting.ledger_entries[0];
    assert_eq!(entry.transaction_type, BinCardType::Grn);
    assert_eq!(entry.quantity_in, 10);
    assert_eq!(entry.quantity_out, 0);
    assert_eq!(entry.balance, 10);
    assert_eq!(entry.stock_keeper_id, fx.keeper);

    let fetched = service.get_stock(fx.viewer, posting.stock[0].id).await.unwrap();
    assert_eq!(fetched, posting.stock[0]);
}

#[tokio::test]
async fn test_stock_out_beyond_available_is_rejected() {
    let fx = fixture().await;
    let service = StockService::new(fx.store.clone());
    let bin_cards = BinCardService::new(fx.store.clone());

    service
        .stock_in(fx.keeper, movement(vec![line(fx.product, Some(fx.variation), 10)]))
        .await
        .unwrap();
    let err = service
        .stock_out(fx.keeper, movement(vec![line(fx.product, Some(fx.variation), 15)]))
        .await
        .unwrap_err();

    match err {
        AppError::InsufficientStock {
            available,
            requested,
            ..
        } => {
            assert_eq!(available, 10);
            assert_eq!(requested, 15);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let balance = bin_cards.latest_balance(fx.viewer, fx.variation).await.unwrap();
    assert_eq!(balance, 10);
    let card = bin_cards
        .bin_card(fx.viewer, fx.variation, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(card.pagination.total_items, 1);
}

#[tokio::test]
async fn test_stock_out_without_stock_row() {
    let fx = fixture().await;
    let service = StockService::new(fx.store.clone());

    let err = service
        .stock_out(fx.keeper, movement(vec![line(fx.product, Some(fx.variation), 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 0, .. }));
}

#[tokio::test]
async fn test_failing_line_rolls_back_earlier_lines() {
    let fx = fixture().await;
    let service = StockService::new(fx.store.clone());
    let bin_cards = BinCardService::new(fx.store.clone());

    service
        .stock_in(fx.keeper, movement(vec![line(fx.product, Some(fx.variation), 5)]))
        .await
        .unwrap();

    let mut other = line(fx.product, Some(fx.variation), 1);
    other.location = Some("SHELF-B".to_string());
    let err = service
        .stock_out(
            fx.keeper,
            movement(vec![line(fx.product, Some(fx.variation), 2), other]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    let balance = bin_cards.latest_balance(fx.viewer, fx.variation).await.unwrap();
    assert_eq!(balance, 5);
}

#[tokio::test]
async fn test_line_references_are_checked() {
    let fx = fixture().await;
    let service = StockService::new(fx.store.clone());

    let err = service
        .stock_in(fx.keeper, movement(vec![line(9999, None, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = service
        .stock_in(fx.keeper, movement(vec![line(fx.product, Some(9999), 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = service
        .stock_in(fx.keeper, movement(vec![line(fx.product, Some(fx.variation), 0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = service.stock_in(fx.keeper, movement(vec![])).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_variation_must_belong_to_product() {
    let fx = fixture().await;
    let catalog = stockroom_backend::services::CatalogService::new(fx.store.clone());
    let other_product = catalog
        .create_product(fx.admin, product_input("Plate", "PLT-01"))
        .await
        .unwrap();
    let service = StockService::new(fx.store.clone());

    let err = service
        .stock_in(
            fx.keeper,
            movement(vec![line(other_product.id, Some(fx.variation), 1)]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "variation_id"));
}

#[tokio::test]
async fn test_stock_in_reference_must_be_a_grn() {
    let fx = fixture().await;
    let service = StockService::new(fx.store.clone());

    let mut input = movement(vec![line(fx.product, Some(fx.variation), 1)]);
    input.reference_id = Some(321);
    let err = service.stock_in(fx.keeper, input).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_line_without_variation_writes_no_ledger_entry() {
    let fx = fixture().await;
    let service = StockService::new(fx.store.clone());

    let posting = service
        .stock_in(fx.keeper, movement(vec![line(fx.product, None, 4)]))
        .await
        .unwrap();
    assert_eq!(posting.stock[0].quantity_available, 4);
    assert!(posting.ledger_entries.is_empty());
}

#[tokio::test]
async fn test_concurrent_stock_outs_cannot_oversell() {
    let fx = fixture().await;
    let service = StockService::new(fx.store.clone());
    service
        .stock_in(fx.keeper, movement(vec![line(fx.product, Some(fx.variation), 8)]))
        .await
        .unwrap();

    let first = {
        let service = service.clone();
        let input = movement(vec![line(fx.product, Some(fx.variation), 5)]);
        let keeper = fx.keeper;
        tokio::spawn(async move { service.stock_out(keeper, input).await })
    };
    let second = {
        let service = service.clone();
        let input = movement(vec![line(fx.product, Some(fx.variation), 5)]);
        let keeper = fx.keeper;
        tokio::spawn(async move { service.stock_out(keeper, input).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::InsufficientStock { available: 3, .. }))));

    let bin_cards = BinCardService::new(fx.store.clone());
    assert_eq!(
        bin_cards.latest_balance(fx.viewer, fx.variation).await.unwrap(),
        3
    );
}

#[tokio::test]
async fn test_list_low_stock() {
    let fx = fixture().await;
    let service = StockService::new(fx.store.clone());
    let mut shelf = line(fx.product, Some(fx.variation), 1);
    shelf.location = Some("SHELF-A".to_string());
    service
        .stock_in(
            fx.keeper,
            movement(vec![line(fx.product, Some(fx.variation), 20), shelf]),
        )
        .await
        .unwrap();

    let listing = ListingService::new(fx.store.clone());
    let filter = StockFilter {
        low_stock: Some(true),
        ..Default::default()
    };
    let query: StockQuery = Listing::new(&ListParams::default(), filter, &Default::default());
    let page = listing.stock(fx.viewer, &query).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].location, "SHELF-A");
}

// ============================================================================
// Property Tests
// ============================================================================

fn arb_moves() -> impl Strategy<Value = Vec<(bool, i64)>> {
    prop::collection::vec((any::<bool>(), 1i64..40), 1..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Stock never goes negative, rejected moves change nothing and the
    /// ledger balance always equals stock on hand
    #[test]
    fn prop_ledger_tracks_stock(moves in arb_moves()) {
        tokio_test::block_on(async {
            let fx = fixture().await;
            let service = StockService::new(fx.store.clone());
            let bin_cards = BinCardService::new(fx.store.clone());
            let mut expected = 0i64;
            let mut entries = 0u64;

            for (inbound, qty) in &moves {
                let lines: Vec<StockLineInput> = vec![line(fx.product, Some(fx.variation), *qty)];
                let result = if *inbound {
                    service.stock_in(fx.keeper, movement(lines)).await
                } else {
                    service.stock_out(fx.keeper, movement(lines)).await
                };

                match result {
                    Ok(posting) => {
                        expected += if *inbound { *qty } else { -*qty };
                        entries += 1;
                        prop_assert_eq!(posting.stock[0].quantity_available, expected);
                        prop_assert_eq!(posting.ledger_entries[0].balance, expected);
                    }
                    Err(AppError::InsufficientStock { available, .. }) => {
                        prop_assert!(!*inbound);
                        prop_assert!(expected < *qty);
                        prop_assert_eq!(available, expected);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
                }
                prop_assert!(expected >= 0);
            }

            let check = bin_cards.verify_variation(fx.viewer, fx.variation).await.unwrap();
            prop_assert!(check.consistent);
            prop_assert_eq!(check.ledger_balance, expected);

            let card = bin_cards
                .bin_card(fx.viewer, fx.variation, &PageRequest { page: 1, limit: 100 })
                .await
                .unwrap();
            prop_assert_eq!(card.pagination.total_items, entries);

            let mut previous = 0i64;
            for entry in &card.items {
                prop_assert_eq!(entry.balance, previous + entry.quantity_in - entry.quantity_out);
                previous = entry.balance;
            }
            Ok(())
        })?;
    }
}
