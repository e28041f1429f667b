//! Goods received note tests
//!
//! Covers intake of GRN headers with their detail lines, subtotal and total
//! computation, the fixed order of input checks and all-or-nothing commits.

mod common;

use common::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::GrnUpdate;
use stockroom_backend::services::listing::{GrnFilter, GrnQuery, ListParams, Listing};
use stockroom_backend::services::{GrnService, ListingService};
use stockroom_backend::AppError;

// ============================================================================
// Unit Tests
// ============================================================================

#[tokio::test]
async fn test_create_grn_computes_subtotals_and_total() {
    let fx = fixture().await;
    let service = GrnService::new(fx.store.clone());

    let created = service
        .create_grn(
            fx.keeper,
            grn_input(
                "GRN-001",
                fx.supplier,
                vec![
                    grn_line(fx.product, 10, dec(2550, 2)),
                    grn_line(fx.product, 5, dec(14900, 2)),
                ],
            ),
        )
        .await
        .unwrap();

    assert_eq!(created.details.len(), 2);
    assert_eq!(created.details[0].subtotal, dec(25500, 2));
    assert_eq!(created.details[1].subtotal, dec(74500, 2));
    assert_eq!(created.calculated_total, Decimal::from(1000));
    assert_eq!(created.grn.total_amount, Decimal::from(1000));
    assert_eq!(created.grn.received_by, fx.keeper);
    assert!(created.warnings.is_empty());

    let fetched = service.get_grn(fx.viewer, created.grn.id).await.unwrap();
    assert_eq!(fetched.grn, created.grn);
    assert_eq!(fetched.details, created.details);
}

#[tokio::test]
async fn test_supplied_total_is_kept() {
    let fx = fixture().await;
    let service = GrnService::new(fx.store.clone());

    let mut input = grn_input(
        "GRN-002",
        fx.supplier,
        vec![grn_line(fx.product, 4, dec(250, 2))],
    );
    input.total_amount = Some(Decimal::from(12));

    let created = service.create_grn(fx.keeper, input).await.unwrap();
    assert_eq!(created.grn.total_amount, Decimal::from(12));
    assert_eq!(created.calculated_total, Decimal::from(10));
}

#[tokio::test]
async fn test_duplicate_grn_number_conflicts() {
    let fx = fixture().await;
    let service = GrnService::new(fx.store.clone());
    let details = vec![grn_line(fx.product, 1, Decimal::ONE)];

    service
        .create_grn(fx.keeper, grn_input("GRN-001", fx.supplier, details.clone()))
        .await
        .unwrap();
    let err = service
        .create_grn(fx.keeper, grn_input("GRN-001", fx.supplier, details))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict { .. }));
}

#[tokio::test]
async fn test_unknown_supplier_is_rejected() {
    let fx = fixture().await;
    let service = GrnService::new(fx.store.clone());

    let err = service
        .create_grn(
            fx.keeper,
            grn_input("GRN-003", 999, vec![grn_line(fx.product, 1, Decimal::ONE)]),
        )
        .await
        .unwrap_err();

    match err {
        AppError::Validation { field, message } => {
            assert_eq!(field, "supplier_id");
            assert_eq!(message, "Invalid supplier ID");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_details_are_rejected() {
    let fx = fixture().await;
    let service = GrnService::new(fx.store.clone());

    let err = service
        .create_grn(fx.keeper, grn_input("GRN-004", fx.supplier, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "details"));
}

#[tokio::test]
async fn test_failing_line_persists_nothing() {
    let fx = fixture().await;
    let service = GrnService::new(fx.store.clone());

    let err = service
        .create_grn(
            fx.keeper,
            grn_input(
                "GRN-005",
                fx.supplier,
                vec![grn_line(fx.product, 2, Decimal::ONE), grn_line(424242, 1, Decimal::ONE)],
            ),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, AppError::Validation { ref message, .. } if message == "Invalid product ID: 424242")
    );

    // The number is still free, so nothing was written
    service
        .create_grn(
            fx.keeper,
            grn_input("GRN-005", fx.supplier, vec![grn_line(fx.product, 2, Decimal::ONE)]),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_amount_overflow_is_rejected() {
    let fx = fixture().await;
    let service = GrnService::new(fx.store.clone());

    let huge_cost = Decimal::from_i128_with_scale(10_000_000_000_000_000_000_000, 0);
    let err = service
        .create_grn(
            fx.keeper,
            grn_input("GRN-006", fx.supplier, vec![grn_line(fx.product, i64::MAX, huge_cost)]),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, AppError::Validation { ref field, ref message } if field == "details.unit_cost" && message == "Amount is too large")
    );

    let err = service
        .create_grn(
            fx.keeper,
            grn_input(
                "GRN-006",
                fx.supplier,
                vec![grn_line(fx.product, 1, Decimal::MAX), grn_line(fx.product, 1, Decimal::MAX)],
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "total_amount"));

    // Neither attempt left a header behind
    let created = service
        .create_grn(
            fx.keeper,
            grn_input("GRN-006", fx.supplier, vec![grn_line(fx.product, 1, Decimal::ONE)]),
        )
        .await
        .unwrap();
    assert_eq!(created.grn.total_amount, Decimal::ONE);
}

#[tokio::test]
async fn test_unknown_stock_reference_is_dropped_with_warning() {
    let fx = fixture().await;
    let service = GrnService::new(fx.store.clone());

    let mut input = grn_input(
        "GRN-006",
        fx.supplier,
        vec![grn_line(fx.product, 1, Decimal::ONE)],
    );
    input.stock_id = Some(77);

    let created = service.create_grn(fx.keeper, input).await.unwrap();
    assert_eq!(created.grn.stock_id, None);
    assert_eq!(created.warnings.len(), 1);
}

#[tokio::test]
async fn test_viewer_cannot_create_grn() {
    let fx = fixture().await;
    let service = GrnService::new(fx.store.clone());

    let err = service
        .create_grn(
            fx.viewer,
            grn_input("GRN-007", fx.supplier, vec![grn_line(fx.product, 1, Decimal::ONE)]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = service.get_grn(9999, 1).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_update_grn_remarks_and_total() {
    let fx = fixture().await;
    let service = GrnService::new(fx.store.clone());
    let created = service
        .create_grn(
            fx.keeper,
            grn_input("GRN-008", fx.supplier, vec![grn_line(fx.product, 1, Decimal::TEN)]),
        )
        .await
        .unwrap();

    let updated = service
        .update_grn(
            fx.keeper,
            created.grn.id,
            GrnUpdate {
                remarks: Some("  checked at dock  ".to_string()),
                total_amount: Some(Decimal::from(11)),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.remarks.as_deref(), Some("checked at dock"));
    assert_eq!(updated.total_amount, Decimal::from(11));

    let err = service
        .update_grn(
            fx.keeper,
            created.grn.id,
            GrnUpdate {
                remarks: None,
                total_amount: Some(Decimal::from(-1)),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_list_grns_filters_and_searches() {
    let fx = fixture().await;
    let service = GrnService::new(fx.store.clone());
    for (number, qty) in [("GRN-A1", 1), ("GRN-A2", 50), ("INV-B1", 3)] {
        service
            .create_grn(
                fx.keeper,
                grn_input(number, fx.supplier, vec![grn_line(fx.product, qty, Decimal::ONE)]),
            )
            .await
            .unwrap();
    }

    let listing = ListingService::new(fx.store.clone());
    let params = ListParams {
        search: Some("grn-a".to_string()),
        sort_by: Some("total_amount".to_string()),
        sort_order: Some("asc".to_string()),
        ..Default::default()
    };
    let query: GrnQuery = Listing::new(&params, GrnFilter::default(), &Default::default());
    let page = listing.grns(fx.viewer, &query).await.unwrap();

    assert_eq!(page.pagination.total_items, 2);
    assert_eq!(page.items[0].grn_number, "GRN-A1");
    assert_eq!(page.items[1].grn_number, "GRN-A2");

    let filter = GrnFilter {
        min_total: Some(Decimal::from(10)),
        ..Default::default()
    };
    let query: GrnQuery = Listing::new(&ListParams::default(), filter, &Default::default());
    let page = listing.grns(fx.viewer, &query).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].grn_number, "GRN-A2");
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// The stored total equals the sum of quantity times unit cost
    #[test]
    fn prop_grn_total_is_sum_of_subtotals(
        lines in prop::collection::vec((1i64..500, 0i64..100_000), 1..6)
    ) {
        tokio_test::block_on(async {
            let fx = fixture().await;
            let service = GrnService::new(fx.store.clone());
            let details = lines
                .iter()
                .map(|(qty, cents)| grn_line(fx.product, *qty, dec(*cents, 2)))
                .collect();

            let created = service
                .create_grn(fx.keeper, grn_input("GRN-P", fx.supplier, details))
                .await
                .unwrap();

            let expected: Decimal = lines
                .iter()
                .map(|(qty, cents)| Decimal::from(*qty) * dec(*cents, 2))
                .sum();
            prop_assert_eq!(created.grn.total_amount, expected);
            for detail in &created.details {
                prop_assert_eq!(
                    detail.subtotal,
                    Decimal::from(detail.quantity_received) * detail.unit_cost
                );
            }
            Ok(())
        })?;
    }
}
