//! Supplier return tests

mod common;

use common::*;
use shared::{
    ReturnDetailInput, ReturnInput, ReturnStatus, ReturnStatusUpdate, ReturnType,
};
use stockroom_backend::services::listing::{ListParams, Listing, ReturnFilter, ReturnQuery};
use stockroom_backend::services::{ListingService, ReturnService};
use stockroom_backend::AppError;

fn return_input(number: &str, supplier_id: i64, variation_id: i64) -> ReturnInput {
    ReturnInput {
        return_number: Some(number.to_string()),
        supplier_id: Some(supplier_id),
        return_date: Some(date(2024, 2, 1)),
        return_type: Some(ReturnType::DamagedReturn),
        reason: Some("Cracked in transit".to_string()),
        details: vec![ReturnDetailInput {
            variation_id: Some(variation_id),
            quantity: Some(3),
            remarks: None,
        }],
        ..Default::default()
    }
}

fn status(status: ReturnStatus) -> ReturnStatusUpdate {
    ReturnStatusUpdate {
        status,
        remarks: None,
    }
}

#[tokio::test]
async fn test_create_return_starts_pending() {
    let fx = fixture().await;
    let service = ReturnService::new(fx.store.clone());

    let created = service
        .create_return(fx.keeper, return_input("RET-001", fx.supplier, fx.variation))
        .await
        .unwrap();

    assert_eq!(created.header.status, ReturnStatus::Pending);
    assert!(!created.header.approved);
    assert_eq!(created.header.returned_by, fx.keeper);
    assert_eq!(created.header.return_type, ReturnType::DamagedReturn);
    assert_eq!(created.details.len(), 1);
    assert_eq!(created.details[0].quantity_returned, 3);

    let fetched = service.get_return(fx.viewer, created.header.id).await.unwrap();
    assert_eq!(fetched.header, created.header);
}

#[tokio::test]
async fn test_duplicate_return_number_conflicts() {
    let fx = fixture().await;
    let service = ReturnService::new(fx.store.clone());

    service
        .create_return(fx.keeper, return_input("RET-001", fx.supplier, fx.variation))
        .await
        .unwrap();
    let err = service
        .create_return(fx.keeper, return_input("RET-001", fx.supplier, fx.variation))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
}

#[tokio::test]
async fn test_return_references_are_checked() {
    let fx = fixture().await;
    let service = ReturnService::new(fx.store.clone());

    let err = service
        .create_return(fx.keeper, return_input("RET-002", 404, fx.variation))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = service
        .create_return(fx.keeper, return_input("RET-003", fx.supplier, 404))
        .await
        .unwrap_err();
    assert!(
        matches!(err, AppError::Validation { ref field, ref message } if field == "details.variation_id" && message == "Invalid variation ID: 404")
    );

    let mut empty = return_input("RET-004", fx.supplier, fx.variation);
    empty.details.clear();
    let err = service.create_return(fx.keeper, empty).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_failing_detail_persists_no_return() {
    let fx = fixture().await;
    let service = ReturnService::new(fx.store.clone());

    let mut input = return_input("RET-005", fx.supplier, fx.variation);
    input.details.push(ReturnDetailInput {
        variation_id: Some(404),
        quantity: Some(1),
        remarks: None,
    });
    let err = service.create_return(fx.keeper, input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "details.variation_id"));

    let listing = ListingService::new(fx.store.clone());
    let query: ReturnQuery =
        Listing::new(&ListParams::default(), ReturnFilter::default(), &Default::default());
    let page = listing.returns(fx.viewer, &query).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.pagination.total_items, 0);

    // The header of the failed attempt was rolled back with its first detail
    let created = service
        .create_return(fx.keeper, return_input("RET-005", fx.supplier, fx.variation))
        .await
        .unwrap();
    assert_eq!(created.details.len(), 1);
}

#[tokio::test]
async fn test_status_workflow() {
    let fx = fixture().await;
    let service = ReturnService::new(fx.store.clone());
    let id = service
        .create_return(fx.keeper, return_input("RET-010", fx.supplier, fx.variation))
        .await
        .unwrap()
        .header
        .id;

    let err = service
        .update_return_status(fx.keeper, id, status(ReturnStatus::Approved))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let approved = service
        .update_return_status(fx.admin, id, status(ReturnStatus::Approved))
        .await
        .unwrap();
    assert_eq!(approved.status, ReturnStatus::Approved);
    assert!(approved.approved);

    let err = service
        .update_return_status(fx.admin, id, status(ReturnStatus::Pending))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    let completed = service
        .update_return_status(
            fx.admin,
            id,
            ReturnStatusUpdate {
                status: ReturnStatus::Completed,
                remarks: Some("Credit note received".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(completed.status, ReturnStatus::Completed);
    assert_eq!(completed.remarks.as_deref(), Some("Credit note received"));

    let err = service
        .update_return_status(fx.admin, id, status(ReturnStatus::Cancelled))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn test_list_returns_by_status() {
    let fx = fixture().await;
    let service = ReturnService::new(fx.store.clone());
    let first = service
        .create_return(fx.keeper, return_input("RET-020", fx.supplier, fx.variation))
        .await
        .unwrap();
    service
        .create_return(fx.keeper, return_input("RET-021", fx.supplier, fx.variation))
        .await
        .unwrap();
    service
        .update_return_status(fx.admin, first.header.id, status(ReturnStatus::Rejected))
        .await
        .unwrap();

    let listing = ListingService::new(fx.store.clone());
    let filter = ReturnFilter {
        status: Some(ReturnStatus::Pending),
        ..Default::default()
    };
    let query: ReturnQuery = Listing::new(&ListParams::default(), filter, &Default::default());
    let page = listing.returns(fx.viewer, &query).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].return_number, "RET-021");
}
