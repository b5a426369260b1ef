//! Integration tests for the ledger, balance and catalog repositories.

mod common;

use armory_core::balance::BalanceFilter;
use armory_core::catalog::NewSite;
use armory_core::ledger::{
    CreateAcquisitionInput, CreateConsumptionInput, CreateIssuanceInput, CreateTransferInput,
    MovementAmendment, MovementFilter, MovementKind, MovementOrdering, Recipient, StockError,
    TransitionError, TransferStatus, ValidationError,
};
use armory_core::scope::{Caller, SiteVisibility};
use armory_shared::types::{DateRange, PageRequest, UserId};
use chrono::Utc;
use common::{Fixture, at, fixture};
use rust_decimal_macros::dec;

fn issuance(fx: &Fixture, site: usize, quantity: rust_decimal::Decimal) -> CreateIssuanceInput {
    CreateIssuanceInput {
        site: fx.sites[site].id,
        item_type_id: fx.item.id,
        quantity,
        recipient: Recipient {
            name: "Sgt. Okafor".to_string(),
            personnel_id: Some("P-2201".to_string()),
        },
        effective_at: at(5),
    }
}

fn transfer(fx: &Fixture, quantity: rust_decimal::Decimal) -> CreateTransferInput {
    CreateTransferInput {
        source: fx.sites[0].id,
        destination: fx.sites[1].id,
        item_type_id: fx.item.id,
        quantity,
        status: None,
        effective_at: at(6),
    }
}

fn site_filter(fx: &Fixture, site: usize) -> MovementFilter {
    MovementFilter {
        site_id: Some(fx.sites[site].id),
        ..MovementFilter::default()
    }
}

// ============================================================================
// Issuance and returns
// ============================================================================

#[tokio::test]
async fn test_issue_and_return_adjusts_balance() {
    let Some(fx) = fixture(1).await else { return };
    fx.stock(0, dec!(10), 1).await;

    let issued = fx
        .ledger
        .create_issuance(&fx.admin, &issuance(&fx, 0, dec!(4)))
        .await
        .unwrap();
    assert_eq!(fx.balance(0).await, dec!(6));
    assert_eq!(issued.outstanding(), Some(dec!(4)));

    let returned = fx
        .ledger
        .record_return(&fx.admin, issued.id, dec!(3), None)
        .await
        .unwrap();
    assert_eq!(fx.balance(0).await, dec!(9));
    assert_eq!(returned.outstanding(), Some(dec!(1)));

    // Restating the same returned quantity changes nothing.
    fx.ledger
        .record_return(&fx.admin, issued.id, dec!(3), None)
        .await
        .unwrap();
    assert_eq!(fx.balance(0).await, dec!(9));

    let err = fx
        .ledger
        .record_return(&fx.admin, issued.id, dec!(2), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StockError::InvalidTransition(TransitionError::ReturnDecrease { .. })
    ));
    assert_eq!(fx.balance(0).await, dec!(9));
}

#[tokio::test]
async fn test_insufficient_stock_persists_nothing() {
    let Some(fx) = fixture(1).await else { return };
    fx.stock(0, dec!(3), 1).await;

    let err = fx
        .ledger
        .create_issuance(&fx.admin, &issuance(&fx, 0, dec!(5)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StockError::InsufficientStock { available, requested, .. }
            if available == dec!(3) && requested == dec!(5)
    ));
    assert_eq!(fx.balance(0).await, dec!(3));

    let issuances = fx
        .ledger
        .list_movements(
            &fx.admin,
            &MovementFilter {
                kind: Some(MovementKind::Issuance),
                ..site_filter(&fx, 0)
            },
            MovementOrdering::default(),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(issuances.meta.total, 0);
}

#[tokio::test]
async fn test_consumption_debits_site() {
    let Some(fx) = fixture(1).await else { return };
    fx.stock(0, dec!(8.50), 1).await;

    fx.ledger
        .create_consumption(
            &fx.admin,
            &CreateConsumptionInput {
                site: fx.sites[0].id,
                item_type_id: fx.item.id,
                quantity: dec!(2.25),
                reason: "Range qualification".to_string(),
                effective_at: at(2),
            },
        )
        .await
        .unwrap();

    assert_eq!(fx.balance(0).await, dec!(6.25));
}

// ============================================================================
// Transfers
// ============================================================================

#[tokio::test]
async fn test_transfer_moves_stock_once_on_completion() {
    let Some(fx) = fixture(2).await else { return };
    fx.stock(0, dec!(20), 1).await;

    let created = fx
        .ledger
        .create_transfer(&fx.admin, &transfer(&fx, dec!(7)))
        .await
        .unwrap();
    assert_eq!(created.transfer_status(), Some(TransferStatus::Pending));
    assert_eq!(fx.balance(0).await, dec!(20));
    assert_eq!(fx.balance(1).await, dec!(0));

    fx.ledger
        .transition_transfer(&fx.admin, created.id, TransferStatus::InTransit)
        .await
        .unwrap();
    assert_eq!(fx.balance(0).await, dec!(20));

    let completed = fx
        .ledger
        .transition_transfer(&fx.admin, created.id, TransferStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.transfer_status(), Some(TransferStatus::Completed));
    assert_eq!(fx.balance(0).await, dec!(13));
    assert_eq!(fx.balance(1).await, dec!(7));

    let err = fx
        .ledger
        .transition_transfer(&fx.admin, created.id, TransferStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::InvalidTransition(_)));
    assert_eq!(fx.balance(0).await, dec!(13));
    assert_eq!(fx.balance(1).await, dec!(7));
}

#[tokio::test]
async fn test_cancelled_transfer_cannot_complete() {
    let Some(fx) = fixture(2).await else { return };
    fx.stock(0, dec!(5), 1).await;

    let created = fx
        .ledger
        .create_transfer(&fx.admin, &transfer(&fx, dec!(5)))
        .await
        .unwrap();
    fx.ledger
        .transition_transfer(&fx.admin, created.id, TransferStatus::Cancelled)
        .await
        .unwrap();

    let err = fx
        .ledger
        .transition_transfer(&fx.admin, created.id, TransferStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StockError::InvalidTransition(TransitionError::Transfer {
            from: TransferStatus::Cancelled,
            to: TransferStatus::Completed,
        })
    ));
    assert_eq!(fx.balance(0).await, dec!(5));
}

#[tokio::test]
async fn test_completion_checks_source_stock() {
    let Some(fx) = fixture(2).await else { return };
    fx.stock(0, dec!(4), 1).await;

    // Creation does not reserve stock, so the request itself is accepted.
    let created = fx
        .ledger
        .create_transfer(&fx.admin, &transfer(&fx, dec!(6)))
        .await
        .unwrap();

    let err = fx
        .ledger
        .transition_transfer(&fx.admin, created.id, TransferStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::InsufficientStock { .. }));

    let reloaded = fx.ledger.get_movement(&fx.admin, created.id).await.unwrap();
    assert_eq!(reloaded.transfer_status(), Some(TransferStatus::Pending));
    assert_eq!(fx.balance(1).await, dec!(0));
}

#[tokio::test]
async fn test_same_site_transfer_rejected() {
    let Some(fx) = fixture(2).await else { return };
    let mut input = transfer(&fx, dec!(1));
    input.destination = input.source;

    let err = fx
        .ledger
        .create_transfer(&fx.admin, &input)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StockError::Validation(ValidationError::SameSiteTransfer)
    ));
}

// ============================================================================
// Amendments and deletion
// ============================================================================

#[tokio::test]
async fn test_immutable_fields_rejected() {
    let Some(fx) = fixture(1).await else { return };
    let acquisition = fx.stock(0, dec!(10), 1).await;

    let err = fx
        .ledger
        .amend(
            &fx.admin,
            acquisition.id,
            MovementAmendment {
                quantity: Some(dec!(12)),
                ..MovementAmendment::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StockError::ImmutableField { field: "quantity" }
    ));
    assert_eq!(fx.balance(0).await, dec!(10));
}

#[tokio::test]
async fn test_created_movement_matches_stored_row() {
    let Some(fx) = fixture(1).await else { return };
    let effective_at = Utc::now();

    let created = fx
        .ledger
        .create_acquisition(
            &fx.admin,
            &CreateAcquisitionInput {
                destination: fx.sites[0].id,
                item_type_id: fx.item.id,
                quantity: dec!(10),
                source_description: "Depot resupply".to_string(),
                effective_at,
            },
        )
        .await
        .unwrap();
    let fetched = fx.ledger.get_movement(&fx.admin, created.id).await.unwrap();
    assert_eq!(created, fetched);

    for restated in [created.effective_at, effective_at] {
        let amended = fx
            .ledger
            .amend(
                &fx.admin,
                created.id,
                MovementAmendment {
                    effective_at: Some(restated),
                    ..MovementAmendment::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(amended, fetched);
    }
}

#[tokio::test]
async fn test_balance_past_capacity_rejected() {
    let Some(fx) = fixture(1).await else { return };
    fx.stock(0, dec!(99999999.99), 1).await;

    let err = fx
        .ledger
        .create_acquisition(
            &fx.admin,
            &CreateAcquisitionInput {
                destination: fx.sites[0].id,
                item_type_id: fx.item.id,
                quantity: dec!(1),
                source_description: "Depot resupply".to_string(),
                effective_at: at(2),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StockError::Validation(ValidationError::BalanceOverflow { .. })
    ));
    assert_eq!(fx.balance(0).await, dec!(99999999.99));
}

#[tokio::test]
async fn test_soft_delete_hides_movement_and_keeps_balance() {
    let Some(fx) = fixture(1).await else { return };
    let acquisition = fx.stock(0, dec!(10), 1).await;

    fx.ledger
        .soft_delete(&fx.admin, acquisition.id)
        .await
        .unwrap();

    let err = fx
        .ledger
        .get_movement(&fx.admin, acquisition.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::MovementNotFound(_)));

    let listed = fx
        .ledger
        .list_movements(
            &fx.admin,
            &site_filter(&fx, 0),
            MovementOrdering::default(),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(listed.meta.total, 0);
    assert_eq!(fx.balance(0).await, dec!(10));

    let err = fx
        .ledger
        .record_return(&fx.admin, acquisition.id, dec!(1), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::MovementNotFound(_)));
}

#[tokio::test]
async fn test_deleted_site_rejected_for_new_movements() {
    let Some(fx) = fixture(1).await else { return };
    fx.catalog.soft_delete_site(fx.sites[0].id).await.unwrap();

    let err = fx
        .ledger
        .create_issuance(&fx.admin, &issuance(&fx, 0, dec!(1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StockError::Validation(ValidationError::SiteDeleted(_))
    ));
}

// ============================================================================
// Visibility
// ============================================================================

#[tokio::test]
async fn test_restricted_caller_scope() {
    let Some(fx) = fixture(2).await else { return };
    fx.stock(0, dec!(10), 1).await;
    let other = fx.stock(1, dec!(10), 1).await;
    let clerk = Caller::restricted(UserId::new(), fx.sites[0].id);

    let err = fx
        .ledger
        .create_issuance(&clerk, &issuance(&fx, 1, dec!(1)))
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::Forbidden { .. }));
    assert_eq!(fx.balance(1).await, dec!(10));

    let err = fx.ledger.get_movement(&clerk, other.id).await.unwrap_err();
    assert!(matches!(err, StockError::MovementNotFound(_)));

    let err = fx
        .balances
        .get_balance(&clerk, fx.sites[1].id, fx.item.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::Forbidden { .. }));

    // A transfer into the clerk's site is visible from either side.
    let inbound = fx
        .ledger
        .create_transfer(
            &fx.admin,
            &CreateTransferInput {
                source: fx.sites[1].id,
                destination: fx.sites[0].id,
                ..transfer(&fx, dec!(2))
            },
        )
        .await
        .unwrap();
    fx.ledger.get_movement(&clerk, inbound.id).await.unwrap();

    let page = fx
        .ledger
        .list_movements(
            &clerk,
            &MovementFilter {
                item_type_id: Some(fx.item.id),
                ..MovementFilter::default()
            },
            MovementOrdering::default(),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.meta.total, 2);
    assert!(page.data.iter().all(|m| m.sites().contains(&fx.sites[0].id)));

    let visible = fx
        .balances
        .list_balances(
            &clerk,
            BalanceFilter {
                item_type_id: Some(fx.item.id),
                ..BalanceFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].site_id, fx.sites[0].id);

    let sites = fx
        .catalog
        .list_sites(&SiteVisibility::Site(fx.sites[0].id))
        .await
        .unwrap();
    assert_eq!(sites.len(), 1);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_orders_and_paginates() {
    let Some(fx) = fixture(1).await else { return };
    for day in [3, 1, 2] {
        fx.stock(0, dec!(1), day).await;
    }

    let first = fx
        .ledger
        .list_movements(
            &fx.admin,
            &site_filter(&fx, 0),
            MovementOrdering::EffectiveDesc,
            PageRequest::new(1, 2),
        )
        .await
        .unwrap();
    assert_eq!(first.meta.total, 3);
    assert_eq!(first.meta.total_pages, 2);
    let days: Vec<_> = first.data.iter().map(|m| m.effective_at).collect();
    assert_eq!(days, vec![at(3), at(2)]);

    let ascending = fx
        .ledger
        .list_movements(
            &fx.admin,
            &MovementFilter {
                date_range: DateRange::new(Some(at(2)), Some(at(3))).unwrap(),
                ..site_filter(&fx, 0)
            },
            MovementOrdering::EffectiveAsc,
            PageRequest::default(),
        )
        .await
        .unwrap();
    let days: Vec<_> = ascending.data.iter().map(|m| m.effective_at).collect();
    assert_eq!(days, vec![at(2), at(3)]);

    assert_eq!(
        fx.balances
            .stocked_item_count(&fx.admin, fx.sites[0].id)
            .await
            .unwrap(),
        1
    );
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_duplicate_site_code_conflicts() {
    let Some(fx) = fixture(1).await else { return };

    let err = fx
        .catalog
        .create_site(&NewSite {
            code: fx.sites[0].code.clone(),
            name: format!("{} copy", fx.sites[0].name),
            location: "Elsewhere".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::CatalogConflict(_)));

    let item = fx.catalog.get_item_type(fx.item.id).await.unwrap();
    assert_eq!(item.unit, "units");
}
