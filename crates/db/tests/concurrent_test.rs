//! Concurrent access stress tests for balance-row locking.
//!
//! These tests verify that:
//! - Concurrent debits against one balance never overdraw it
//! - A transfer completed from many tasks at once moves stock exactly once
//! - Opposing transfers between two sites do not deadlock
//! - A balance row held past the lock timeout surfaces as contention
//! - A site deleted while a movement waits on it rejects the movement

#![allow(clippy::items_after_statements)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use armory_core::ledger::{
    CreateAcquisitionInput, CreateConsumptionInput, CreateIssuanceInput, CreateTransferInput,
    MovementFilter, MovementKind, MovementOrdering, Recipient, StockError, TransferStatus,
    ValidationError,
};
use armory_db::LedgerRepository;
use armory_db::entities::{balances, sites};
use armory_shared::config::LedgerConfig;
use armory_shared::types::PageRequest;
use common::{at, fixture};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QuerySelect, TransactionTrait};
use tokio::sync::Barrier;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issuances_never_overdraw() {
    let Some(fx) = fixture(1).await else { return };
    fx.stock(0, dec!(10), 1).await;

    const TASKS: usize = 25;
    let barrier = Arc::new(Barrier::new(TASKS));
    let handles = (0..TASKS).map(|n| {
        let ledger = fx.ledger.clone();
        let caller = fx.admin;
        let barrier = Arc::clone(&barrier);
        let input = CreateIssuanceInput {
            site: fx.sites[0].id,
            item_type_id: fx.item.id,
            quantity: dec!(1),
            recipient: Recipient {
                name: format!("Recipient {n}"),
                personnel_id: None,
            },
            effective_at: at(2),
        };
        tokio::spawn(async move {
            barrier.wait().await;
            ledger.create_issuance(&caller, &input).await
        })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                err,
                StockError::InsufficientStock { .. } | StockError::Contention { .. }
            ),
            "unexpected error: {err}"
        );
    }

    let balance = fx.balance(0).await;
    assert!(balance >= Decimal::ZERO);
    assert!(succeeded <= 10);
    assert_eq!(balance, dec!(10) - Decimal::from(succeeded));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_completion_applies_once() {
    let Some(fx) = fixture(2).await else { return };
    fx.stock(0, dec!(50), 1).await;
    let transfer = fx
        .ledger
        .create_transfer(
            &fx.admin,
            &CreateTransferInput {
                source: fx.sites[0].id,
                destination: fx.sites[1].id,
                item_type_id: fx.item.id,
                quantity: dec!(15),
                status: Some(TransferStatus::InTransit),
                effective_at: at(3),
            },
        )
        .await
        .unwrap();

    const TASKS: usize = 8;
    let barrier = Arc::new(Barrier::new(TASKS));
    let handles = (0..TASKS).map(|_| {
        let ledger = fx.ledger.clone();
        let caller = fx.admin;
        let barrier = Arc::clone(&barrier);
        let id = transfer.id;
        tokio::spawn(async move {
            barrier.wait().await;
            ledger
                .transition_transfer(&caller, id, TransferStatus::Completed)
                .await
        })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let completed = results.iter().filter(|r| r.is_ok()).count();
    let contended = results
        .iter()
        .filter(|r| matches!(r, Err(StockError::Contention { .. })))
        .count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(StockError::InvalidTransition(_))))
        .count();

    assert_eq!(completed, 1);
    assert_eq!(completed + contended + rejected, TASKS);
    assert_eq!(fx.balance(0).await, dec!(35));
    assert_eq!(fx.balance(1).await, dec!(15));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_conserve_stock() {
    let Some(fx) = fixture(2).await else { return };
    fx.stock(0, dec!(40), 1).await;
    fx.stock(1, dec!(40), 1).await;

    let mut ids = Vec::new();
    for (source, destination) in [(0, 1), (1, 0)].into_iter().cycle().take(10) {
        let created = fx
            .ledger
            .create_transfer(
                &fx.admin,
                &CreateTransferInput {
                    source: fx.sites[source].id,
                    destination: fx.sites[destination].id,
                    item_type_id: fx.item.id,
                    quantity: dec!(3),
                    status: None,
                    effective_at: at(4),
                },
            )
            .await
            .unwrap();
        ids.push(created.id);
    }

    let barrier = Arc::new(Barrier::new(ids.len()));
    let handles = ids.into_iter().map(|id| {
        let ledger = fx.ledger.clone();
        let caller = fx.admin;
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            ledger
                .transition_transfer(&caller, id, TransferStatus::Completed)
                .await
        })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    for result in &results {
        assert!(
            matches!(result, Ok(_) | Err(StockError::Contention { .. })),
            "unexpected result: {result:?}"
        );
    }

    let total = fx.balance(0).await + fx.balance(1).await;
    assert_eq!(total, dec!(80));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_held_balance_row_surfaces_contention() {
    let Some(fx) = fixture(1).await else { return };
    fx.stock(0, dec!(10), 1).await;
    let ledger = LedgerRepository::with_config(
        fx.db.clone(),
        &LedgerConfig {
            max_attempts: 2,
            base_backoff_ms: 10,
            max_backoff_ms: 20,
            lock_timeout_ms: 100,
        },
    );

    let holder = fx.db.begin().await.unwrap();
    balances::Entity::find()
        .filter(balances::Column::SiteId.eq(fx.sites[0].id.into_inner()))
        .filter(balances::Column::ItemTypeId.eq(fx.item.id.into_inner()))
        .lock_exclusive()
        .one(&holder)
        .await
        .unwrap()
        .expect("balance row exists");

    let err = ledger
        .create_consumption(
            &fx.admin,
            &CreateConsumptionInput {
                site: fx.sites[0].id,
                item_type_id: fx.item.id,
                quantity: dec!(4),
                reason: "Range day".to_string(),
                effective_at: at(2),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StockError::Contention { attempts: 2 }));
    assert!(err.is_retryable());

    holder.rollback().await.unwrap();
    assert_eq!(fx.balance(0).await, dec!(10));

    let consumptions = fx
        .ledger
        .list_movements(
            &fx.admin,
            &MovementFilter {
                kind: Some(MovementKind::Consumption),
                site_id: Some(fx.sites[0].id),
                ..MovementFilter::default()
            },
            MovementOrdering::default(),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(consumptions.meta.total, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_site_deleted_during_write_rejects_movement() {
    let Some(fx) = fixture(1).await else { return };
    let site_id = fx.sites[0].id;

    // Soft-delete the site in an open transaction so the write has to wait on it.
    let deleter = fx.db.begin().await.unwrap();
    sites::Entity::update_many()
        .col_expr(sites::Column::IsDeleted, Expr::value(true))
        .filter(sites::Column::Id.eq(site_id.into_inner()))
        .exec(&deleter)
        .await
        .unwrap();

    let ledger = fx.ledger.clone();
    let caller = fx.admin;
    let input = CreateAcquisitionInput {
        destination: site_id,
        item_type_id: fx.item.id,
        quantity: dec!(10),
        source_description: "Depot resupply".to_string(),
        effective_at: at(2),
    };
    let write = tokio::spawn(async move { ledger.create_acquisition(&caller, &input).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    deleter.commit().await.unwrap();

    let err = write.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        StockError::Validation(ValidationError::SiteDeleted(id)) if id == site_id
    ));
    assert_eq!(fx.balance(0).await, Decimal::ZERO);
}
