//! Property-based tests for the reconciler and amendment rules.
//!
//! - Balances never go negative under any sequence of movements
//! - Completing a transfer conserves total stock and applies once
//! - Issuance returns are monotonic and outstanding stays non-negative

use std::collections::HashMap;

use armory_shared::types::{ItemTypeId, MovementId, SiteId, UserId};
use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::amendment::{AmendmentOutcome, plan_amendment};
use super::error::StockError;
use super::reconciler::{BalanceKey, Reconciler};
use super::types::{
    AcquisitionDetail, ConsumptionDetail, IssuanceDetail, Movement, MovementAmendment,
    MovementDetail, Recipient, TransferDetail, TransferStatus,
};

/// Strategy to generate quantities (0.01 to 500.00).
fn quantity() -> impl Strategy<Value = Decimal> {
    (1i64..50_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

#[derive(Debug, Clone)]
enum Op {
    Acquire(usize, Decimal),
    Issue(usize, Decimal),
    Consume(usize, Decimal),
    CompleteTransfer(usize, Decimal),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3, quantity()).prop_map(|(s, q)| Op::Acquire(s, q)),
        (0usize..3, quantity()).prop_map(|(s, q)| Op::Issue(s, q)),
        (0usize..3, quantity()).prop_map(|(s, q)| Op::Consume(s, q)),
        (0usize..3, quantity()).prop_map(|(s, q)| Op::CompleteTransfer(s, q)),
    ]
}

fn movement(item: ItemTypeId, quantity: Decimal, detail: MovementDetail) -> Movement {
    Movement {
        id: MovementId::new(),
        item_type_id: item,
        quantity,
        effective_at: Utc::now(),
        created_by: UserId::new(),
        created_at: Utc::now(),
        is_deleted: false,
        detail,
    }
}

fn complete(transfer: &Movement) -> Result<AmendmentOutcome, StockError> {
    let amendment = MovementAmendment::status(TransferStatus::Completed);
    plan_amendment(transfer, &amendment, Utc::now())
}

fn recipient() -> Recipient {
    Recipient {
        name: "Test".to_string(),
        personnel_id: None,
    }
}

type Balances = HashMap<BalanceKey, Decimal>;

fn get(balances: &Balances, key: &BalanceKey) -> Decimal {
    balances.get(key).copied().unwrap_or(Decimal::ZERO)
}

/// Applies a movement's creation deltas; returns false if rejected.
fn apply_create(balances: &mut Balances, movement: &Movement) -> bool {
    let deltas = Reconciler::on_create(movement);
    apply_deltas(balances, &deltas)
}

fn apply_deltas(balances: &mut Balances, deltas: &[super::reconciler::BalanceDelta]) -> bool {
    match Reconciler::apply(deltas, |key| get(balances, key)) {
        Ok(changes) => {
            for change in changes {
                balances.insert(change.key, change.current);
            }
            true
        }
        Err(StockError::InsufficientStock { .. }) => false,
        Err(other) => panic!("unexpected error: {other}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_balances_never_negative(ops in prop::collection::vec(op(), 1..40)) {
        let sites = [SiteId::new(), SiteId::new(), SiteId::new()];
        let item = ItemTypeId::new();
        let mut balances = Balances::new();

        for op in ops {
            let before = balances.clone();
            let accepted = match op {
                Op::Acquire(s, q) => {
                    let detail = MovementDetail::Acquisition(AcquisitionDetail {
                        destination: sites[s],
                        source_description: "Supplier".to_string(),
                    });
                    apply_create(&mut balances, &movement(item, q, detail))
                }
                Op::Issue(s, q) => {
                    let detail = MovementDetail::Issuance(IssuanceDetail {
                        site: sites[s],
                        recipient: recipient(),
                        returned_quantity: Decimal::ZERO,
                        return_date: None,
                    });
                    apply_create(&mut balances, &movement(item, q, detail))
                }
                Op::Consume(s, q) => {
                    let detail = MovementDetail::Consumption(ConsumptionDetail {
                        site: sites[s],
                        reason: "Use".to_string(),
                    });
                    apply_create(&mut balances, &movement(item, q, detail))
                }
                Op::CompleteTransfer(s, q) => {
                    let transfer = movement(item, q, MovementDetail::Transfer(TransferDetail {
                        source: sites[s],
                        destination: sites[(s + 1) % 3],
                        status: TransferStatus::InTransit,
                    }));
                    let outcome = complete(&transfer).unwrap();
                    apply_deltas(&mut balances, &outcome.deltas)
                }
            };

            if !accepted {
                prop_assert_eq!(&balances, &before);
            }
            for quantity in balances.values() {
                prop_assert!(*quantity >= Decimal::ZERO);
            }
        }
    }

    #[test]
    fn prop_completed_transfer_conserves_stock(stock in quantity(), moved in quantity()) {
        let source = SiteId::new();
        let destination = SiteId::new();
        let item = ItemTypeId::new();
        let src = BalanceKey::new(source, item);
        let dst = BalanceKey::new(destination, item);
        let mut balances = Balances::from([(src, stock)]);

        let transfer = movement(item, moved, MovementDetail::Transfer(TransferDetail {
            source,
            destination,
            status: TransferStatus::Pending,
        }));
        let outcome = complete(&transfer).unwrap();
        let accepted = apply_deltas(&mut balances, &outcome.deltas);

        prop_assert_eq!(accepted, moved <= stock);
        prop_assert_eq!(get(&balances, &src) + get(&balances, &dst), stock);
        if accepted {
            prop_assert_eq!(get(&balances, &src), stock - moved);
            prop_assert_eq!(get(&balances, &dst), moved);

            // A completed transfer rejects every further transition.
            let again = complete(&outcome.updated);
            prop_assert!(matches!(again, Err(StockError::InvalidTransition(_))));
        }
    }

    #[test]
    fn prop_returns_are_monotonic(
        issued_cents in 1i64..10_000i64,
        requests in prop::collection::vec(0i64..10_000i64, 1..20),
    ) {
        let issued = Decimal::new(issued_cents, 2);
        let site = SiteId::new();
        let item = ItemTypeId::new();
        let key = BalanceKey::new(site, item);
        let mut issuance = movement(item, issued, MovementDetail::Issuance(IssuanceDetail {
            site,
            recipient: recipient(),
            returned_quantity: Decimal::ZERO,
            return_date: None,
        }));
        let mut balances = Balances::from([(key, issued)]);
        prop_assert!(apply_create(&mut balances, &issuance));

        let mut returned = Decimal::ZERO;
        for cents in requests {
            let requested = Decimal::new(cents, 2);
            let amendment = MovementAmendment::returned(requested, None);
            match plan_amendment(&issuance, &amendment, Utc::now()) {
                Ok(outcome) => {
                    prop_assert!(requested >= returned);
                    prop_assert!(apply_deltas(&mut balances, &outcome.deltas));
                    issuance = outcome.updated;
                    returned = requested;
                }
                Err(_) => prop_assert!(requested < returned || requested > issued),
            }
            let outstanding = issuance.outstanding().unwrap_or_default();
            prop_assert!(outstanding >= Decimal::ZERO);
            prop_assert_eq!(get(&balances, &key), returned);
        }
    }
}
