//! Balance reconciliation.
//!
//! The reconciler turns ledger events into signed per-(site, item type) deltas and
//! checks them against current balances. It never reads or writes storage itself;
//! the caller supplies current quantities (read under row locks) and persists the
//! returned [`BalanceChange`]s in the same transaction as the ledger write.

use std::collections::BTreeMap;

use armory_shared::types::{ItemTypeId, SiteId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::{StockError, ValidationError};
use super::types::{Movement, MovementDetail};
use super::validation::QUANTITY_LIMIT;

/// Identifies one balance row.
///
/// Ordering is by site then item type, which is also the row lock order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BalanceKey {
    /// Site holding the stock.
    pub site_id: SiteId,
    /// Item type held.
    pub item_type_id: ItemTypeId,
}

impl BalanceKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(site_id: SiteId, item_type_id: ItemTypeId) -> Self {
        Self {
            site_id,
            item_type_id,
        }
    }
}

/// A signed change to one balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
    /// Balance affected.
    pub key: BalanceKey,
    /// Amount added (positive) or removed (negative).
    pub delta: Decimal,
}

/// A checked balance update ready to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    /// Balance affected.
    pub key: BalanceKey,
    /// Quantity before the update.
    pub previous: Decimal,
    /// Quantity after the update; never negative.
    pub current: Decimal,
}

/// Stateless reconciler.
pub struct Reconciler;

impl Reconciler {
    /// Deltas applied when a movement is first recorded.
    ///
    /// Transfers have no effect until they complete.
    #[must_use]
    pub fn on_create(movement: &Movement) -> Vec<BalanceDelta> {
        let item = movement.item_type_id;
        match &movement.detail {
            MovementDetail::Acquisition(a) => vec![BalanceDelta {
                key: BalanceKey::new(a.destination, item),
                delta: movement.quantity,
            }],
            MovementDetail::Transfer(_) => Vec::new(),
            MovementDetail::Issuance(i) => vec![BalanceDelta {
                key: BalanceKey::new(i.site, item),
                delta: -movement.quantity,
            }],
            MovementDetail::Consumption(c) => vec![BalanceDelta {
                key: BalanceKey::new(c.site, item),
                delta: -movement.quantity,
            }],
        }
    }

    /// Deltas applied when a transfer moves into `Completed`.
    #[must_use]
    pub fn on_transfer_completed(movement: &Movement) -> Vec<BalanceDelta> {
        let MovementDetail::Transfer(t) = &movement.detail else {
            return Vec::new();
        };
        vec![
            BalanceDelta {
                key: BalanceKey::new(t.source, movement.item_type_id),
                delta: -movement.quantity,
            },
            BalanceDelta {
                key: BalanceKey::new(t.destination, movement.item_type_id),
                delta: movement.quantity,
            },
        ]
    }

    /// Deltas applied when an issuance's returned quantity grows.
    #[must_use]
    pub fn on_return(
        movement: &Movement,
        previous: Decimal,
        returned: Decimal,
    ) -> Vec<BalanceDelta> {
        let MovementDetail::Issuance(i) = &movement.detail else {
            return Vec::new();
        };
        let delta = returned - previous;
        if delta.is_zero() {
            return Vec::new();
        }
        vec![BalanceDelta {
            key: BalanceKey::new(i.site, movement.item_type_id),
            delta,
        }]
    }

    /// Sums deltas per balance, dropping balances whose net change is zero.
    ///
    /// The map iterates in lock order.
    #[must_use]
    pub fn net(deltas: &[BalanceDelta]) -> BTreeMap<BalanceKey, Decimal> {
        let mut net: BTreeMap<BalanceKey, Decimal> = BTreeMap::new();
        for d in deltas {
            *net.entry(d.key).or_insert(Decimal::ZERO) += d.delta;
        }
        net.retain(|_, delta| !delta.is_zero());
        net
    }

    /// Checks deltas against current balances.
    ///
    /// # Arguments
    /// * `deltas` - Changes to apply, in any order
    /// * `current` - Current quantity of a balance; zero for rows not yet created
    ///
    /// # Errors
    ///
    /// Returns `StockError::InsufficientStock` for the first balance that would go
    /// negative and `ValidationError::BalanceOverflow` for one that would no longer
    /// fit its column. Nothing should be persisted in either case.
    pub fn apply<F>(deltas: &[BalanceDelta], current: F) -> Result<Vec<BalanceChange>, StockError>
    where
        F: Fn(&BalanceKey) -> Decimal,
    {
        Self::net(deltas)
            .into_iter()
            .map(|(key, delta)| {
                let previous = current(&key);
                let updated = previous + delta;
                if updated < Decimal::ZERO {
                    return Err(StockError::InsufficientStock {
                        site_id: key.site_id,
                        item_type_id: key.item_type_id,
                        available: previous,
                        requested: -delta,
                    });
                }
                if updated >= QUANTITY_LIMIT {
                    return Err(ValidationError::BalanceOverflow {
                        site_id: key.site_id,
                        item_type_id: key.item_type_id,
                        resulting: updated,
                    }
                    .into());
                }
                Ok(BalanceChange {
                    key,
                    previous,
                    current: updated,
                })
            })
            .collect()
    }
}
