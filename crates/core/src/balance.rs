//! Balance store records.

use armory_shared::types::{BalanceId, ItemTypeId, SiteId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::reconciler::BalanceKey;

/// Quantity on hand for one (site, item type) pair.
///
/// Rows are created on the first movement touching the pair and are only ever
/// written by the reconciler's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Balance ID.
    pub id: BalanceId,
    /// Site holding the stock.
    pub site_id: SiteId,
    /// Item type held.
    pub item_type_id: ItemTypeId,
    /// Quantity on hand; never negative.
    pub quantity: Decimal,
    /// Last time the quantity changed.
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Returns the row's key.
    #[must_use]
    pub const fn key(&self) -> BalanceKey {
        BalanceKey::new(self.site_id, self.item_type_id)
    }
}

/// Filter for listing balances.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BalanceFilter {
    /// Restrict to one site.
    pub site_id: Option<SiteId>,
    /// Restrict to one item type.
    pub item_type_id: Option<ItemTypeId>,
}

impl BalanceFilter {
    /// Returns true if the balance satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, balance: &Balance) -> bool {
        self.site_id.is_none_or(|site| site == balance.site_id)
            && self
                .item_type_id
                .is_none_or(|item| item == balance.item_type_id)
    }
}
