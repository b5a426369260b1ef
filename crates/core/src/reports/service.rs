//! Report generation service.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use armory_shared::types::{DateRange, ItemTypeId, SiteId};
use rust_decimal::Decimal;

use super::types::{ItemSubtotal, ReportBreakdown, ReportScope, StockReport};
use crate::balance::Balance;
use crate::ledger::types::{Movement, MovementDetail, TransferStatus};
use crate::scope::SiteVisibility;

/// Service for computing stock reports.
pub struct ReportService;

#[derive(Default)]
struct Subtotals(BTreeMap<ItemTypeId, Decimal>);

impl Subtotals {
    fn add(&mut self, item: ItemTypeId, quantity: Decimal) {
        *self.0.entry(item).or_insert(Decimal::ZERO) += quantity;
    }

    fn total(&self) -> Decimal {
        self.0.values().copied().sum()
    }

    fn into_rows(self, names: &HashMap<ItemTypeId, String>) -> Vec<ItemSubtotal> {
        let mut rows: Vec<ItemSubtotal> = self
            .0
            .into_iter()
            .map(|(item_type_id, total)| ItemSubtotal {
                item_type_id,
                item_type_name: names
                    .get(&item_type_id)
                    .cloned()
                    .unwrap_or_else(|| item_type_id.to_string()),
                total,
            })
            .collect();
        rows.sort_by(|a, b| {
            a.item_type_name
                .cmp(&b.item_type_name)
                .then(a.item_type_id.cmp(&b.item_type_id))
        });
        rows
    }
}

impl ReportService {
    /// Resolves the sites a report covers: active, visible and explicitly requested.
    #[must_use]
    pub fn resolve_sites(
        visibility: &SiteVisibility,
        scope: &ReportScope,
        active_sites: impl IntoIterator<Item = SiteId>,
    ) -> BTreeSet<SiteId> {
        visibility
            .narrow(scope.site_ids.as_deref())
            .resolve(active_sites)
    }

    /// Computes a report.
    ///
    /// The closing balance is the current quantity on hand and ignores the date
    /// range. Movement figures count only non-deleted movements whose effective
    /// date falls inside the range; transfers count only once completed.
    ///
    /// # Arguments
    /// * `sites` - Resolved site set (see [`Self::resolve_sites`])
    /// * `item_type_id` - Optional item type filter
    /// * `date_range` - Inclusive effective-date range
    /// * `balances` - Current balances; rows outside the scope are ignored
    /// * `movements` - Candidate movements; rows outside the scope are ignored
    /// * `item_names` - Display names for the breakdown
    #[must_use]
    pub fn compute(
        sites: &BTreeSet<SiteId>,
        item_type_id: Option<ItemTypeId>,
        date_range: DateRange,
        balances: &[Balance],
        movements: &[Movement],
        item_names: &HashMap<ItemTypeId, String>,
    ) -> StockReport {
        let item_matches = |item: ItemTypeId| item_type_id.is_none_or(|wanted| wanted == item);

        let closing_balance: Decimal = balances
            .iter()
            .filter(|b| sites.contains(&b.site_id) && item_matches(b.item_type_id))
            .map(|b| b.quantity)
            .sum();

        let mut acquisitions = Subtotals::default();
        let mut transfers_in = Subtotals::default();
        let mut transfers_out = Subtotals::default();
        let mut assigned_total = Decimal::ZERO;
        let mut expended_total = Decimal::ZERO;

        let in_scope = movements.iter().filter(|m| {
            !m.is_deleted && item_matches(m.item_type_id) && date_range.contains(m.effective_at)
        });
        for movement in in_scope {
            let item = movement.item_type_id;
            match &movement.detail {
                MovementDetail::Acquisition(a) if sites.contains(&a.destination) => {
                    acquisitions.add(item, movement.quantity);
                }
                MovementDetail::Transfer(t) if t.status == TransferStatus::Completed => {
                    if sites.contains(&t.destination) {
                        transfers_in.add(item, movement.quantity);
                    }
                    if sites.contains(&t.source) {
                        transfers_out.add(item, movement.quantity);
                    }
                }
                MovementDetail::Issuance(i) if sites.contains(&i.site) => {
                    assigned_total += movement.quantity - i.returned_quantity;
                }
                MovementDetail::Consumption(c) if sites.contains(&c.site) => {
                    expended_total += movement.quantity;
                }
                _ => {}
            }
        }

        let acquired_total = acquisitions.total();
        let transferred_in_total = transfers_in.total();
        let transferred_out_total = transfers_out.total();
        let net_movement = acquired_total + transferred_in_total - transferred_out_total;

        StockReport {
            site_ids: sites.iter().copied().collect(),
            item_type_id,
            date_range,
            opening_balance: closing_balance - net_movement,
            closing_balance,
            net_movement,
            acquired_total,
            transferred_in_total,
            transferred_out_total,
            assigned_total,
            expended_total,
            breakdown: ReportBreakdown {
                acquisitions: acquisitions.into_rows(item_names),
                transfers_in: transfers_in.into_rows(item_names),
                transfers_out: transfers_out.into_rows(item_names),
            },
        }
    }
}
