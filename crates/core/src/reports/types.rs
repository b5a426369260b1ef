//! Report data types.

use armory_shared::types::{DateRange, ItemTypeId, SiteId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Explicit report filters, before caller visibility is applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportScope {
    /// Sites to include; all visible sites when absent.
    #[serde(default)]
    pub site_ids: Option<Vec<SiteId>>,
    /// Item type to include; all when absent.
    #[serde(default)]
    pub item_type_id: Option<ItemTypeId>,
}

/// Per-item-type subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSubtotal {
    /// Item type ID.
    pub item_type_id: ItemTypeId,
    /// Item type name at report time.
    pub item_type_name: String,
    /// Summed quantity.
    pub total: Decimal,
}

/// Breakdown of the net movement by item type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportBreakdown {
    /// Acquisitions into scope sites.
    pub acquisitions: Vec<ItemSubtotal>,
    /// Completed transfers into scope sites.
    pub transfers_in: Vec<ItemSubtotal>,
    /// Completed transfers out of scope sites.
    pub transfers_out: Vec<ItemSubtotal>,
}

/// Stock report for a scope and date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReport {
    /// Sites the report covers after visibility narrowing.
    pub site_ids: Vec<SiteId>,
    /// Item type filter.
    pub item_type_id: Option<ItemTypeId>,
    /// Effective-date range of the movement figures.
    pub date_range: DateRange,
    /// `closing_balance - net_movement`.
    pub opening_balance: Decimal,
    /// Current quantity on hand across the scope.
    pub closing_balance: Decimal,
    /// Acquired plus transferred in minus transferred out.
    pub net_movement: Decimal,
    /// Acquisitions in range.
    pub acquired_total: Decimal,
    /// Completed transfers into the scope in range.
    pub transferred_in_total: Decimal,
    /// Completed transfers out of the scope in range.
    pub transferred_out_total: Decimal,
    /// Outstanding (issued minus returned) over issuances in range.
    pub assigned_total: Decimal,
    /// Consumption in range.
    pub expended_total: Decimal,
    /// Per-item-type subtotals.
    pub breakdown: ReportBreakdown,
}
