//! Ledger domain types for movement creation, amendment and listing.
//!
//! A [`Movement`] is a shared header (item type, quantity, dates, actor) plus a
//! kind-specific [`MovementDetail`].

use std::fmt;

use armory_shared::types::{DateRange, ItemTypeId, MovementId, SiteId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Discriminator for the four movement kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Stock received at a site from outside the system.
    Acquisition,
    /// Stock moved between two sites.
    Transfer,
    /// Stock handed to a person, returnable.
    Issuance,
    /// Stock used up, irrevocably.
    Consumption,
}

impl MovementKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquisition => "acquisition",
            Self::Transfer => "transfer",
            Self::Issuance => "issuance",
            Self::Consumption => "consumption",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "acquisition" => Some(Self::Acquisition),
            "transfer" => Some(Self::Transfer),
            "issuance" => Some(Self::Issuance),
            "consumption" => Some(Self::Consumption),
            _ => None,
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transfer status.
///
/// The valid transitions are:
/// - Pending → InTransit
/// - Pending → Completed
/// - InTransit → Completed
/// - Pending | InTransit → Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Transfer has been requested.
    Pending,
    /// Stock has left the source site.
    InTransit,
    /// Stock has arrived; balances were moved (terminal).
    Completed,
    /// Transfer was abandoned without any balance effect (terminal).
    Cancelled,
}

impl TransferStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InTransit => "in_transit",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_transit" => Some(Self::InTransit),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The person stock was issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Display name of the recipient.
    pub name: String,
    /// Optional service or personnel number.
    pub personnel_id: Option<String>,
}

/// Acquisition payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionDetail {
    /// Site receiving the stock.
    pub destination: SiteId,
    /// Supplier or other free-text origin.
    pub source_description: String,
}

/// Transfer payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDetail {
    /// Site giving up the stock.
    pub source: SiteId,
    /// Site receiving the stock.
    pub destination: SiteId,
    /// Current lifecycle status.
    pub status: TransferStatus,
}

/// Issuance payload. The issued amount is the movement header quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceDetail {
    /// Site the stock was issued from.
    pub site: SiteId,
    /// Who received it.
    pub recipient: Recipient,
    /// Amount returned so far; never decreases.
    pub returned_quantity: Decimal,
    /// When the latest return was recorded.
    pub return_date: Option<DateTime<Utc>>,
}

/// Consumption payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionDetail {
    /// Site the stock was consumed at.
    pub site: SiteId,
    /// Why it was consumed.
    pub reason: String,
}

/// Kind-specific movement payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementDetail {
    /// See [`AcquisitionDetail`].
    Acquisition(AcquisitionDetail),
    /// See [`TransferDetail`].
    Transfer(TransferDetail),
    /// See [`IssuanceDetail`].
    Issuance(IssuanceDetail),
    /// See [`ConsumptionDetail`].
    Consumption(ConsumptionDetail),
}

/// A ledger movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Movement ID.
    pub id: MovementId,
    /// Item type moved.
    pub item_type_id: ItemTypeId,
    /// Quantity moved (issued quantity for issuances); always positive.
    pub quantity: Decimal,
    /// When the movement took effect.
    pub effective_at: DateTime<Utc>,
    /// Actor who recorded it.
    pub created_by: UserId,
    /// When it was recorded.
    pub created_at: DateTime<Utc>,
    /// Soft-delete flag.
    pub is_deleted: bool,
    /// Kind-specific payload.
    pub detail: MovementDetail,
}

impl Movement {
    /// Returns the movement kind.
    #[must_use]
    pub fn kind(&self) -> MovementKind {
        match self.detail {
            MovementDetail::Acquisition(_) => MovementKind::Acquisition,
            MovementDetail::Transfer(_) => MovementKind::Transfer,
            MovementDetail::Issuance(_) => MovementKind::Issuance,
            MovementDetail::Consumption(_) => MovementKind::Consumption,
        }
    }

    /// Returns every site the movement references.
    #[must_use]
    pub fn sites(&self) -> Vec<SiteId> {
        match &self.detail {
            MovementDetail::Acquisition(a) => vec![a.destination],
            MovementDetail::Transfer(t) => vec![t.source, t.destination],
            MovementDetail::Issuance(i) => vec![i.site],
            MovementDetail::Consumption(c) => vec![c.site],
        }
    }

    /// Issued minus returned, for issuances only.
    #[must_use]
    pub fn outstanding(&self) -> Option<Decimal> {
        match &self.detail {
            MovementDetail::Issuance(i) => Some(self.quantity - i.returned_quantity),
            _ => None,
        }
    }

    /// Returns the transfer status, for transfers only.
    #[must_use]
    pub fn transfer_status(&self) -> Option<TransferStatus> {
        match &self.detail {
            MovementDetail::Transfer(t) => Some(t.status),
            _ => None,
        }
    }
}

/// Input for recording an acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAcquisitionInput {
    /// Receiving site.
    pub destination: SiteId,
    /// Item type acquired.
    pub item_type_id: ItemTypeId,
    /// Quantity acquired.
    pub quantity: Decimal,
    /// Supplier or other origin.
    pub source_description: String,
    /// Effective date.
    pub effective_at: DateTime<Utc>,
}

/// Input for requesting a transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransferInput {
    /// Site giving up stock.
    pub source: SiteId,
    /// Site receiving stock.
    pub destination: SiteId,
    /// Item type moved.
    pub item_type_id: ItemTypeId,
    /// Quantity moved.
    pub quantity: Decimal,
    /// Initial status; defaults to pending.
    #[serde(default)]
    pub status: Option<TransferStatus>,
    /// Effective date.
    pub effective_at: DateTime<Utc>,
}

/// Input for issuing stock to a person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIssuanceInput {
    /// Site issuing stock.
    pub site: SiteId,
    /// Item type issued.
    pub item_type_id: ItemTypeId,
    /// Quantity issued.
    pub quantity: Decimal,
    /// Recipient.
    pub recipient: Recipient,
    /// Effective date.
    pub effective_at: DateTime<Utc>,
}

/// Input for recording consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConsumptionInput {
    /// Site consuming stock.
    pub site: SiteId,
    /// Item type consumed.
    pub item_type_id: ItemTypeId,
    /// Quantity consumed.
    pub quantity: Decimal,
    /// Reason for consumption.
    pub reason: String,
    /// Effective date.
    pub effective_at: DateTime<Utc>,
}

/// Partial update of a movement.
///
/// Only `status` (transfers), `returned_quantity` and `return_date` (issuances) may
/// change. Any other field is accepted only when it restates the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementAmendment {
    /// Item type.
    pub item_type_id: Option<ItemTypeId>,
    /// Header quantity.
    pub quantity: Option<Decimal>,
    /// Effective date.
    pub effective_at: Option<DateTime<Utc>>,
    /// Primary site of acquisitions, issuances and consumptions.
    pub site_id: Option<SiteId>,
    /// Transfer source.
    pub source_site_id: Option<SiteId>,
    /// Transfer destination.
    pub destination_site_id: Option<SiteId>,
    /// Acquisition origin.
    pub source_description: Option<String>,
    /// Issuance recipient.
    pub recipient: Option<Recipient>,
    /// Consumption reason.
    pub reason: Option<String>,
    /// Transfer status.
    pub status: Option<TransferStatus>,
    /// Issuance returned quantity.
    pub returned_quantity: Option<Decimal>,
    /// Issuance return date.
    pub return_date: Option<DateTime<Utc>>,
}

/// Sort order for movement listings. Ties always fall back to creation order, then id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementOrdering {
    /// Most recent effective date first.
    #[default]
    EffectiveDesc,
    /// Oldest effective date first.
    EffectiveAsc,
    /// Most recently recorded first.
    CreatedDesc,
    /// Oldest recorded first.
    CreatedAsc,
}

/// Filter options for listing movements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementFilter {
    /// Restrict to one movement kind.
    pub kind: Option<MovementKind>,
    /// Site as destination, source, or site depending on kind.
    pub site_id: Option<SiteId>,
    /// Item type.
    pub item_type_id: Option<ItemTypeId>,
    /// Inclusive effective-date range.
    #[serde(default)]
    pub date_range: DateRange,
    /// Transfer status; only transfers match when set.
    pub status: Option<TransferStatus>,
}

impl MovementFilter {
    /// Returns true if the movement satisfies every set criterion.
    ///
    /// Soft-deleted movements never match.
    #[must_use]
    pub fn matches(&self, movement: &Movement) -> bool {
        if movement.is_deleted {
            return false;
        }
        if self.kind.is_some_and(|kind| kind != movement.kind()) {
            return false;
        }
        if self.site_id.is_some_and(|site| !movement.sites().contains(&site)) {
            return false;
        }
        if self
            .item_type_id
            .is_some_and(|item| item != movement.item_type_id)
        {
            return false;
        }
        if !self.date_range.contains(movement.effective_at) {
            return false;
        }
        match self.status {
            Some(status) => movement.transfer_status() == Some(status),
            None => true,
        }
    }
}
