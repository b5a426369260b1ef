//! Ledger error types.
//!
//! `ValidationError` covers malformed requests, `TransitionError` illegal state
//! changes, and `StockError` is what every ledger operation returns.

use armory_shared::{AppError, ErrorClass};
use armory_shared::types::{DateRangeError, ItemTypeId, MovementId, SiteId};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{MovementKind, TransferStatus};

/// Malformed movement or catalog input. Detected before any write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Quantity must be strictly positive.
    #[error("Quantity must be greater than zero")]
    NonPositiveQuantity,

    /// Returned quantity cannot be negative.
    #[error("Returned quantity cannot be negative")]
    NegativeQuantity,

    /// Quantity does not fit NUMERIC(10,2).
    #[error("Quantity {0} exceeds 8 integral or 2 fractional digits")]
    QuantityPrecision(Decimal),

    /// A credit would push a balance past what NUMERIC(10,2) holds.
    #[error("Balance at site {site_id} for item {item_type_id} would reach {resulting}")]
    BalanceOverflow {
        /// Site of the balance.
        site_id: SiteId,
        /// Item type of the balance.
        item_type_id: ItemTypeId,
        /// Quantity the balance would have held.
        resulting: Decimal,
    },

    /// Transfer source and destination are the same site.
    #[error("Transfer source and destination must differ")]
    SameSiteTransfer,

    /// Referenced site does not exist.
    #[error("Unknown site: {0}")]
    UnknownSite(SiteId),

    /// Referenced site is soft-deleted.
    #[error("Site {0} is deleted")]
    SiteDeleted(SiteId),

    /// Referenced item type does not exist.
    #[error("Unknown item type: {0}")]
    UnknownItemType(ItemTypeId),

    /// Referenced item type is soft-deleted.
    #[error("Item type {0} is deleted")]
    ItemTypeDeleted(ItemTypeId),

    /// Transfers may only be created as pending or in transit.
    #[error("Transfer cannot be created with status {0}")]
    InvalidInitialStatus(TransferStatus),

    /// More returned than was issued.
    #[error("Returned quantity {returned} exceeds issued quantity {issued}")]
    ReturnExceedsIssued {
        /// Requested returned total.
        returned: Decimal,
        /// Issued quantity.
        issued: Decimal,
    },

    /// A return date needs a non-zero returned quantity.
    #[error("Return date requires a returned quantity")]
    ReturnDateWithoutReturn,

    /// Amendment names a field the movement kind does not have.
    #[error("Field '{field}' does not apply to {kind} movements")]
    FieldNotApplicable {
        /// Field name.
        field: &'static str,
        /// Kind of the amended movement.
        kind: MovementKind,
    },

    /// Required text field is empty.
    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    /// Start of a date range is after its end.
    #[error(transparent)]
    DateRange(#[from] DateRangeError),
}

/// Illegal state change on an existing movement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Transfer status change outside the forward path.
    #[error("Invalid transfer transition from {from} to {to}")]
    Transfer {
        /// Current status.
        from: TransferStatus,
        /// Requested status.
        to: TransferStatus,
    },

    /// Issuance returns only ever grow.
    #[error("Returned quantity cannot decrease from {current} to {requested}")]
    ReturnDecrease {
        /// Currently recorded returned quantity.
        current: Decimal,
        /// Requested returned quantity.
        requested: Decimal,
    },
}

/// Errors returned by ledger, balance and report operations.
#[derive(Debug, Error)]
pub enum StockError {
    // ========== Request Errors ==========
    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A debit would drive a balance negative.
    #[error(
        "Insufficient stock at site {site_id} for item {item_type_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        /// Site of the balance.
        site_id: SiteId,
        /// Item type of the balance.
        item_type_id: ItemTypeId,
        /// Quantity on hand.
        available: Decimal,
        /// Quantity the movement tried to remove.
        requested: Decimal,
    },

    /// Illegal transfer status change or return decrease.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// Amendment tried to change a field that is fixed after creation.
    #[error("Field '{field}' cannot be changed after creation")]
    ImmutableField {
        /// Field name.
        field: &'static str,
    },

    // ========== Lookup Errors ==========
    /// Movement missing or soft-deleted.
    #[error("Movement not found: {0}")]
    MovementNotFound(MovementId),

    /// Site missing or soft-deleted.
    #[error("Site not found: {0}")]
    SiteNotFound(SiteId),

    /// Item type missing or soft-deleted.
    #[error("Item type not found: {0}")]
    ItemTypeNotFound(ItemTypeId),

    /// Duplicate catalog code or name.
    #[error("Catalog conflict: {0}")]
    CatalogConflict(String),

    // ========== Scope Errors ==========
    /// Caller's visibility does not include the site.
    #[error("Site {site_id} is outside the caller's scope")]
    Forbidden {
        /// Offending site.
        site_id: SiteId,
    },

    // ========== Concurrency Errors ==========
    /// Row locks could not be acquired within the retry budget.
    #[error("Balance rows are contended, gave up after {attempts} attempts")]
    Contention {
        /// Attempts made.
        attempts: u32,
    },

    // ========== Storage Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StockError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::ImmutableField { .. } => "IMMUTABLE_FIELD",
            Self::MovementNotFound(_) => "MOVEMENT_NOT_FOUND",
            Self::SiteNotFound(_) => "SITE_NOT_FOUND",
            Self::ItemTypeNotFound(_) => "ITEM_TYPE_NOT_FOUND",
            Self::CatalogConflict(_) => "CATALOG_CONFLICT",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Contention { .. } => "CONTENTION",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Coarse class used when handing the error to outer layers.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::ImmutableField { .. } => ErrorClass::Invalid,
            Self::Forbidden { .. } => ErrorClass::Forbidden,
            Self::MovementNotFound(_) | Self::SiteNotFound(_) | Self::ItemTypeNotFound(_) => {
                ErrorClass::NotFound
            }
            Self::InvalidTransition(_) | Self::CatalogConflict(_) => ErrorClass::Conflict,
            Self::InsufficientStock { .. } => ErrorClass::Rejected,
            Self::Contention { .. } => ErrorClass::Unavailable,
            Self::Database(_) | Self::Internal(_) => ErrorClass::Failed,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        self.class().status_code()
    }

    /// Returns true if the same request may succeed when retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention { .. })
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        Self::new(err.class(), err.error_code(), err.to_string())
    }
}
