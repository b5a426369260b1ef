//! Movement construction and validation.
//!
//! The service turns a create request into a fully validated [`Movement`]
//! before anything is persisted. Storage-side concerns (locking, balance rows,
//! retries) belong to the caller.

use armory_shared::types::{ItemTypeId, MovementId, SiteId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::{StockError, ValidationError};
use super::types::{
    AcquisitionDetail, ConsumptionDetail, CreateAcquisitionInput, CreateConsumptionInput,
    CreateIssuanceInput, CreateTransferInput, IssuanceDetail, Movement, MovementDetail,
    Recipient, TransferDetail, TransferStatus,
};
use super::validation::{require_text, stored_timestamp, validate_quantity};
use crate::catalog::CatalogSnapshot;
use crate::scope::Caller;

/// Stateless service building movements from create requests.
///
/// Every constructor checks, in order:
/// 1. Field rules (quantity, required text, distinct transfer sites)
/// 2. Catalog references (exist, not soft-deleted)
/// 3. Caller visibility
pub struct MovementService;

impl MovementService {
    /// Builds an acquisition.
    ///
    /// # Errors
    ///
    /// Returns `Validation` or `Forbidden`.
    pub fn acquisition(
        input: &CreateAcquisitionInput,
        caller: &Caller,
        catalog: &CatalogSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Movement, StockError> {
        validate_quantity(input.quantity)?;
        let source_description = require_text("source_description", &input.source_description)?;
        Self::check_references(catalog, &[input.destination], input.item_type_id)?;
        caller.authorize_site(input.destination)?;

        Ok(Self::movement(
            caller,
            input.item_type_id,
            input.quantity,
            input.effective_at,
            now,
            MovementDetail::Acquisition(AcquisitionDetail {
                destination: input.destination,
                source_description,
            }),
        ))
    }

    /// Builds a transfer. The initial status defaults to `Pending`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` (including `InvalidInitialStatus` for terminal statuses)
    /// or `Forbidden`.
    pub fn transfer(
        input: &CreateTransferInput,
        caller: &Caller,
        catalog: &CatalogSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Movement, StockError> {
        validate_quantity(input.quantity)?;
        if input.source == input.destination {
            return Err(ValidationError::SameSiteTransfer.into());
        }
        let status = input.status.unwrap_or(TransferStatus::Pending);
        if !status.is_valid_initial() {
            return Err(ValidationError::InvalidInitialStatus(status).into());
        }
        let sites = [input.source, input.destination];
        Self::check_references(catalog, &sites, input.item_type_id)?;
        caller.authorize_transfer(input.source, input.destination)?;

        Ok(Self::movement(
            caller,
            input.item_type_id,
            input.quantity,
            input.effective_at,
            now,
            MovementDetail::Transfer(TransferDetail {
                source: input.source,
                destination: input.destination,
                status,
            }),
        ))
    }

    /// Builds an issuance with nothing returned yet.
    ///
    /// # Errors
    ///
    /// Returns `Validation` or `Forbidden`.
    pub fn issuance(
        input: &CreateIssuanceInput,
        caller: &Caller,
        catalog: &CatalogSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Movement, StockError> {
        validate_quantity(input.quantity)?;
        let recipient = Self::normalize_recipient(&input.recipient)?;
        Self::check_references(catalog, &[input.site], input.item_type_id)?;
        caller.authorize_site(input.site)?;

        Ok(Self::movement(
            caller,
            input.item_type_id,
            input.quantity,
            input.effective_at,
            now,
            MovementDetail::Issuance(IssuanceDetail {
                site: input.site,
                recipient,
                returned_quantity: Decimal::ZERO,
                return_date: None,
            }),
        ))
    }

    /// Builds a consumption.
    ///
    /// # Errors
    ///
    /// Returns `Validation` or `Forbidden`.
    pub fn consumption(
        input: &CreateConsumptionInput,
        caller: &Caller,
        catalog: &CatalogSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Movement, StockError> {
        validate_quantity(input.quantity)?;
        let reason = require_text("reason", &input.reason)?;
        Self::check_references(catalog, &[input.site], input.item_type_id)?;
        caller.authorize_site(input.site)?;

        Ok(Self::movement(
            caller,
            input.item_type_id,
            input.quantity,
            input.effective_at,
            now,
            MovementDetail::Consumption(ConsumptionDetail {
                site: input.site,
                reason,
            }),
        ))
    }

    fn check_references(
        catalog: &CatalogSnapshot,
        sites: &[SiteId],
        item_type_id: ItemTypeId,
    ) -> Result<(), ValidationError> {
        for site in sites {
            catalog.require_site(*site)?;
        }
        catalog.require_item_type(item_type_id)?;
        Ok(())
    }

    fn normalize_recipient(recipient: &Recipient) -> Result<Recipient, ValidationError> {
        Ok(Recipient {
            name: require_text("recipient.name", &recipient.name)?,
            personnel_id: recipient
                .personnel_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        })
    }

    fn movement(
        caller: &Caller,
        item_type_id: ItemTypeId,
        quantity: Decimal,
        effective_at: DateTime<Utc>,
        now: DateTime<Utc>,
        detail: MovementDetail,
    ) -> Movement {
        Movement {
            id: MovementId::new(),
            item_type_id,
            quantity,
            effective_at: stored_timestamp(effective_at),
            created_by: caller.user_id,
            created_at: stored_timestamp(now),
            is_deleted: false,
            detail,
        }
    }
}
