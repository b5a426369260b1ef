//! Amendment rules for recorded movements.
//!
//! Only three fields change after creation: a transfer's status, and an
//! issuance's returned quantity and return date. Restating any other field with
//! its current value is accepted; changing it is an `ImmutableField` error.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::error::{StockError, TransitionError, ValidationError};
use super::reconciler::{BalanceDelta, Reconciler};
use super::transfer::TransferTransition;
use super::types::{Movement, MovementAmendment, MovementDetail, MovementKind, TransferStatus};
use super::validation::{stored_timestamp, validate_returned_quantity};

/// Result of planning an amendment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmendmentOutcome {
    /// The movement with the amendment applied.
    pub updated: Movement,
    /// Balance deltas the amendment causes.
    pub deltas: Vec<BalanceDelta>,
    /// Accepted transfer status change, if any.
    pub transition: Option<TransferTransition>,
    /// False when the amendment only restated current values.
    pub changed: bool,
}

impl MovementAmendment {
    /// Amendment that only moves a transfer to `status`.
    #[must_use]
    pub fn status(status: TransferStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Amendment that records a new returned total on an issuance.
    #[must_use]
    pub fn returned(quantity: Decimal, return_date: Option<DateTime<Utc>>) -> Self {
        Self {
            returned_quantity: Some(quantity),
            return_date,
            ..Self::default()
        }
    }
}

/// Validates an amendment against a movement and computes its effects.
///
/// # Errors
///
/// - `MovementNotFound` if the movement is soft-deleted
/// - `ImmutableField` if a fixed field is given a different value
/// - `Validation` for fields the kind lacks, bad returned quantities, or a
///   return date without a return
/// - `InvalidTransition` for illegal status changes (including restating the
///   current status) and returned quantity decreases
pub fn plan_amendment(
    movement: &Movement,
    amendment: &MovementAmendment,
    now: DateTime<Utc>,
) -> Result<AmendmentOutcome, StockError> {
    if movement.is_deleted {
        return Err(StockError::MovementNotFound(movement.id));
    }
    check_header(movement, amendment)?;

    let now = stored_timestamp(now);
    let kind = movement.kind();
    let mut updated = movement.clone();
    let mut deltas = Vec::new();
    let mut transition = None;
    let mut changed = false;

    match &mut updated.detail {
        MovementDetail::Acquisition(a) => {
            reject_transfer_fields(amendment, kind)?;
            reject_issuance_fields(amendment, kind)?;
            immutable("site_id", amendment.site_id.as_ref(), &a.destination)?;
            immutable(
                "source_description",
                amendment.source_description.as_ref(),
                &a.source_description,
            )?;
            not_applicable("recipient", amendment.recipient.is_some(), kind)?;
            not_applicable("reason", amendment.reason.is_some(), kind)?;
        }
        MovementDetail::Transfer(t) => {
            reject_issuance_fields(amendment, kind)?;
            not_applicable("site_id", amendment.site_id.is_some(), kind)?;
            not_applicable(
                "source_description",
                amendment.source_description.is_some(),
                kind,
            )?;
            not_applicable("recipient", amendment.recipient.is_some(), kind)?;
            not_applicable("reason", amendment.reason.is_some(), kind)?;
            immutable(
                "source_site_id",
                amendment.source_site_id.as_ref(),
                &t.source,
            )?;
            immutable(
                "destination_site_id",
                amendment.destination_site_id.as_ref(),
                &t.destination,
            )?;

            if let Some(next) = amendment.status {
                let accepted = t.status.transition_to(next)?;
                t.status = next;
                changed = true;
                transition = Some(accepted);
                if accepted.applies_balance {
                    deltas = Reconciler::on_transfer_completed(movement);
                }
            }
        }
        MovementDetail::Issuance(i) => {
            reject_transfer_fields(amendment, kind)?;
            not_applicable(
                "source_description",
                amendment.source_description.is_some(),
                kind,
            )?;
            not_applicable("reason", amendment.reason.is_some(), kind)?;
            immutable("site_id", amendment.site_id.as_ref(), &i.site)?;
            immutable("recipient", amendment.recipient.as_ref(), &i.recipient)?;

            let current = i.returned_quantity;
            let requested = amendment.returned_quantity.unwrap_or(current);
            validate_returned_quantity(requested)?;
            if requested < current {
                return Err(TransitionError::ReturnDecrease { current, requested }.into());
            }
            if requested > movement.quantity {
                return Err(ValidationError::ReturnExceedsIssued {
                    returned: requested,
                    issued: movement.quantity,
                }
                .into());
            }

            if let Some(date) = amendment.return_date.map(stored_timestamp) {
                if requested.is_zero() {
                    return Err(ValidationError::ReturnDateWithoutReturn.into());
                }
                if i.return_date != Some(date) {
                    i.return_date = Some(date);
                    changed = true;
                }
            } else if requested > current {
                i.return_date = Some(now);
            }

            if requested > current {
                i.returned_quantity = requested;
                changed = true;
                deltas = Reconciler::on_return(movement, current, requested);
            }
        }
        MovementDetail::Consumption(c) => {
            reject_transfer_fields(amendment, kind)?;
            reject_issuance_fields(amendment, kind)?;
            not_applicable(
                "source_description",
                amendment.source_description.is_some(),
                kind,
            )?;
            not_applicable("recipient", amendment.recipient.is_some(), kind)?;
            immutable("site_id", amendment.site_id.as_ref(), &c.site)?;
            immutable("reason", amendment.reason.as_ref(), &c.reason)?;
        }
    }

    Ok(AmendmentOutcome {
        updated,
        deltas,
        transition,
        changed,
    })
}

fn check_header(movement: &Movement, amendment: &MovementAmendment) -> Result<(), StockError> {
    immutable(
        "item_type_id",
        amendment.item_type_id.as_ref(),
        &movement.item_type_id,
    )?;
    immutable("quantity", amendment.quantity.as_ref(), &movement.quantity)?;
    immutable(
        "effective_at",
        amendment.effective_at.map(stored_timestamp).as_ref(),
        &movement.effective_at,
    )
}

fn immutable<T: PartialEq>(
    field: &'static str,
    requested: Option<&T>,
    current: &T,
) -> Result<(), StockError> {
    match requested {
        Some(value) if value != current => Err(StockError::ImmutableField { field }),
        _ => Ok(()),
    }
}

fn not_applicable(
    field: &'static str,
    present: bool,
    kind: MovementKind,
) -> Result<(), StockError> {
    if present {
        return Err(ValidationError::FieldNotApplicable { field, kind }.into());
    }
    Ok(())
}

fn reject_transfer_fields(
    amendment: &MovementAmendment,
    kind: MovementKind,
) -> Result<(), StockError> {
    not_applicable("source_site_id", amendment.source_site_id.is_some(), kind)?;
    not_applicable(
        "destination_site_id",
        amendment.destination_site_id.is_some(),
        kind,
    )?;
    not_applicable("status", amendment.status.is_some(), kind)
}

fn reject_issuance_fields(
    amendment: &MovementAmendment,
    kind: MovementKind,
) -> Result<(), StockError> {
    not_applicable(
        "returned_quantity",
        amendment.returned_quantity.is_some(),
        kind,
    )?;
    not_applicable("return_date", amendment.return_date.is_some(), kind)
}
