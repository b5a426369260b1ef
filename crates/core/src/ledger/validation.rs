//! Field-level validation for movement quantities and text.

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;

use super::error::ValidationError;

/// Largest number of fractional digits a stored quantity carries.
pub const QUANTITY_SCALE: u32 = 2;

/// Fractional-second digits a stored timestamp keeps (`TIMESTAMPTZ` is microsecond).
const TIMESTAMP_DIGITS: u16 = 6;

/// Exclusive upper bound of a stored quantity (8 integral digits).
pub const QUANTITY_LIMIT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// Validates a movement quantity: strictly positive and representable.
///
/// # Errors
///
/// Returns `NonPositiveQuantity` or `QuantityPrecision`.
pub fn validate_quantity(quantity: Decimal) -> Result<(), ValidationError> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveQuantity);
    }
    check_precision(quantity)
}

/// Validates a returned quantity, which may be zero.
///
/// # Errors
///
/// Returns `NegativeQuantity` or `QuantityPrecision`.
pub fn validate_returned_quantity(quantity: Decimal) -> Result<(), ValidationError> {
    if quantity < Decimal::ZERO {
        return Err(ValidationError::NegativeQuantity);
    }
    check_precision(quantity)
}

fn check_precision(quantity: Decimal) -> Result<(), ValidationError> {
    if quantity.normalize().scale() > QUANTITY_SCALE || quantity.abs() >= QUANTITY_LIMIT {
        return Err(ValidationError::QuantityPrecision(quantity));
    }
    Ok(())
}

/// Truncates a timestamp to the precision it is stored with, so a movement
/// compares equal before and after a round trip through storage.
#[must_use]
pub fn stored_timestamp(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(TIMESTAMP_DIGITS)
}

/// Trims a required text field, rejecting blanks.
///
/// # Errors
///
/// Returns `MissingField` when nothing but whitespace remains.
pub fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}
