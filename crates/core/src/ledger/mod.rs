//! Stock movement ledger.
//!
//! This module implements the core ledger functionality:
//! - Movement records as a sum type over the four movement kinds
//! - The transfer status state machine
//! - Validation of new movements against the catalog and caller scope
//! - Amendment rules for the few mutable fields
//! - The balance reconciler that turns movements into balance deltas
//! - Error types for ledger operations

pub mod amendment;
pub mod error;
pub mod reconciler;
pub mod service;
pub mod transfer;
pub mod types;
pub mod validation;

#[cfg(test)]
mod reconciler_props;

pub use amendment::{AmendmentOutcome, plan_amendment};
pub use error::{StockError, TransitionError, ValidationError};
pub use reconciler::{BalanceChange, BalanceDelta, BalanceKey, Reconciler};
pub use service::MovementService;
pub use transfer::TransferTransition;
pub use types::{
    AcquisitionDetail, ConsumptionDetail, CreateAcquisitionInput, CreateConsumptionInput,
    CreateIssuanceInput, CreateTransferInput, IssuanceDetail, Movement, MovementAmendment,
    MovementDetail, MovementFilter, MovementKind, MovementOrdering, Recipient, TransferDetail,
    TransferStatus,
};
