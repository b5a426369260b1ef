//! Core stock ledger logic for Armory.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and balance calculations live here.
//!
//! # Modules
//!
//! - `catalog` - Sites and item types referenced by every movement
//! - `balance` - Quantity-on-hand records
//! - `ledger` - Movement kinds, transfer state machine, amendments and the balance reconciler
//! - `scope` - Caller site-visibility applied to every read and write
//! - `reports` - Opening/closing balance reports over the ledger
//! - `retry` - Backoff policy for contended ledger writes

pub mod balance;
pub mod catalog;
pub mod ledger;
pub mod reports;
pub mod retry;
pub mod scope;
