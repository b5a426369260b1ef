//! `SeaORM` entity definitions.
//!
//! Entities mirror the tables created by the initial migration and convert into
//! the domain types of `armory-core`.

pub mod balances;
pub mod item_types;
pub mod movements;
pub mod sites;
