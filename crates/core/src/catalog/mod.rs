//! Site and item-type registry.
//!
//! Catalog rows are reference data: every movement and balance names one site
//! (two for transfers) and one item type. Rows are soft-deleted, never removed.

pub mod snapshot;
pub mod types;

pub use snapshot::CatalogSnapshot;
pub use types::{DEFAULT_UNIT, ItemType, NewItemType, NewSite, Site};
