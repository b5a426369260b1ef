//! Common types used across the application.

pub mod date_range;
pub mod id;
pub mod pagination;

pub use date_range::{DateRange, DateRangeError};
pub use id::*;
pub use pagination::{PageMeta, PageRequest, PageResponse};
