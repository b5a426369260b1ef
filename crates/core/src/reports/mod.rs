//! Stock report generation.
//!
//! Reports combine current balances (closing) with in-range movements (net
//! movement, assigned and expended totals). The opening balance is derived as
//! closing minus net movement rather than stored.

pub mod service;
pub mod types;


pub use service::ReportService;
pub use types::*;
