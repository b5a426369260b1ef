//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod balance;
pub mod catalog;
pub mod ledger;
pub mod report;

pub use balance::BalanceRepository;
pub use catalog::CatalogRepository;
pub use ledger::LedgerRepository;
pub use report::ReportRepository;
