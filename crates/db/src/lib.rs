//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repositories for the catalog, balance store, movement ledger and reports
//! - Row-locked ledger writes with bounded contention retry
//! - Database migrations

mod contention;
pub mod entities;
pub mod migration;
pub mod repositories;

pub use repositories::{BalanceRepository, CatalogRepository, LedgerRepository, ReportRepository};

use std::time::Duration;

use armory_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection pool sized by `config`.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
