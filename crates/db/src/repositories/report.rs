//! Report repository.
//!
//! Loads balances and in-range movements from one read-only snapshot and hands
//! them to [`ReportService::compute`].

use std::collections::{BTreeSet, HashMap};

use armory_core::balance::Balance;
use armory_core::ledger::{Movement, StockError};
use armory_core::reports::{ReportScope, ReportService, StockReport};
use armory_core::scope::Caller;
use armory_shared::types::{DateRange, ItemTypeId, SiteId};
use sea_orm::{
    AccessMode, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, EntityTrait,
    IsolationLevel, QueryFilter, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use super::catalog::active_site_ids;
use crate::contention::db_error;
use crate::entities::{balances, item_types, movements};

/// Report repository.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    db: DatabaseConnection,
}

impl ReportRepository {
    /// Creates a new report repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Computes a stock report for the caller's visible part of `scope`.
    ///
    /// Sites outside the caller's visibility are dropped from the scope rather
    /// than rejected, so a restricted caller always gets a report for its own
    /// site at most.
    ///
    /// # Errors
    ///
    /// Returns `Database` on storage failure.
    #[tracing::instrument(skip(self, caller, scope), fields(user_id = %caller.user_id))]
    pub async fn compute_report(
        &self,
        caller: &Caller,
        scope: &ReportScope,
        date_range: DateRange,
    ) -> Result<StockReport, StockError> {
        let txn = self
            .db
            .begin_with_config(
                Some(IsolationLevel::RepeatableRead),
                Some(AccessMode::ReadOnly),
            )
            .await
            .map_err(db_error)?;

        let active = active_site_ids(&txn).await?;
        let sites = ReportService::resolve_sites(&caller.visibility, scope, active);
        debug!(sites = sites.len(), "Report scope resolved");

        let balances = load_balances(&txn, &sites, scope.item_type_id).await?;
        let movements = load_movements(&txn, &sites, scope.item_type_id, date_range).await?;
        let item_names = load_item_names(&txn).await?;

        txn.commit().await.map_err(db_error)?;

        Ok(ReportService::compute(
            &sites,
            scope.item_type_id,
            date_range,
            &balances,
            &movements,
            &item_names,
        ))
    }
}

fn site_uuids(sites: &BTreeSet<SiteId>) -> Vec<Uuid> {
    sites.iter().map(|s| s.into_inner()).collect()
}

async fn load_balances(
    txn: &DatabaseTransaction,
    sites: &BTreeSet<SiteId>,
    item_type_id: Option<ItemTypeId>,
) -> Result<Vec<Balance>, StockError> {
    let mut query =
        balances::Entity::find().filter(balances::Column::SiteId.is_in(site_uuids(sites)));
    if let Some(item_type_id) = item_type_id {
        query = query.filter(balances::Column::ItemTypeId.eq(item_type_id.into_inner()));
    }
    let rows = query.all(txn).await.map_err(db_error)?;
    Ok(rows.into_iter().map(Balance::from).collect())
}

async fn load_movements(
    txn: &DatabaseTransaction,
    sites: &BTreeSet<SiteId>,
    item_type_id: Option<ItemTypeId>,
    date_range: DateRange,
) -> Result<Vec<Movement>, StockError> {
    let ids = site_uuids(sites);
    let mut query = movements::Entity::find()
        .filter(movements::Column::IsDeleted.eq(false))
        .filter(
            Condition::any()
                .add(movements::Column::SiteId.is_in(ids.clone()))
                .add(movements::Column::SourceSiteId.is_in(ids.clone()))
                .add(movements::Column::DestinationSiteId.is_in(ids)),
        );
    if let Some(item_type_id) = item_type_id {
        query = query.filter(movements::Column::ItemTypeId.eq(item_type_id.into_inner()));
    }
    if let Some(start) = date_range.start {
        query = query.filter(movements::Column::EffectiveAt.gte(start));
    }
    if let Some(end) = date_range.end {
        query = query.filter(movements::Column::EffectiveAt.lte(end));
    }

    query
        .all(txn)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(movements::Model::into_domain)
        .collect()
}

async fn load_item_names(
    txn: &DatabaseTransaction,
) -> Result<HashMap<ItemTypeId, String>, StockError> {
    let rows = item_types::Entity::find()
        .all(txn)
        .await
        .map_err(db_error)?;
    Ok(rows
        .into_iter()
        .map(|row| (ItemTypeId::from(row.id), row.name))
        .collect())
}
