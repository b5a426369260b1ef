//! Balance store access.
//!
//! Reads are plain queries scoped by the caller's visibility. Writes only happen
//! through [`lock_and_apply`], which the ledger repository calls inside its own
//! transaction.

use std::collections::HashMap;

use armory_core::balance::{Balance, BalanceFilter};
use armory_core::ledger::{BalanceChange, BalanceDelta, BalanceKey, Reconciler, StockError};
use armory_core::scope::{Caller, SiteVisibility};
use armory_shared::types::{BalanceId, ItemTypeId, SiteId};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::{debug, warn};

use crate::contention::{WriteError, db_error};
use crate::entities::balances;

/// Balance repository.
#[derive(Debug, Clone)]
pub struct BalanceRepository {
    db: DatabaseConnection,
}

impl BalanceRepository {
    /// Creates a new balance repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns the quantity on hand; zero if the pair was never touched.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` if the site is outside the caller's scope.
    pub async fn get_balance(
        &self,
        caller: &Caller,
        site_id: SiteId,
        item_type_id: ItemTypeId,
    ) -> Result<Decimal, StockError> {
        caller.authorize_site(site_id)?;
        let row = balances::Entity::find()
            .filter(balances::Column::SiteId.eq(site_id.into_inner()))
            .filter(balances::Column::ItemTypeId.eq(item_type_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_error)?;
        Ok(row.map_or(Decimal::ZERO, |b| b.quantity))
    }

    /// Lists balances ordered by site then item type.
    ///
    /// # Errors
    ///
    /// Returns `Database` on storage failure.
    pub async fn list_balances(
        &self,
        caller: &Caller,
        filter: BalanceFilter,
    ) -> Result<Vec<Balance>, StockError> {
        let mut query = balances::Entity::find();
        if let SiteVisibility::Site(site_id) = caller.visibility {
            query = query.filter(balances::Column::SiteId.eq(site_id.into_inner()));
        }
        if let Some(site_id) = filter.site_id {
            query = query.filter(balances::Column::SiteId.eq(site_id.into_inner()));
        }
        if let Some(item_type_id) = filter.item_type_id {
            query = query.filter(balances::Column::ItemTypeId.eq(item_type_id.into_inner()));
        }

        let rows = query
            .order_by_asc(balances::Column::SiteId)
            .order_by_asc(balances::Column::ItemTypeId)
            .all(&self.db)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(Balance::from).collect())
    }

    /// Counts item types with stock on hand at a site.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` if the site is outside the caller's scope.
    pub async fn stocked_item_count(
        &self,
        caller: &Caller,
        site_id: SiteId,
    ) -> Result<u64, StockError> {
        caller.authorize_site(site_id)?;
        balances::Entity::find()
            .filter(balances::Column::SiteId.eq(site_id.into_inner()))
            .filter(balances::Column::Quantity.gt(Decimal::ZERO))
            .count(&self.db)
            .await
            .map_err(db_error)
    }
}

/// Locks the balances touched by `deltas`, checks them and writes the result.
///
/// Missing rows are created at zero first so every key has a row to lock. Rows
/// are then locked one at a time in [`BalanceKey`] order, which is the same for
/// every transaction and so cannot deadlock against another writer.
///
/// # Errors
///
/// Returns `InsufficientStock` if any balance would go negative, or the storage
/// error (possibly a lock timeout) that interrupted the work.
pub(crate) async fn lock_and_apply(
    txn: &DatabaseTransaction,
    deltas: &[BalanceDelta],
) -> Result<Vec<BalanceChange>, WriteError> {
    let net = Reconciler::net(deltas);
    if net.is_empty() {
        return Ok(Vec::new());
    }

    let now = Utc::now();
    let seeds = net.keys().map(|key| balances::ActiveModel {
        id: Set(BalanceId::new().into_inner()),
        site_id: Set(key.site_id.into_inner()),
        item_type_id: Set(key.item_type_id.into_inner()),
        quantity: Set(Decimal::ZERO),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    });
    balances::Entity::insert_many(seeds)
        .on_conflict(
            OnConflict::columns([balances::Column::SiteId, balances::Column::ItemTypeId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;

    let mut rows: HashMap<BalanceKey, balances::Model> = HashMap::with_capacity(net.len());
    for key in net.keys() {
        let row = balances::Entity::find()
            .filter(balances::Column::SiteId.eq(key.site_id.into_inner()))
            .filter(balances::Column::ItemTypeId.eq(key.item_type_id.into_inner()))
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| {
                StockError::Internal(format!(
                    "balance row for site {} item {} vanished",
                    key.site_id, key.item_type_id
                ))
            })?;
        debug!(
            site_id = %key.site_id,
            item_type_id = %key.item_type_id,
            quantity = %row.quantity,
            "Balance locked"
        );
        rows.insert(*key, row);
    }

    let changes = Reconciler::apply(deltas, |key| {
        rows.get(key).map_or(Decimal::ZERO, |row| row.quantity)
    })
    .inspect_err(|err| warn!(error = %err, "Balance change rejected"))?;

    for change in &changes {
        let Some(row) = rows.get(&change.key) else {
            continue;
        };
        balances::Entity::update_many()
            .col_expr(balances::Column::Quantity, Expr::value(change.current))
            .col_expr(balances::Column::UpdatedAt, Expr::value(now))
            .filter(balances::Column::Id.eq(row.id))
            .exec(txn)
            .await?;
    }

    Ok(changes)
}
