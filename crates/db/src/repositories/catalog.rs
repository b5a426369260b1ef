//! Catalog repository for sites and item types.

use std::collections::BTreeSet;

use armory_core::catalog::{CatalogSnapshot, ItemType, NewItemType, NewSite, Site};
use armory_core::ledger::StockError;
use armory_core::scope::SiteVisibility;
use armory_shared::types::{ItemTypeId, SiteId};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::info;

use crate::contention::db_error;
use crate::entities::{item_types, sites};

/// Catalog repository.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    db: DatabaseConnection,
}

impl CatalogRepository {
    /// Creates a new catalog repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    // ========================================================================
    // Sites
    // ========================================================================

    /// Registers a site.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for blank fields and `CatalogConflict` when the code
    /// or name is taken.
    #[tracing::instrument(skip(self, input))]
    pub async fn create_site(&self, input: &NewSite) -> Result<Site, StockError> {
        let input = input.normalized()?;
        let now = Utc::now();
        let model = sites::ActiveModel {
            id: Set(SiteId::new().into_inner()),
            code: Set(input.code),
            name: Set(input.name),
            location: Set(input.location),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await
        .map_err(db_error)?;

        info!(site_id = %model.id, code = %model.code, "Site created");
        Ok(model.into())
    }

    /// Gets a non-deleted site.
    ///
    /// # Errors
    ///
    /// Returns `SiteNotFound` if the site is missing, deleted or not visible.
    pub async fn get_site(
        &self,
        visibility: &SiteVisibility,
        id: SiteId,
    ) -> Result<Site, StockError> {
        if !visibility.permits(id) {
            return Err(StockError::SiteNotFound(id));
        }
        sites::Entity::find_by_id(id.into_inner())
            .filter(sites::Column::IsDeleted.eq(false))
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(Site::from)
            .ok_or(StockError::SiteNotFound(id))
    }

    /// Lists non-deleted sites visible to the caller, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `Database` on storage failure.
    pub async fn list_sites(&self, visibility: &SiteVisibility) -> Result<Vec<Site>, StockError> {
        let mut query = sites::Entity::find().filter(sites::Column::IsDeleted.eq(false));
        if let SiteVisibility::Site(site_id) = visibility {
            query = query.filter(sites::Column::Id.eq(site_id.into_inner()));
        }
        let rows = query
            .order_by_asc(sites::Column::Name)
            .all(&self.db)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(Site::from).collect())
    }

    /// Soft-deletes a site. Existing movements and balances keep referencing it.
    ///
    /// # Errors
    ///
    /// Returns `SiteNotFound` if the site is missing or already deleted.
    #[tracing::instrument(skip(self), fields(site_id = %id))]
    pub async fn soft_delete_site(&self, id: SiteId) -> Result<(), StockError> {
        let result = sites::Entity::update_many()
            .col_expr(sites::Column::IsDeleted, Expr::value(true))
            .col_expr(sites::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sites::Column::Id.eq(id.into_inner()))
            .filter(sites::Column::IsDeleted.eq(false))
            .exec(&self.db)
            .await
            .map_err(db_error)?;

        if result.rows_affected == 0 {
            return Err(StockError::SiteNotFound(id));
        }
        info!("Site deleted");
        Ok(())
    }

    /// Returns the ids of all non-deleted sites.
    ///
    /// # Errors
    ///
    /// Returns `Database` on storage failure.
    pub async fn active_site_ids(&self) -> Result<Vec<SiteId>, StockError> {
        active_site_ids(&self.db).await
    }

    // ========================================================================
    // Item types
    // ========================================================================

    /// Registers an item type; the unit defaults to `"units"`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank name and `CatalogConflict` when the name
    /// is taken.
    #[tracing::instrument(skip(self, input))]
    pub async fn create_item_type(&self, input: &NewItemType) -> Result<ItemType, StockError> {
        let input = input.normalized()?;
        let now = Utc::now();
        let model = item_types::ActiveModel {
            id: Set(ItemTypeId::new().into_inner()),
            name: Set(input.name),
            description: Set(input.description.unwrap_or_default()),
            unit: Set(input.unit.unwrap_or_default()),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&self.db)
        .await
        .map_err(db_error)?;

        info!(item_type_id = %model.id, name = %model.name, "Item type created");
        Ok(model.into())
    }

    /// Gets a non-deleted item type.
    ///
    /// # Errors
    ///
    /// Returns `ItemTypeNotFound` if the item type is missing or deleted.
    pub async fn get_item_type(&self, id: ItemTypeId) -> Result<ItemType, StockError> {
        item_types::Entity::find_by_id(id.into_inner())
            .filter(item_types::Column::IsDeleted.eq(false))
            .one(&self.db)
            .await
            .map_err(db_error)?
            .map(ItemType::from)
            .ok_or(StockError::ItemTypeNotFound(id))
    }

    /// Lists non-deleted item types ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `Database` on storage failure.
    pub async fn list_item_types(&self) -> Result<Vec<ItemType>, StockError> {
        let rows = item_types::Entity::find()
            .filter(item_types::Column::IsDeleted.eq(false))
            .order_by_asc(item_types::Column::Name)
            .all(&self.db)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(ItemType::from).collect())
    }

    /// Soft-deletes an item type.
    ///
    /// # Errors
    ///
    /// Returns `ItemTypeNotFound` if the item type is missing or already deleted.
    #[tracing::instrument(skip(self), fields(item_type_id = %id))]
    pub async fn soft_delete_item_type(&self, id: ItemTypeId) -> Result<(), StockError> {
        let result = item_types::Entity::update_many()
            .col_expr(item_types::Column::IsDeleted, Expr::value(true))
            .col_expr(item_types::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(item_types::Column::Id.eq(id.into_inner()))
            .filter(item_types::Column::IsDeleted.eq(false))
            .exec(&self.db)
            .await
            .map_err(db_error)?;

        if result.rows_affected == 0 {
            return Err(StockError::ItemTypeNotFound(id));
        }
        info!("Item type deleted");
        Ok(())
    }
}

/// Loads the catalog rows a request references, deleted ones included, so
/// validation can tell "unknown" from "deleted".
///
/// Rows are read `FOR SHARE`: inside a write transaction a concurrent soft
/// delete waits until the movement is committed.
pub(crate) async fn load_snapshot(
    txn: &DatabaseTransaction,
    site_ids: &[SiteId],
    item_type_id: ItemTypeId,
) -> Result<CatalogSnapshot, DbErr> {
    let ids: BTreeSet<_> = site_ids.iter().map(|id| id.into_inner()).collect();
    let site_rows = sites::Entity::find()
        .filter(sites::Column::Id.is_in(ids))
        .order_by_asc(sites::Column::Id)
        .lock_shared()
        .all(txn)
        .await?;
    let item_rows = item_types::Entity::find_by_id(item_type_id.into_inner())
        .lock_shared()
        .all(txn)
        .await?;

    Ok(CatalogSnapshot::new(
        site_rows.into_iter().map(Site::from),
        item_rows.into_iter().map(ItemType::from),
    ))
}

pub(crate) async fn active_site_ids<C: ConnectionTrait>(db: &C) -> Result<Vec<SiteId>, StockError> {
    let rows = sites::Entity::find()
        .filter(sites::Column::IsDeleted.eq(false))
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(rows.into_iter().map(|s| SiteId::from(s.id)).collect())
}
