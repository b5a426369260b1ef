//! Ledger repository: movement writes and reads.
//!
//! Every write runs in one database transaction that:
//! 1. Bounds lock waits with `SET LOCAL lock_timeout`
//! 2. Validates the request against share-locked catalog rows
//! 3. Locks the affected balance rows in key order
//! 4. Checks and applies the reconciler's deltas
//! 5. Inserts or updates the movement row
//!
//! A lock timeout, deadlock or serialization failure rolls the attempt back and
//! the whole transaction is retried under the configured [`RetryPolicy`].

use armory_core::catalog::CatalogSnapshot;
use armory_core::ledger::{
    CreateAcquisitionInput, CreateConsumptionInput, CreateIssuanceInput, CreateTransferInput,
    Movement, MovementAmendment, MovementDetail, MovementFilter, MovementOrdering,
    MovementService, Reconciler, StockError, TransferStatus, plan_amendment,
};
use armory_core::retry::RetryPolicy;
use armory_core::scope::{Caller, SiteVisibility};
use armory_shared::config::LedgerConfig;
use armory_shared::types::{ItemTypeId, MovementId, PageRequest, PageResponse, SiteId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use super::balance::lock_and_apply;
use super::catalog::load_snapshot;
use crate::contention::{WriteError, db_error, set_lock_timeout, with_retry};
use crate::entities::movements;

/// Default bound on a single lock wait, in milliseconds.
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

/// Ledger repository.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
    policy: RetryPolicy,
    lock_timeout_ms: u64,
}

impl LedgerRepository {
    /// Creates a ledger repository with the default retry policy.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            policy: RetryPolicy::default(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    /// Creates a ledger repository from configuration.
    #[must_use]
    pub fn with_config(db: DatabaseConnection, config: &LedgerConfig) -> Self {
        Self {
            db,
            policy: RetryPolicy::from(config),
            lock_timeout_ms: config.lock_timeout_ms,
        }
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Records stock arriving at a site.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `Forbidden`, `Contention` or `Database`.
    #[tracing::instrument(
        skip(self, caller, input),
        fields(user_id = %caller.user_id, site_id = %input.destination)
    )]
    pub async fn create_acquisition(
        &self,
        caller: &Caller,
        input: &CreateAcquisitionInput,
    ) -> Result<Movement, StockError> {
        self.append(&[input.destination], input.item_type_id, |catalog| {
            MovementService::acquisition(input, caller, catalog, Utc::now())
        })
        .await
    }

    /// Records a transfer request. Balances do not move until it completes.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `Forbidden`, `Contention` or `Database`.
    #[tracing::instrument(
        skip(self, caller, input),
        fields(user_id = %caller.user_id, source = %input.source, destination = %input.destination)
    )]
    pub async fn create_transfer(
        &self,
        caller: &Caller,
        input: &CreateTransferInput,
    ) -> Result<Movement, StockError> {
        let sites = [input.source, input.destination];
        self.append(&sites, input.item_type_id, |catalog| {
            MovementService::transfer(input, caller, catalog, Utc::now())
        })
        .await
    }

    /// Records stock issued to a person.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `Forbidden`, `InsufficientStock`, `Contention` or `Database`.
    #[tracing::instrument(
        skip(self, caller, input),
        fields(user_id = %caller.user_id, site_id = %input.site)
    )]
    pub async fn create_issuance(
        &self,
        caller: &Caller,
        input: &CreateIssuanceInput,
    ) -> Result<Movement, StockError> {
        self.append(&[input.site], input.item_type_id, |catalog| {
            MovementService::issuance(input, caller, catalog, Utc::now())
        })
        .await
    }

    /// Records stock used up at a site.
    ///
    /// # Errors
    ///
    /// Returns `Validation`, `Forbidden`, `InsufficientStock`, `Contention` or `Database`.
    #[tracing::instrument(
        skip(self, caller, input),
        fields(user_id = %caller.user_id, site_id = %input.site)
    )]
    pub async fn create_consumption(
        &self,
        caller: &Caller,
        input: &CreateConsumptionInput,
    ) -> Result<Movement, StockError> {
        self.append(&[input.site], input.item_type_id, |catalog| {
            MovementService::consumption(input, caller, catalog, Utc::now())
        })
        .await
    }

    async fn append<F>(
        &self,
        sites: &[SiteId],
        item_type_id: ItemTypeId,
        build: F,
    ) -> Result<Movement, StockError>
    where
        F: Fn(&CatalogSnapshot) -> Result<Movement, StockError>,
    {
        with_retry(&self.policy, "append", || {
            self.try_append(sites, item_type_id, &build)
        })
        .await
    }

    /// One attempt at recording a movement. The catalog rows it references are
    /// validated and share-locked in the same transaction as the balance write.
    async fn try_append<F>(
        &self,
        sites: &[SiteId],
        item_type_id: ItemTypeId,
        build: &F,
    ) -> Result<Movement, WriteError>
    where
        F: Fn(&CatalogSnapshot) -> Result<Movement, StockError>,
    {
        let txn = self.db.begin().await?;
        set_lock_timeout(&txn, self.lock_timeout_ms).await?;

        let catalog = load_snapshot(&txn, sites, item_type_id).await?;
        let movement = build(&catalog)?;
        let changes = lock_and_apply(&txn, &Reconciler::on_create(&movement)).await?;
        let stored = movements::ActiveModel::from_domain(&movement)
            .insert(&txn)
            .await?
            .into_domain()?;

        txn.commit().await?;

        info!(
            movement_id = %stored.id,
            kind = stored.kind().as_str(),
            item_type_id = %stored.item_type_id,
            quantity = %stored.quantity,
            balances = changes.len(),
            "Movement recorded"
        );
        Ok(stored)
    }

    // ========================================================================
    // Amend
    // ========================================================================

    /// Moves a transfer to a new status. Completion moves the stock.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for illegal or repeated transitions and
    /// `InsufficientStock` if the source cannot cover a completion.
    pub async fn transition_transfer(
        &self,
        caller: &Caller,
        id: MovementId,
        status: TransferStatus,
    ) -> Result<Movement, StockError> {
        self.amend(caller, id, MovementAmendment::status(status))
            .await
    }

    /// Raises an issuance's returned quantity to `returned`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if `returned` is below the current value and
    /// `Validation` if it exceeds the issued quantity.
    pub async fn record_return(
        &self,
        caller: &Caller,
        id: MovementId,
        returned: Decimal,
        return_date: Option<DateTime<Utc>>,
    ) -> Result<Movement, StockError> {
        self.amend(
            caller,
            id,
            MovementAmendment::returned(returned, return_date),
        )
        .await
    }

    /// Applies a partial update to a movement.
    ///
    /// # Errors
    ///
    /// Returns `MovementNotFound`, `Forbidden`, `ImmutableField`, `Validation`,
    /// `InvalidTransition`, `InsufficientStock`, `Contention` or `Database`.
    #[tracing::instrument(
        skip(self, caller, amendment),
        fields(user_id = %caller.user_id, movement_id = %id)
    )]
    pub async fn amend(
        &self,
        caller: &Caller,
        id: MovementId,
        amendment: MovementAmendment,
    ) -> Result<Movement, StockError> {
        with_retry(&self.policy, "amend", || {
            self.try_amend(caller, id, &amendment)
        })
        .await
    }

    async fn try_amend(
        &self,
        caller: &Caller,
        id: MovementId,
        amendment: &MovementAmendment,
    ) -> Result<Movement, WriteError> {
        let txn = self.db.begin().await?;
        set_lock_timeout(&txn, self.lock_timeout_ms).await?;

        let movement = movements::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(StockError::MovementNotFound(id))?
            .into_domain()?;
        if movement.is_deleted {
            return Err(StockError::MovementNotFound(id).into());
        }
        caller.authorize_movement(&movement)?;

        let now = Utc::now();
        let outcome = plan_amendment(&movement, amendment, now)?;
        if !outcome.changed {
            txn.rollback().await?;
            return Ok(movement);
        }

        lock_and_apply(&txn, &outcome.deltas).await?;

        let mut update = movements::Entity::update_many()
            .col_expr(movements::Column::UpdatedAt, Expr::value(now))
            .filter(movements::Column::Id.eq(id.into_inner()));
        match &outcome.updated.detail {
            MovementDetail::Transfer(t) => {
                update = update.col_expr(movements::Column::Status, Expr::value(t.status.as_str()));
            }
            MovementDetail::Issuance(i) => {
                update = update
                    .col_expr(
                        movements::Column::ReturnedQuantity,
                        Expr::value(i.returned_quantity),
                    )
                    .col_expr(movements::Column::ReturnDate, Expr::value(i.return_date));
            }
            MovementDetail::Acquisition(_) | MovementDetail::Consumption(_) => {}
        }
        update.exec(&txn).await?;

        txn.commit().await?;

        match outcome.transition {
            Some(t) => info!(
                from = %t.from,
                to = %t.to,
                applied = t.applies_balance,
                "Transfer transitioned"
            ),
            None => info!(outstanding = ?outcome.updated.outstanding(), "Movement amended"),
        }
        Ok(outcome.updated)
    }

    /// Marks a movement deleted. Balances are left as they are.
    ///
    /// # Errors
    ///
    /// Returns `MovementNotFound` or `Forbidden`.
    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id, movement_id = %id))]
    pub async fn soft_delete(&self, caller: &Caller, id: MovementId) -> Result<(), StockError> {
        let movement = self.find_active(id).await?;
        caller.authorize_movement(&movement)?;

        let result = movements::Entity::update_many()
            .col_expr(movements::Column::IsDeleted, Expr::value(true))
            .col_expr(movements::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(movements::Column::Id.eq(id.into_inner()))
            .filter(movements::Column::IsDeleted.eq(false))
            .exec(&self.db)
            .await
            .map_err(db_error)?;
        if result.rows_affected == 0 {
            return Err(StockError::MovementNotFound(id));
        }

        info!("Movement deleted");
        Ok(())
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Gets a movement the caller can see.
    ///
    /// # Errors
    ///
    /// Returns `MovementNotFound` if it is missing, deleted or outside the
    /// caller's scope.
    pub async fn get_movement(
        &self,
        caller: &Caller,
        id: MovementId,
    ) -> Result<Movement, StockError> {
        let movement = self.find_active(id).await?;
        if !caller.visibility.permits_movement(&movement) {
            return Err(StockError::MovementNotFound(id));
        }
        Ok(movement)
    }

    /// Lists movements the caller can see.
    ///
    /// # Errors
    ///
    /// Returns `Database` on storage failure.
    pub async fn list_movements(
        &self,
        caller: &Caller,
        filter: &MovementFilter,
        ordering: MovementOrdering,
        page: PageRequest,
    ) -> Result<PageResponse<Movement>, StockError> {
        let query = movements::Entity::find().filter(list_condition(&caller.visibility, filter));
        let total = query.clone().count(&self.db).await.map_err(db_error)?;

        let (primary, direction) = match ordering {
            MovementOrdering::EffectiveDesc => (movements::Column::EffectiveAt, Order::Desc),
            MovementOrdering::EffectiveAsc => (movements::Column::EffectiveAt, Order::Asc),
            MovementOrdering::CreatedDesc => (movements::Column::CreatedAt, Order::Desc),
            MovementOrdering::CreatedAsc => (movements::Column::CreatedAt, Order::Asc),
        };
        let rows = query
            .order_by(primary, direction.clone())
            .order_by(movements::Column::CreatedAt, direction.clone())
            .order_by(movements::Column::Id, direction)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_error)?;

        let data = rows
            .into_iter()
            .map(movements::Model::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PageResponse::new(data, page, total))
    }

    async fn find_active(&self, id: MovementId) -> Result<Movement, StockError> {
        movements::Entity::find_by_id(id.into_inner())
            .filter(movements::Column::IsDeleted.eq(false))
            .one(&self.db)
            .await
            .map_err(db_error)?
            .ok_or(StockError::MovementNotFound(id))?
            .into_domain()
    }
}

/// Matches a movement on any of its site columns.
fn touches_site(site_id: Uuid) -> Condition {
    Condition::any()
        .add(movements::Column::SiteId.eq(site_id))
        .add(movements::Column::SourceSiteId.eq(site_id))
        .add(movements::Column::DestinationSiteId.eq(site_id))
}

/// Builds the WHERE clause for a movement listing.
pub(crate) fn list_condition(visibility: &SiteVisibility, filter: &MovementFilter) -> Condition {
    let mut condition = Condition::all().add(movements::Column::IsDeleted.eq(false));

    if let Some(kind) = filter.kind {
        condition = condition.add(movements::Column::Kind.eq(kind.as_str()));
    }
    if let Some(site_id) = filter.site_id {
        condition = condition.add(touches_site(site_id.into_inner()));
    }
    if let Some(item_type_id) = filter.item_type_id {
        condition = condition.add(movements::Column::ItemTypeId.eq(item_type_id.into_inner()));
    }
    if let Some(start) = filter.date_range.start {
        condition = condition.add(movements::Column::EffectiveAt.gte(start));
    }
    if let Some(end) = filter.date_range.end {
        condition = condition.add(movements::Column::EffectiveAt.lte(end));
    }
    if let Some(status) = filter.status {
        condition = condition
            .add(movements::Column::Kind.eq("transfer"))
            .add(movements::Column::Status.eq(status.as_str()));
    }
    if let SiteVisibility::Site(site_id) = visibility {
        condition = condition.add(touches_site(site_id.into_inner()));
    }

    condition
}
