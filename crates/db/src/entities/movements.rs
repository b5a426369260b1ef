//! `SeaORM` Entity for movements table.
//!
//! All four movement kinds share one table. `kind` is the discriminator and the
//! kind-specific columns are nullable; CHECK constraints in the migration pin
//! which columns each kind must fill.
//!
//! Site columns by kind:
//! - acquisition: `destination_site_id`
//! - transfer: `source_site_id`, `destination_site_id`
//! - issuance, consumption: `site_id`

use armory_core::ledger::{
    AcquisitionDetail, ConsumptionDetail, IssuanceDetail, Movement, MovementDetail, MovementKind,
    Recipient, StockError, TransferDetail, TransferStatus,
};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: String,
    pub item_type_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub quantity: Decimal,
    pub effective_at: DateTimeWithTimeZone,
    pub site_id: Option<Uuid>,
    pub source_site_id: Option<Uuid>,
    pub destination_site_id: Option<Uuid>,
    pub status: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub source_description: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_personnel_id: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub returned_quantity: Option<Decimal>,
    pub return_date: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    pub created_by: Uuid,
    pub is_deleted: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item_types::Entity",
        from = "Column::ItemTypeId",
        to = "super::item_types::Column::Id"
    )]
    ItemTypes,
}

impl Related<super::item_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemTypes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn corrupt(id: Uuid, what: &str) -> StockError {
    StockError::Internal(format!("movement {id}: {what}"))
}

impl Model {
    /// Converts a row into the domain movement.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Internal` if the row violates the per-kind column layout.
    pub fn into_domain(self) -> Result<Movement, StockError> {
        let id = self.id;
        let kind = MovementKind::parse(&self.kind).ok_or_else(|| corrupt(id, "unknown kind"))?;
        let missing = |column: &str| corrupt(id, &format!("{} row without {column}", self.kind));

        let detail = match kind {
            MovementKind::Acquisition => MovementDetail::Acquisition(AcquisitionDetail {
                destination: self
                    .destination_site_id
                    .ok_or_else(|| missing("destination_site_id"))?
                    .into(),
                source_description: self.source_description.clone().unwrap_or_default(),
            }),
            MovementKind::Transfer => MovementDetail::Transfer(TransferDetail {
                source: self
                    .source_site_id
                    .ok_or_else(|| missing("source_site_id"))?
                    .into(),
                destination: self
                    .destination_site_id
                    .ok_or_else(|| missing("destination_site_id"))?
                    .into(),
                status: self
                    .status
                    .as_deref()
                    .and_then(TransferStatus::parse)
                    .ok_or_else(|| missing("status"))?,
            }),
            MovementKind::Issuance => MovementDetail::Issuance(IssuanceDetail {
                site: self.site_id.ok_or_else(|| missing("site_id"))?.into(),
                recipient: Recipient {
                    name: self
                        .recipient_name
                        .clone()
                        .ok_or_else(|| missing("recipient_name"))?,
                    personnel_id: self.recipient_personnel_id.clone(),
                },
                returned_quantity: self.returned_quantity.unwrap_or_default(),
                return_date: self.return_date.map(|d| d.with_timezone(&Utc)),
            }),
            MovementKind::Consumption => MovementDetail::Consumption(ConsumptionDetail {
                site: self.site_id.ok_or_else(|| missing("site_id"))?.into(),
                reason: self.reason.clone().unwrap_or_default(),
            }),
        };

        Ok(Movement {
            id: id.into(),
            item_type_id: self.item_type_id.into(),
            quantity: self.quantity,
            effective_at: self.effective_at.with_timezone(&Utc),
            created_by: self.created_by.into(),
            created_at: self.created_at.with_timezone(&Utc),
            is_deleted: self.is_deleted,
            detail,
        })
    }
}

impl ActiveModel {
    /// Builds an insertable row from a domain movement.
    #[must_use]
    pub fn from_domain(movement: &Movement) -> Self {
        let mut row = Self {
            id: Set(movement.id.into_inner()),
            kind: Set(movement.kind().as_str().to_string()),
            item_type_id: Set(movement.item_type_id.into_inner()),
            quantity: Set(movement.quantity),
            effective_at: Set(movement.effective_at.into()),
            site_id: Set(None),
            source_site_id: Set(None),
            destination_site_id: Set(None),
            status: Set(None),
            source_description: Set(None),
            recipient_name: Set(None),
            recipient_personnel_id: Set(None),
            returned_quantity: Set(None),
            return_date: Set(None),
            reason: Set(None),
            created_by: Set(movement.created_by.into_inner()),
            is_deleted: Set(movement.is_deleted),
            created_at: Set(movement.created_at.into()),
            updated_at: Set(movement.created_at.into()),
        };

        match &movement.detail {
            MovementDetail::Acquisition(a) => {
                row.destination_site_id = Set(Some(a.destination.into_inner()));
                row.source_description = Set(Some(a.source_description.clone()));
            }
            MovementDetail::Transfer(t) => {
                row.source_site_id = Set(Some(t.source.into_inner()));
                row.destination_site_id = Set(Some(t.destination.into_inner()));
                row.status = Set(Some(t.status.as_str().to_string()));
            }
            MovementDetail::Issuance(i) => {
                row.site_id = Set(Some(i.site.into_inner()));
                row.recipient_name = Set(Some(i.recipient.name.clone()));
                row.recipient_personnel_id = Set(i.recipient.personnel_id.clone());
                row.returned_quantity = Set(Some(i.returned_quantity));
                row.return_date = Set(i.return_date.map(Into::into));
            }
            MovementDetail::Consumption(c) => {
                row.site_id = Set(Some(c.site.into_inner()));
                row.reason = Set(Some(c.reason.clone()));
            }
        }
        row
    }
}
