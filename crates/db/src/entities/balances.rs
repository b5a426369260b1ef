//! `SeaORM` Entity for balances table.

use armory_core::balance::Balance;
use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub site_id: Uuid,
    pub item_type_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub quantity: Decimal,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sites::Entity",
        from = "Column::SiteId",
        to = "super::sites::Column::Id"
    )]
    Sites,
    #[sea_orm(
        belongs_to = "super::item_types::Entity",
        from = "Column::ItemTypeId",
        to = "super::item_types::Column::Id"
    )]
    ItemTypes,
}

impl Related<super::sites::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sites.def()
    }
}

impl Related<super::item_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemTypes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Balance {
    fn from(model: Model) -> Self {
        Self {
            id: model.id.into(),
            site_id: model.site_id.into(),
            item_type_id: model.item_type_id.into(),
            quantity: model.quantity,
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
