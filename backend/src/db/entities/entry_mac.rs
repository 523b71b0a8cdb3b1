use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One MAC address bound to a serial entry. The primary key makes every
/// address unique across the whole system.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entry_macs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub mac_address: String,
    #[sea_orm(indexed)]
    pub serial_number: String,
    #[sea_orm(indexed)]
    pub group_id: Uuid,
    pub slot: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::serial_entry::Entity",
        from = "Column::SerialNumber",
        to = "super::serial_entry::Column::SerialNumber",
        on_delete = "Restrict",
        on_update = "Cascade"
    )]
    SerialEntry,
}

impl Related<super::serial_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SerialEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
