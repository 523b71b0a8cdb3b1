use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "serial_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub serial_number: String,
    #[sea_orm(indexed)]
    pub group_id: Uuid,
    #[sea_orm(indexed)]
    pub model_number: String,
    /// Zero-based position inside the batch.
    pub position: i32,
    /// Flips false -> true once, never back.
    pub allocated: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::generate_group::Entity",
        from = "Column::GroupId",
        to = "super::generate_group::Column::Id",
        on_delete = "Restrict",
        on_update = "Cascade"
    )]
    GenerateGroup,
    #[sea_orm(has_many = "super::entry_mac::Entity")]
    EntryMac,
}

impl Related<super::generate_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GenerateGroup.def()
    }
}

impl Related<super::entry_mac::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EntryMac.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
