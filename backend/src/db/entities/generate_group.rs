use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Header row of one issuance batch. The issued serials live in
/// `serial_entries`, their MAC addresses in `entry_macs`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "generate_groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub model_number: String,
    pub telx_model_number: Option<String>,
    pub category_name: Option<String>,
    pub region_id: String,
    // Effective prefix before cleaning (model prefix or the requested one).
    pub prefix: String,
    #[sea_orm(indexed)]
    pub serial_prefix: String,
    pub serial_count: i32,
    // Counter of the batch's last serial; the high-water mark for its prefix.
    pub last_counter: i64,
    pub generated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::device_model::Entity",
        from = "Column::ModelNumber",
        to = "super::device_model::Column::ModelNumber",
        on_delete = "Restrict",
        on_update = "Cascade"
    )]
    DeviceModel,
    #[sea_orm(has_many = "super::serial_entry::Entity")]
    SerialEntry,
}

impl Related<super::device_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeviceModel.def()
    }
}

impl Related<super::serial_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SerialEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
