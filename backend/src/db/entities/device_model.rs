use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A device type that serials and MAC addresses are issued for.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device_models")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub model_number: String,
    pub prefix: Option<String>,
    pub telx_model_number: Option<String>,
    pub category_name: Option<String>,
    pub description: Option<String>,
    pub macs_per_serial: i32,
    // Most recently issued serial; the next batch is derived from it.
    pub last_serial: Option<String>,
    pub generated_count: i64,
    // Recounted from serial_entries on every allocation, never incremented.
    pub allocated_count: i64,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::generate_group::Entity")]
    GenerateGroup,
}

impl Related<super::generate_group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GenerateGroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
