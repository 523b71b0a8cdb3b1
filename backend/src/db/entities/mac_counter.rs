use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Well-known id of the only row in `mac_counter`.
pub const GLOBAL_MAC_COUNTER_ID: &str = "global_mac_counter";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mac_counter")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Last issued MAC address as 12 uppercase hex digits.
    pub last_mac_hex: String,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
