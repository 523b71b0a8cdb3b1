//! Schema bootstrap. Safe to run on every start: every statement is
//! `IF NOT EXISTS`.

use sea_orm::sea_query::{Index, IndexOrder};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Schema};
use tracing::debug;

use crate::db::entities::{device_model, entry_mac, generate_group, mac_counter, serial_entry};

const GROUPS_BY_MODEL_INDEX: &str = "idx_generate_groups_model_number_generated_at";

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }

    debug!(table = entity.table_name(), "Ensured table.");
    Ok(())
}

/// Creates all tables and indexes used by the issuance engine.
///
/// Tables are created parents first so foreign keys resolve.
pub async fn create_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, device_model::Entity).await?;
    create_table(db, &schema, mac_counter::Entity).await?;
    create_table(db, &schema, generate_group::Entity).await?;
    create_table(db, &schema, serial_entry::Entity).await?;
    create_table(db, &schema, entry_mac::Entity).await?;

    // Batch listing reads newest-first per model.
    let groups_by_model = Index::create()
        .name(GROUPS_BY_MODEL_INDEX)
        .table(generate_group::Entity)
        .col(generate_group::Column::ModelNumber)
        .col((generate_group::Column::GeneratedAt, IndexOrder::Desc))
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&groups_by_model)).await?;

    Ok(())
}
