pub mod entities;
pub mod models;
pub mod schema;
pub mod services;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::info;

use services::{ServiceError, counter_service};

/// Opens the connection pool.
///
/// In-memory SQLite databases live and die with a single connection, so the
/// pool is pinned to one connection for those URLs.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    if database_url.contains(":memory:") {
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(max_connections);
    }
    opt.sqlx_logging(false);

    Database::connect(opt).await
}

/// Creates the schema and seeds the global MAC counter if it is missing.
pub async fn bootstrap(db: &DatabaseConnection, mac_seed: &str) -> Result<(), ServiceError> {
    schema::create_schema(db).await?;
    let counter = counter_service::ensure_mac_counter(db, mac_seed).await?;
    info!(last_mac_hex = %counter.last_mac_hex, "Database ready.");
    Ok(())
}
