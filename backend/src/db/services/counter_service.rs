//! The two counters that must never regress: the global last MAC address and
//! each model's last serial.
//!
//! Writes are compare-and-set. An update only lands when the stored value is
//! still the one the caller read; otherwise it reports `StaleCounter` and the
//! enclosing transaction must be rolled back.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr, sea_query::Expr,
};
use tracing::info;

use super::ServiceError;
use crate::db::entities::{
    device_model,
    mac_counter::{self, GLOBAL_MAC_COUNTER_ID},
};
use crate::sequence::{format_mac_hex, parse_mac_hex};

/// Reads the global MAC counter row, if it was ever created.
pub async fn get_mac_counter<C: ConnectionTrait>(
    db: &C,
) -> Result<Option<mac_counter::Model>, DbErr> {
    mac_counter::Entity::find_by_id(GLOBAL_MAC_COUNTER_ID.to_owned())
        .one(db)
        .await
}

/// Creates the global MAC counter with `seed` unless it already exists.
///
/// An existing counter is returned untouched, whatever its value. A
/// concurrent initializer winning the insert race is treated the same way.
pub async fn ensure_mac_counter<C: ConnectionTrait>(
    db: &C,
    seed: &str,
) -> Result<mac_counter::Model, ServiceError> {
    let seed = parse_mac_hex(seed)
        .map(format_mac_hex)
        .map_err(|e| ServiceError::InvalidArgument(e.to_string()))?;

    if let Some(existing) = get_mac_counter(db).await? {
        return Ok(existing);
    }

    let counter = mac_counter::ActiveModel {
        id: Set(GLOBAL_MAC_COUNTER_ID.to_owned()),
        last_mac_hex: Set(seed),
        updated_at: Set(Utc::now()),
    };

    match counter.insert(db).await {
        Ok(created) => {
            info!(last_mac_hex = %created.last_mac_hex, "Initialized global MAC counter.");
            Ok(created)
        }
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            get_mac_counter(db).await?.ok_or_else(|| {
                ServiceError::Internal("MAC counter vanished after concurrent initialization".to_string())
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Returns the last issued MAC address in counter form.
pub async fn load_last_mac_hex<C: ConnectionTrait>(db: &C) -> Result<String, ServiceError> {
    get_mac_counter(db)
        .await?
        .map(|counter| counter.last_mac_hex)
        .ok_or_else(|| ServiceError::Internal("MAC counter not initialized".to_string()))
}

/// Moves the global MAC counter from `expected` to `next`.
pub async fn advance_mac_counter<C: ConnectionTrait>(
    db: &C,
    expected: &str,
    next: &str,
) -> Result<(), ServiceError> {
    let result = mac_counter::Entity::update_many()
        .col_expr(mac_counter::Column::LastMacHex, Expr::value(next))
        .col_expr(mac_counter::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(mac_counter::Column::Id.eq(GLOBAL_MAC_COUNTER_ID))
        .filter(mac_counter::Column::LastMacHex.eq(expected))
        .exec(db)
        .await?;

    if result.rows_affected != 1 {
        return Err(ServiceError::StaleCounter(format!(
            "MAC counter moved past {expected} concurrently"
        )));
    }
    Ok(())
}

/// Moves a model's last serial from `expected` to `next` and adds `issued`
/// to its generated count.
///
/// Fails with `StaleCounter` if the model disappeared or another issuance
/// already advanced it.
pub async fn advance_model_serial<C: ConnectionTrait>(
    db: &C,
    model_number: &str,
    expected: Option<&str>,
    next: &str,
    issued: i64,
) -> Result<(), ServiceError> {
    let update = device_model::Entity::update_many()
        .col_expr(device_model::Column::LastSerial, Expr::value(next))
        .col_expr(
            device_model::Column::GeneratedCount,
            Expr::col(device_model::Column::GeneratedCount).add(issued),
        )
        .col_expr(device_model::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(device_model::Column::ModelNumber.eq(model_number));

    let update = match expected {
        Some(last_serial) => update.filter(device_model::Column::LastSerial.eq(last_serial)),
        None => update.filter(device_model::Column::LastSerial.is_null()),
    };

    let result = update.exec(db).await?;
    if result.rows_affected != 1 {
        return Err(ServiceError::StaleCounter(format!(
            "Model {model_number} was modified by a concurrent issuance"
        )));
    }
    Ok(())
}
