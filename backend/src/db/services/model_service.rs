//! The catalog boundary the issuer depends on: registering a model, reading
//! it back, and editing its issuance settings. Counters are owned by the
//! issuer and the allocation tracker and are never written from here.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel, Set};
use serde::Deserialize;
use tracing::info;

use super::ServiceError;
use crate::db::entities::device_model;

#[derive(Debug, Clone, Deserialize)]
pub struct NewDeviceModel {
    pub model_number: String,
    pub prefix: Option<String>,
    pub telx_model_number: Option<String>,
    pub category_name: Option<String>,
    pub description: Option<String>,
    pub macs_per_serial: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceModelUpdate {
    pub prefix: Option<String>,
    pub telx_model_number: Option<String>,
    pub category_name: Option<String>,
    pub description: Option<String>,
    pub macs_per_serial: Option<i32>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Most MAC addresses a single serial may carry.
pub const MAX_MACS_PER_SERIAL: i32 = 256;

fn validate_macs_per_serial(value: Option<i32>) -> Result<i32, ServiceError> {
    match value {
        None => Ok(1),
        Some(n) if (1..=MAX_MACS_PER_SERIAL).contains(&n) => Ok(n),
        Some(n) => Err(ServiceError::InvalidArgument(format!(
            "macs_per_serial must be between 1 and {MAX_MACS_PER_SERIAL}, got {n}"
        ))),
    }
}

pub async fn find_model<C: ConnectionTrait>(
    db: &C,
    model_number: &str,
) -> Result<Option<device_model::Model>, ServiceError> {
    Ok(device_model::Entity::find_by_id(model_number.to_owned())
        .one(db)
        .await?)
}

pub async fn get_model<C: ConnectionTrait>(
    db: &C,
    model_number: &str,
) -> Result<device_model::Model, ServiceError> {
    find_model(db, model_number)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Model {model_number} not found")))
}

/// Registers a model with empty issuance history.
pub async fn register_model<C: ConnectionTrait>(
    db: &C,
    new_model: NewDeviceModel,
) -> Result<device_model::Model, ServiceError> {
    let model_number = new_model.model_number.trim().to_string();
    if model_number.is_empty() {
        return Err(ServiceError::InvalidArgument("model_number is required".to_string()));
    }
    let macs_per_serial = validate_macs_per_serial(new_model.macs_per_serial)?;

    if find_model(db, &model_number).await?.is_some() {
        return Err(ServiceError::Conflict(format!("Model {model_number} already exists")));
    }

    let now = Utc::now();
    let model = device_model::ActiveModel {
        model_number: Set(model_number),
        prefix: Set(trimmed(new_model.prefix)),
        telx_model_number: Set(trimmed(new_model.telx_model_number)),
        category_name: Set(trimmed(new_model.category_name)),
        description: Set(trimmed(new_model.description)),
        macs_per_serial: Set(macs_per_serial),
        last_serial: Set(None),
        generated_count: Set(0),
        allocated_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(model_number = %model.model_number, "Registered model.");
    Ok(model)
}

/// Replaces a model's descriptive and issuance settings.
///
/// A prefix change only affects batches issued afterwards.
pub async fn update_model<C: ConnectionTrait>(
    db: &C,
    model_number: &str,
    update: DeviceModelUpdate,
) -> Result<device_model::Model, ServiceError> {
    let macs_per_serial = validate_macs_per_serial(update.macs_per_serial)?;
    let existing = get_model(db, model_number).await?;

    let mut active = existing.into_active_model();
    active.prefix = Set(trimmed(update.prefix));
    active.telx_model_number = Set(trimmed(update.telx_model_number));
    active.category_name = Set(trimmed(update.category_name));
    active.description = Set(trimmed(update.description));
    active.macs_per_serial = Set(macs_per_serial);
    active.updated_at = Set(Utc::now());

    Ok(active.update(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{new_model, setup_db};

    #[tokio::test]
    async fn test_register_and_get_model() {
        let db = setup_db().await;

        let mut input = new_model(" M1 ", Some(" ABC "), 2);
        input.description = Some("   ".to_string());
        let created = register_model(&db, input).await.unwrap();

        assert_eq!(created.model_number, "M1");
        assert_eq!(created.prefix.as_deref(), Some("ABC"));
        assert_eq!(created.description, None);
        assert_eq!(created.macs_per_serial, 2);
        assert_eq!(created.last_serial, None);
        assert_eq!(created.generated_count, 0);
        assert_eq!(created.allocated_count, 0);

        let fetched = get_model(&db, "M1").await.unwrap();
        assert_eq!(fetched.model_number, created.model_number);
        assert_eq!(fetched.prefix, created.prefix);
        assert_eq!(fetched.telx_model_number.as_deref(), Some("TX- M1"));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input_and_duplicates() {
        let db = setup_db().await;

        let err = register_model(&db, new_model("  ", None, 1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        let err = register_model(&db, new_model("M1", None, 0)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        register_model(&db, new_model("M1", None, 1)).await.unwrap();
        let err = register_model(&db, new_model("M1", None, 1)).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_macs_per_serial_is_bounded() {
        let db = setup_db().await;

        let err = register_model(&db, new_model("M1", None, MAX_MACS_PER_SERIAL + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        let err = register_model(&db, new_model("M1", None, i32::MAX)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        let created = register_model(&db, new_model("M1", None, MAX_MACS_PER_SERIAL))
            .await
            .unwrap();
        assert_eq!(created.macs_per_serial, MAX_MACS_PER_SERIAL);
    }

    #[tokio::test]
    async fn test_macs_per_serial_defaults_to_one() {
        let db = setup_db().await;
        let mut input = new_model("M1", None, 1);
        input.macs_per_serial = None;
        assert_eq!(register_model(&db, input).await.unwrap().macs_per_serial, 1);
    }

    #[tokio::test]
    async fn test_get_missing_model_is_not_found() {
        let db = setup_db().await;
        let err = get_model(&db, "NOPE").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_model_keeps_counters() {
        let db = setup_db().await;
        register_model(&db, new_model("M1", Some("ABC"), 1)).await.unwrap();

        let updated = update_model(
            &db,
            "M1",
            DeviceModelUpdate {
                prefix: Some("XYZ".to_string()),
                telx_model_number: None,
                category_name: Some("Routers".to_string()),
                description: Some("second revision".to_string()),
                macs_per_serial: Some(3),
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.prefix.as_deref(), Some("XYZ"));
        assert_eq!(updated.macs_per_serial, 3);
        assert_eq!(updated.generated_count, 0);
        assert_eq!(updated.last_serial, None);

        let err = update_model(
            &db,
            "NOPE",
            DeviceModelUpdate {
                prefix: None,
                telx_model_number: None,
                category_name: None,
                description: None,
                macs_per_serial: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
