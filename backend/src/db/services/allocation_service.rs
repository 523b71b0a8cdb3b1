//! Marks issued serials as handed to downstream provisioning and keeps the
//! per-model allocated count in step with the entry flags.

use std::collections::BTreeSet;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Select, TransactionTrait, sea_query::Expr,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::ServiceError;
use crate::db::entities::{device_model, generate_group, serial_entry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationOutcome {
    pub model_number: String,
    pub allocated_count: i64,
}

/// Counts a model's allocated entries from the entry rows themselves.
pub async fn count_allocated<C: ConnectionTrait>(db: &C, model_number: &str) -> Result<i64, ServiceError> {
    let count = serial_entry::Entity::find()
        .filter(serial_entry::Column::ModelNumber.eq(model_number))
        .filter(serial_entry::Column::Allocated.eq(true))
        .count(db)
        .await?;
    i64::try_from(count).map_err(|_| ServiceError::Internal("allocated count overflow".to_string()))
}

// Row lock on the model, held until the transaction ends. Allocations from
// other processes queue here instead of overwriting each other's recount.
// SQLite has no row locks; its single writer serializes the transaction.
fn lock_model(model_number: &str) -> Select<device_model::Entity> {
    device_model::Entity::find_by_id(model_number.to_owned()).lock_exclusive()
}

/// Flags every entry in `batch_ids` as allocated and stores the recounted
/// total on the owning model. All batches must belong to one model.
pub async fn allocate_batches<C: ConnectionTrait>(
    db: &C,
    batch_ids: &[Uuid],
) -> Result<AllocationOutcome, ServiceError> {
    let requested: BTreeSet<Uuid> = batch_ids.iter().copied().collect();
    if requested.is_empty() {
        return Err(ServiceError::InvalidArgument("groupIds must not be empty".to_string()));
    }

    let groups = generate_group::Entity::find()
        .filter(generate_group::Column::Id.is_in(requested.iter().copied()))
        .all(db)
        .await?;
    let Some(first) = groups.first() else {
        return Err(ServiceError::NotFound("No matching generate groups".to_string()));
    };
    let model_number = first.model_number.clone();

    if let Some(other) = groups.iter().find(|g| g.model_number != model_number) {
        return Err(ServiceError::InvalidArgument(format!(
            "Batches belong to different models ({model_number}, {})",
            other.model_number
        )));
    }

    if groups.len() < requested.len() {
        let found: BTreeSet<Uuid> = groups.iter().map(|g| g.id).collect();
        let missing: Vec<String> = requested.difference(&found).map(Uuid::to_string).collect();
        warn!(
            model_number = %model_number,
            missing = %missing.join(","),
            "Some batches were not found and were skipped."
        );
    }

    if lock_model(&model_number).one(db).await?.is_none() {
        return Err(ServiceError::NotFound(format!("Model {model_number} not found")));
    }

    let group_ids: Vec<Uuid> = groups.iter().map(|g| g.id).collect();
    serial_entry::Entity::update_many()
        .col_expr(serial_entry::Column::Allocated, Expr::value(true))
        .filter(serial_entry::Column::GroupId.is_in(group_ids))
        .filter(serial_entry::Column::Allocated.eq(false))
        .exec(db)
        .await?;

    let allocated_count = count_allocated(db, &model_number).await?;

    let result = device_model::Entity::update_many()
        .col_expr(device_model::Column::AllocatedCount, Expr::value(allocated_count))
        .col_expr(device_model::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(device_model::Column::ModelNumber.eq(model_number.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected != 1 {
        return Err(ServiceError::NotFound(format!("Model {model_number} not found")));
    }

    Ok(AllocationOutcome {
        model_number,
        allocated_count,
    })
}

#[derive(Debug)]
pub struct AllocationService {
    db: DatabaseConnection,
    // In-process turn taking; `lock_model` covers other processes.
    lock: Mutex<()>,
}

impl AllocationService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            lock: Mutex::new(()),
        }
    }

    /// Allocates the given batches. Re-allocating is a no-op that returns the
    /// same count.
    pub async fn allocate(&self, batch_ids: &[Uuid]) -> Result<AllocationOutcome, ServiceError> {
        let _guard = self.lock.lock().await;
        match self.allocate_once(batch_ids).await {
            Err(e) if e.is_conflict() => {
                warn!(error = %e, "Allocation conflicted with a concurrent writer. Retrying once.");
                self.allocate_once(batch_ids).await
            }
            result => result,
        }
    }

    async fn allocate_once(&self, batch_ids: &[Uuid]) -> Result<AllocationOutcome, ServiceError> {
        let txn = self.db.begin().await?;
        match allocate_batches(&txn, batch_ids).await {
            Ok(outcome) => {
                txn.commit().await?;
                info!(
                    model_number = %outcome.model_number,
                    allocated_count = outcome.allocated_count,
                    batches = batch_ids.len(),
                    "Allocated batches."
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    error!(error = %rollback_err, "Failed to roll back allocation transaction.");
                }
                Err(e)
            }
        }
    }
}
