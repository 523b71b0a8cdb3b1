//! Batch issuance: turns "N more serials for model X" into an immutable batch
//! and advances both counters in the same transaction.
//!
//! The flow is read → plan → persist. Planning is pure and works on a
//! snapshot of the model, the MAC counter and the serial prefix's
//! high-water mark; persisting writes the batch and then compare-and-sets
//! both counters against that snapshot. If the snapshot went stale the
//! counter update reports `StaleCounter`, the transaction rolls back, and
//! the whole sequence is retried once.
//!
//! Serial numbering belongs to the serial prefix, not the model. A batch
//! continues from the highest counter ever issued under its prefix, so a
//! region switch and back, or two models sharing a prefix, never reissue a
//! serial. A collision that still happens (rows written outside the issuer)
//! is reported as a plain `Conflict` and is not retried.

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait, sea_query::Expr,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{ServiceError, counter_service, model_service};
use crate::db::entities::{device_model, entry_mac, generate_group, serial_entry};
use crate::db::models::{Batch, SerialEntry};
use crate::sequence;

/// Largest batch a single request may ask for.
pub const MAX_ISSUE_COUNT: i64 = 100_000;

/// Most MAC addresses a single batch may consume.
pub const MAX_ISSUE_MACS: u64 = 1_000_000;

// Rows per multi-row INSERT; keeps bind parameters under SQLite's limit.
const INSERT_CHUNK_ROWS: usize = 100;

#[derive(Debug, Clone)]
pub struct IssuanceSettings {
    /// Two-digit year tag embedded in every serial prefix.
    pub year_tag: String,
    /// Reject requests that carry no region identifier.
    pub require_region: bool,
}

impl Default for IssuanceSettings {
    fn default() -> Self {
        Self {
            year_tag: "25".to_string(),
            require_region: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueRequest {
    pub model_number: String,
    pub count: i64,
    pub region_id: Option<String>,
    /// Only used when the model has no prefix of its own.
    pub prefix: Option<String>,
}

/// An issue request that passed input validation.
#[derive(Debug, Clone)]
pub struct ValidatedIssue {
    pub model_number: String,
    pub count: u64,
    pub region_id: String,
    pub requested_prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlannedEntry {
    pub serial_number: String,
    pub mac_addresses: Vec<String>,
}

/// Everything one issuance will write, computed from a counter snapshot.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub group_id: Uuid,
    pub model_number: String,
    pub telx_model_number: Option<String>,
    pub category_name: Option<String>,
    pub region_id: String,
    pub effective_prefix: String,
    pub serial_prefix: String,
    pub expected_last_serial: Option<String>,
    pub expected_last_mac_hex: String,
    pub entries: Vec<PlannedEntry>,
    pub new_last_serial: String,
    pub new_last_counter: u64,
    pub new_last_mac_hex: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IssueOutcome {
    pub batch: Batch,
    pub last_serial: String,
    pub last_mac_hex: String,
}

impl BatchPlan {
    fn into_outcome(self) -> IssueOutcome {
        let serials = self
            .entries
            .into_iter()
            .map(|entry| SerialEntry {
                serial_number: entry.serial_number,
                mac_ids: entry.mac_addresses,
                allocated: false,
            })
            .collect();

        IssueOutcome {
            batch: Batch {
                id: self.group_id,
                model_number: self.model_number,
                telx_model_number: self.telx_model_number,
                category_name: self.category_name,
                region_id: self.region_id,
                prefix: self.effective_prefix,
                serial_prefix: self.serial_prefix,
                generated_at: self.generated_at,
                serials,
            },
            last_serial: self.new_last_serial,
            last_mac_hex: self.new_last_mac_hex,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Checks the request shape before any storage is touched.
pub fn validate_request(
    request: &IssueRequest,
    settings: &IssuanceSettings,
) -> Result<ValidatedIssue, ServiceError> {
    let model_number = request.model_number.trim();
    if model_number.is_empty() {
        return Err(ServiceError::InvalidArgument("model_number is required".to_string()));
    }

    if request.count <= 0 {
        return Err(ServiceError::InvalidArgument("count must be > 0".to_string()));
    }
    if request.count > MAX_ISSUE_COUNT {
        return Err(ServiceError::InvalidArgument(format!(
            "count must be <= {MAX_ISSUE_COUNT}"
        )));
    }

    let region_id = non_empty(request.region_id.as_deref()).unwrap_or_default();
    if region_id.is_empty() && settings.require_region {
        return Err(ServiceError::InvalidArgument("regionId is required".to_string()));
    }
    if !region_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ServiceError::InvalidArgument(
            "regionId may only contain letters and digits".to_string(),
        ));
    }

    Ok(ValidatedIssue {
        model_number: model_number.to_string(),
        count: request.count as u64,
        region_id,
        requested_prefix: non_empty(request.prefix.as_deref()),
    })
}

/// Prefix a batch is issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrefix {
    /// Model prefix, or the requested one when the model has none.
    pub effective: String,
    /// Cleaned prefix + region + year tag; the key of the serial space.
    pub serial: String,
}

pub fn resolve_prefix(
    model: &device_model::Model,
    request: &ValidatedIssue,
    settings: &IssuanceSettings,
) -> Result<ResolvedPrefix, ServiceError> {
    let effective = non_empty(model.prefix.as_deref())
        .or_else(|| request.requested_prefix.clone())
        .ok_or_else(|| {
            ServiceError::InvalidArgument("prefix is required (set it on the model)".to_string())
        })?;

    let cleaned = sequence::clean_prefix(&effective);
    if cleaned.is_empty() {
        return Err(ServiceError::InvalidArgument(format!(
            "prefix '{effective}' contains no letters or digits"
        )));
    }
    let serial = sequence::serial_prefix(&cleaned, &request.region_id, &settings.year_tag);
    Ok(ResolvedPrefix { effective, serial })
}

/// Highest serial counter any stored batch reached under `serial_prefix`.
pub async fn prefix_high_water<C: ConnectionTrait>(
    db: &C,
    serial_prefix: &str,
) -> Result<u64, ServiceError> {
    let max: Option<Option<i64>> = generate_group::Entity::find()
        .select_only()
        .column_as(Expr::col(generate_group::Column::LastCounter).max(), "max")
        .filter(generate_group::Column::SerialPrefix.eq(serial_prefix))
        .into_tuple()
        .one(db)
        .await?;
    Ok(max.flatten().map_or(0, |n| u64::try_from(n).unwrap_or(0)))
}

/// Counter the next batch continues from: the later of the model's own last
/// serial and the prefix high-water mark.
pub fn serial_start(model: &device_model::Model, prefix: &ResolvedPrefix, high_water: u64) -> u64 {
    model
        .last_serial
        .as_deref()
        .and_then(|last| sequence::serial_counter(last, &prefix.serial))
        .unwrap_or(0)
        .max(high_water)
}

/// Computes the batch for `request` from a snapshot of `model`, the global
/// MAC counter and the serial counter `start`. Pure: nothing is written.
pub fn plan_batch(
    model: &device_model::Model,
    last_mac_hex: &str,
    prefix: &ResolvedPrefix,
    start: u64,
    request: &ValidatedIssue,
) -> Result<BatchPlan, ServiceError> {
    let macs_per_serial = u64::try_from(model.macs_per_serial)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| {
            ServiceError::Internal(format!(
                "Model {} has invalid macs_per_serial {}",
                model.model_number, model.macs_per_serial
            ))
        })?;

    let total_macs = request
        .count
        .checked_mul(macs_per_serial)
        .filter(|total| *total <= MAX_ISSUE_MACS)
        .ok_or_else(|| {
            ServiceError::InvalidArgument(format!(
                "count x macs_per_serial must be <= {MAX_ISSUE_MACS} (model {} uses {} per serial)",
                model.model_number, model.macs_per_serial
            ))
        })?;
    let new_last_mac_hex = sequence::advance_mac_hex(last_mac_hex, total_macs)?;

    let mut entries = Vec::with_capacity(request.count as usize);
    // Shared across the whole batch; never reset between serials.
    let mut mac_offset: u64 = 0;
    for index in 0..request.count {
        let serial_number = sequence::next_serial(start, &prefix.serial, index);
        let mut mac_addresses = Vec::with_capacity(macs_per_serial as usize);
        for _ in 0..macs_per_serial {
            mac_addresses.push(sequence::next_mac(last_mac_hex, mac_offset)?);
            mac_offset += 1;
        }
        entries.push(PlannedEntry {
            serial_number,
            mac_addresses,
        });
    }

    let new_last_serial = entries
        .last()
        .map(|entry| entry.serial_number.clone())
        .ok_or_else(|| ServiceError::InvalidArgument("count must be > 0".to_string()))?;

    Ok(BatchPlan {
        group_id: Uuid::new_v4(),
        model_number: model.model_number.clone(),
        telx_model_number: model.telx_model_number.clone(),
        category_name: model.category_name.clone(),
        region_id: request.region_id.clone(),
        effective_prefix: prefix.effective.clone(),
        serial_prefix: prefix.serial.clone(),
        expected_last_serial: model.last_serial.clone(),
        expected_last_mac_hex: last_mac_hex.to_string(),
        entries,
        new_last_serial,
        new_last_counter: start.saturating_add(request.count),
        new_last_mac_hex,
        generated_at: Utc::now(),
    })
}

// Rewords a unique violation on issued identifiers. Retrying would hit the
// same rows again, so the caller has to pick another prefix or region.
fn identifier_collision(err: sea_orm::DbErr, what: &str, plan: &BatchPlan) -> ServiceError {
    match ServiceError::from(err) {
        ServiceError::Conflict(detail) => ServiceError::Conflict(format!(
            "{what} for serial prefix {} collide with identifiers already issued; \
             use a different prefix or region ({detail})",
            plan.serial_prefix
        )),
        other => other,
    }
}

/// Writes a planned batch and advances both counters.
///
/// Must run inside a transaction: on any error the caller rolls back, so a
/// failed counter update also discards the batch rows written before it.
pub async fn persist_plan<C: ConnectionTrait>(db: &C, plan: &BatchPlan) -> Result<(), ServiceError> {
    let serial_count = i32::try_from(plan.entries.len())
        .map_err(|_| ServiceError::InvalidArgument("count is too large".to_string()))?;
    let last_counter = i64::try_from(plan.new_last_counter).map_err(|_| {
        ServiceError::Internal(format!("Serial counter overflow under {}", plan.serial_prefix))
    })?;

    generate_group::Entity::insert(generate_group::ActiveModel {
        id: Set(plan.group_id),
        model_number: Set(plan.model_number.clone()),
        telx_model_number: Set(plan.telx_model_number.clone()),
        category_name: Set(plan.category_name.clone()),
        region_id: Set(plan.region_id.clone()),
        prefix: Set(plan.effective_prefix.clone()),
        serial_prefix: Set(plan.serial_prefix.clone()),
        serial_count: Set(serial_count),
        last_counter: Set(last_counter),
        generated_at: Set(plan.generated_at),
    })
    .exec_without_returning(db)
    .await?;

    let entry_rows: Vec<serial_entry::ActiveModel> = plan
        .entries
        .iter()
        .enumerate()
        .map(|(position, entry)| serial_entry::ActiveModel {
            serial_number: Set(entry.serial_number.clone()),
            group_id: Set(plan.group_id),
            model_number: Set(plan.model_number.clone()),
            position: Set(position as i32),
            allocated: Set(false),
        })
        .collect();
    for chunk in entry_rows.chunks(INSERT_CHUNK_ROWS) {
        serial_entry::Entity::insert_many(chunk.to_vec())
            .exec_without_returning(db)
            .await
            .map_err(|e| identifier_collision(e, "Serials", plan))?;
    }

    let mac_rows: Vec<entry_mac::ActiveModel> = plan
        .entries
        .iter()
        .flat_map(|entry| {
            entry
                .mac_addresses
                .iter()
                .enumerate()
                .map(move |(slot, mac)| entry_mac::ActiveModel {
                    mac_address: Set(mac.clone()),
                    serial_number: Set(entry.serial_number.clone()),
                    group_id: Set(plan.group_id),
                    slot: Set(slot as i32),
                })
        })
        .collect();
    for chunk in mac_rows.chunks(INSERT_CHUNK_ROWS) {
        entry_mac::Entity::insert_many(chunk.to_vec())
            .exec_without_returning(db)
            .await
            .map_err(|e| identifier_collision(e, "MAC addresses", plan))?;
    }

    counter_service::advance_model_serial(
        db,
        &plan.model_number,
        plan.expected_last_serial.as_deref(),
        &plan.new_last_serial,
        i64::from(serial_count),
    )
    .await?;

    counter_service::advance_mac_counter(db, &plan.expected_last_mac_hex, &plan.new_last_mac_hex)
        .await?;

    Ok(())
}

/// Issues batches. One instance is shared by every request the process
/// serves.
#[derive(Debug)]
pub struct IssuanceService {
    db: DatabaseConnection,
    settings: IssuanceSettings,
    // Every issuance contends for the single MAC counter row, so requests in
    // this process take turns. The compare-and-set in `persist_plan` covers
    // writers in other processes.
    counter_lock: Mutex<()>,
}

impl IssuanceService {
    pub fn new(db: DatabaseConnection, settings: IssuanceSettings) -> Self {
        Self {
            db,
            settings,
            counter_lock: Mutex::new(()),
        }
    }

    /// Issues `count` new serials (and their MACs) for a model.
    ///
    /// All-or-nothing. A stale counter on the first attempt triggers exactly
    /// one retry from a fresh snapshot. Any other conflict is returned as is.
    pub async fn issue(&self, request: IssueRequest) -> Result<IssueOutcome, ServiceError> {
        let validated = validate_request(&request, &self.settings)?;

        let _guard = self.counter_lock.lock().await;
        match self.issue_once(&validated).await {
            Err(e) if e.is_stale_counter() => {
                warn!(
                    model_number = %validated.model_number,
                    error = %e,
                    "Issuance conflicted with a concurrent writer. Retrying once."
                );
                self.issue_once(&validated).await
            }
            result => result,
        }
    }

    async fn issue_once(&self, request: &ValidatedIssue) -> Result<IssueOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let result = async {
            let model = model_service::get_model(&txn, &request.model_number).await?;
            let last_mac_hex = counter_service::load_last_mac_hex(&txn).await?;
            let prefix = resolve_prefix(&model, request, &self.settings)?;
            let high_water = prefix_high_water(&txn, &prefix.serial).await?;
            let start = serial_start(&model, &prefix, high_water);
            let plan = plan_batch(&model, &last_mac_hex, &prefix, start, request)?;
            persist_plan(&txn, &plan).await?;
            Ok::<_, ServiceError>(plan)
        }
        .await;

        match result {
            Ok(plan) => {
                txn.commit().await?;
                info!(
                    model_number = %plan.model_number,
                    group_id = %plan.group_id,
                    count = plan.entries.len(),
                    last_serial = %plan.new_last_serial,
                    last_mac_hex = %plan.new_last_mac_hex,
                    "Issued batch."
                );
                Ok(plan.into_outcome())
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    error!(
                        model_number = %request.model_number,
                        error = %rollback_err,
                        "Failed to roll back issuance transaction."
                    );
                }
                Err(e)
            }
        }
    }
}
