//! Read-only queries over issued batches.

use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    QueryTrait, Select,
    sea_query::{Expr, Func, IntoColumnRef, LikeExpr, SimpleExpr},
};
use serde::Serialize;
use uuid::Uuid;

use super::{ServiceError, model_service};
use crate::db::entities::{device_model, entry_mac, generate_group, serial_entry};
use crate::db::models::Batch;

/// Cap on models and on batches returned by one search.
pub const SEARCH_LIMIT: u64 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub models: Vec<device_model::Model>,
    pub groups: Vec<Batch>,
}

/// Loads entries and MACs for `groups` and assembles them, keeping the
/// order of `groups`.
async fn load_batches<C: ConnectionTrait>(
    db: &C,
    groups: Vec<generate_group::Model>,
) -> Result<Vec<Batch>, ServiceError> {
    if groups.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = groups.iter().map(|g| g.id).collect();

    let entries = serial_entry::Entity::find()
        .filter(serial_entry::Column::GroupId.is_in(ids.clone()))
        .all(db)
        .await?;
    let macs = entry_mac::Entity::find()
        .filter(entry_mac::Column::GroupId.is_in(ids))
        .all(db)
        .await?;

    Ok(Batch::assemble(groups, entries, macs))
}

/// All batches of a model, newest first.
pub async fn batches_for_model<C: ConnectionTrait>(
    db: &C,
    model_number: &str,
) -> Result<Vec<Batch>, ServiceError> {
    let model = model_service::get_model(db, model_number.trim()).await?;

    let groups = generate_group::Entity::find()
        .filter(generate_group::Column::ModelNumber.eq(model.model_number))
        .order_by_desc(generate_group::Column::GeneratedAt)
        .all(db)
        .await?;

    load_batches(db, groups).await
}

/// Batches with the given ids, in the order the ids were supplied.
/// Unknown ids are skipped.
pub async fn batches_by_ids<C: ConnectionTrait>(
    db: &C,
    ids: &[Uuid],
) -> Result<Vec<Batch>, ServiceError> {
    if ids.is_empty() {
        return Err(ServiceError::InvalidArgument("groupIds must not be empty".to_string()));
    }

    let mut groups = generate_group::Entity::find()
        .filter(generate_group::Column::Id.is_in(ids.iter().copied()))
        .all(db)
        .await?;
    if groups.is_empty() {
        return Err(ServiceError::NotFound("No matching generate groups".to_string()));
    }
    groups.sort_by_key(|g| ids.iter().position(|id| *id == g.id));

    load_batches(db, groups).await
}

// Escape character for LIKE patterns.
const LIKE_ESCAPE: char = '!';

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, LIKE_ESCAPE | '%' | '_') {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

fn contains_ignore_case<C: IntoColumnRef>(column: C, pattern: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
}

// Newest batches with a serial or MAC matching `pattern`. Matching rows stay
// in SQL; only the capped page of headers comes back.
fn matching_groups(pattern: &str) -> Select<generate_group::Entity> {
    let serial_hits = serial_entry::Entity::find()
        .select_only()
        .column(serial_entry::Column::GroupId)
        .filter(contains_ignore_case(serial_entry::Column::SerialNumber, pattern))
        .into_query();
    let mac_hits = entry_mac::Entity::find()
        .select_only()
        .column(entry_mac::Column::GroupId)
        .filter(contains_ignore_case(entry_mac::Column::MacAddress, pattern))
        .into_query();

    generate_group::Entity::find()
        .filter(
            Condition::any()
                .add(generate_group::Column::Id.in_subquery(serial_hits))
                .add(generate_group::Column::Id.in_subquery(mac_hits)),
        )
        .order_by_desc(generate_group::Column::GeneratedAt)
        .limit(SEARCH_LIMIT)
}

/// Case-insensitive substring search over model numbers, telx model
/// numbers, serial numbers and MAC addresses.
pub async fn search<C: ConnectionTrait>(db: &C, term: &str) -> Result<SearchResults, ServiceError> {
    let term = term.trim();
    if term.is_empty() {
        return Err(ServiceError::InvalidArgument("Search term must not be empty".to_string()));
    }
    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));

    let models = device_model::Entity::find()
        .filter(
            Condition::any()
                .add(contains_ignore_case(device_model::Column::ModelNumber, &pattern))
                .add(contains_ignore_case(device_model::Column::TelxModelNumber, &pattern)),
        )
        .order_by_asc(device_model::Column::ModelNumber)
        .limit(SEARCH_LIMIT)
        .all(db)
        .await?;

    let groups = matching_groups(&pattern).all(db).await?;

    Ok(SearchResults {
        models,
        groups: load_batches(db, groups).await?,
    })
}
