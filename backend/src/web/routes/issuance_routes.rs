use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use crate::db::{models::Batch, services};
use crate::web::models::{
    AllocateResponse, ExportResponse, GenerateGroupsQuery, GenerateRequest, GenerateResponse,
    GroupIdsRequest,
};
use crate::web::{AppError, AppState};

async fn generate_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), AppError> {
    let outcome = app_state.issuance_service.issue(payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            success: true,
            group: outcome.batch,
            last_serial: outcome.last_serial,
            last_mac_hex: outcome.last_mac_hex,
        }),
    ))
}

async fn list_generate_groups_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<GenerateGroupsQuery>,
) -> Result<Json<Vec<Batch>>, AppError> {
    let model_number = query
        .model_number
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput("model_number is required".to_string()))?;
    let batches = services::batches_for_model(&app_state.db_pool, &model_number).await?;
    Ok(Json(batches))
}

async fn allocate_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GroupIdsRequest>,
) -> Result<Json<AllocateResponse>, AppError> {
    let ids = payload.parse_ids()?;
    let outcome = app_state.allocation_service.allocate(&ids).await?;
    Ok(Json(AllocateResponse {
        success: true,
        message: format!("Allocated {} batch(es)", ids.len()),
        model_number: outcome.model_number,
        allocated_count: outcome.allocated_count,
    }))
}

async fn export_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GroupIdsRequest>,
) -> Result<Json<ExportResponse>, AppError> {
    let ids = payload.parse_ids()?;
    let groups = services::batches_by_ids(&app_state.db_pool, &ids).await?;
    Ok(Json(ExportResponse { groups }))
}

pub fn create_issuance_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate_handler))
        .route("/generate-groups", get(list_generate_groups_handler))
        .route("/allocate", post(allocate_handler))
        .route("/export", post(export_handler))
}
