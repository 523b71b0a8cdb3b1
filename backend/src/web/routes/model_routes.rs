use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use crate::db::{
    entities::device_model,
    services::{self, DeviceModelUpdate, NewDeviceModel},
};
use crate::web::{AppError, AppState};

async fn create_model_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<NewDeviceModel>,
) -> Result<(StatusCode, Json<device_model::Model>), AppError> {
    let model = services::register_model(&app_state.db_pool, payload).await?;
    Ok((StatusCode::CREATED, Json(model)))
}

async fn get_model_handler(
    State(app_state): State<Arc<AppState>>,
    Path(model_number): Path<String>,
) -> Result<Json<device_model::Model>, AppError> {
    let model = services::get_model(&app_state.db_pool, &model_number).await?;
    Ok(Json(model))
}

async fn update_model_handler(
    State(app_state): State<Arc<AppState>>,
    Path(model_number): Path<String>,
    Json(payload): Json<DeviceModelUpdate>,
) -> Result<Json<device_model::Model>, AppError> {
    let model = services::update_model(&app_state.db_pool, &model_number, payload).await?;
    Ok(Json(model))
}

pub fn create_models_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_model_handler))
        .route("/{model_number}", get(get_model_handler).put(update_model_handler))
}
