use axum::{Json, Router, http::Method, routing::get};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::services::{AllocationService, IssuanceService, IssuanceSettings};
use crate::web::routes::*;

pub use crate::web::error::AppError;

pub mod error;
pub mod models;
pub mod routes;

pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub issuance_service: Arc<IssuanceService>,
    pub allocation_service: Arc<AllocationService>,
}

impl AppState {
    pub fn new(db_pool: DatabaseConnection, settings: IssuanceSettings) -> Self {
        Self {
            issuance_service: Arc::new(IssuanceService::new(db_pool.clone(), settings)),
            allocation_service: Arc::new(AllocationService::new(db_pool.clone())),
            db_pool,
        }
    }
}

async fn health_check_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest("/api/models", model_routes::create_models_router())
        .nest(
            "/api",
            issuance_routes::create_issuance_router().merge(search_routes::create_search_router()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}
