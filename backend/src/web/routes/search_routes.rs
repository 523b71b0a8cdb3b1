use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use std::sync::Arc;

use crate::db::services::{self, SearchResults};
use crate::web::models::SearchQuery;
use crate::web::{AppError, AppState};

async fn search_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResults>, AppError> {
    let term = query.term.unwrap_or_default();
    let results = services::search(&app_state.db_pool, &term).await?;
    Ok(Json(results))
}

pub fn create_search_router() -> Router<Arc<AppState>> {
    Router::new().route("/search", get(search_handler))
}
