use axum::{extract::State, Json};

use crate::db::models::DashboardStats;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/admin/stats
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.store.stats().await?))
}
