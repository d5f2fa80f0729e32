// rest_api/src/handlers/dashboard.rs

use axum::{extract::State, Json};

use lib::services::DashboardStats;

use crate::{AppState, RestApiError};

// Handler for GET /api/dashboard
pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, RestApiError> {
    Ok(Json(state.dashboard.stats().await?))
}
