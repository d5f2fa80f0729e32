// rest_api/src/handlers/auth.rs

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use security::AdminLogin;

use crate::{AppState, RestApiError};

// Handler for POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLogin>,
) -> Result<Json<Value>, RestApiError> {
    let token = state.auth.login(&payload.username, &payload.password)?;
    info!(username = %state.auth.username(), "admin logged in");
    Ok(Json(json!({
        "token": token,
        "user": {
            "id": "1",
            "username": state.auth.username(),
            "role": "admin",
        },
    })))
}
